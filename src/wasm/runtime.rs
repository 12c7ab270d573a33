//! Guest runtime — loads a core WASM module, links the host calls and runs the entry point.
//!
//! Lifecycle: Loaded → Compiled → Instantiated → MemoryBound → Running → Done.
//! Every step returns a [`ShimError`] on failure; nothing is retried. A trap
//! inside the entry function is not an error here, it is reported in the
//! [`RunReport`] so the caller decides the exit policy.

use std::path::Path;

use wasmtime::{Engine, Func, Linker, Memory, Module, Store, Val};

use super::context::HostContext;
use super::error::{ShimError, ShimResult};
use super::host_calls::HostCallTable;
use crate::config::ShimConfig;

/// A compiled guest module.
pub struct GuestModule {
    pub module: Module,
}

impl std::fmt::Debug for GuestModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestModule")
            .field("imports", &self.module.imports().len())
            .field("exports", &self.module.exports().len())
            .finish_non_exhaustive()
    }
}

/// Outcome of invoking the entry function.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Size of the bound memory in 64 KiB pages, taken before invocation.
    pub memory_pages: u64,
    pub results: Vec<Val>,
    /// Trap message if the guest faulted.
    pub trap: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.trap.is_none()
    }

    /// The `done <result> <error>` status line, without the newline.
    pub fn done_line(&self) -> String {
        format!(
            "done {} {}",
            format_results(&self.results),
            self.trap.as_deref().unwrap_or(NIL)
        )
    }
}

const NIL: &str = "<nil>";

/// `<nil>` for no values, the bare value for one, `[a b]` for several.
pub fn format_results(results: &[Val]) -> String {
    match results {
        [] => NIL.to_string(),
        [single] => format_val(single),
        many => {
            let mut out = String::from("[");
            for (i, v) in many.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&format_val(v));
            }
            out.push(']');
            out
        }
    }
}

fn format_val(v: &Val) -> String {
    match v {
        Val::I32(x) => x.to_string(),
        Val::I64(x) => x.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{other:?}"),
    }
}

/// A live guest: store, entry function and bound memory.
pub struct GuestInstance {
    store: Store<HostContext>,
    entry: Func,
    memory: Memory,
}

impl std::fmt::Debug for GuestInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestInstance")
            .field("memory_pages", &self.memory_pages())
            .field("context", self.store.data())
            .finish_non_exhaustive()
    }
}

impl GuestInstance {
    pub fn memory_pages(&self) -> u64 {
        self.memory.size(&self.store)
    }

    /// Copy `len` bytes out of guest memory, `None` if out of range.
    #[cfg(test)]
    fn read_memory(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        let end = offset.checked_add(len)?;
        self.memory
            .data(&self.store)
            .get(offset..end)
            .map(<[u8]>::to_vec)
    }

    pub fn context_mut(&mut self) -> &mut HostContext {
        self.store.data_mut()
    }

    /// Call the entry function with no arguments.
    pub fn invoke(&mut self) -> (Vec<Val>, Option<String>) {
        let result_count = self.entry.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];
        match self.entry.call(&mut self.store, &[], &mut results) {
            Ok(()) => (results, None),
            Err(e) => {
                tracing::debug!("entry function trapped: {e:?}");
                // The full chain carries a multi-line wasm backtrace; the
                // done line only gets the trap itself.
                (Vec::new(), Some(e.root_cause().to_string()))
            }
        }
    }
}

/// The guest runtime: engine, configuration and host call table.
pub struct GuestRuntime {
    engine: Engine,
    config: ShimConfig,
    table: HostCallTable,
}

impl GuestRuntime {
    /// Create a runtime with default engine configuration.
    pub fn new(config: ShimConfig) -> ShimResult<Self> {
        let engine = Engine::new(&wasmtime::Config::new())
            .map_err(|e| ShimError::EngineCreation(e.to_string()))?;
        let table = HostCallTable::new(config.namespace.clone());
        Ok(Self {
            engine,
            config,
            table,
        })
    }

    #[cfg(test)]
    fn table(&self) -> &HostCallTable {
        &self.table
    }

    /// Compile a module from raw bytes (binary or text format).
    pub fn load_module(&self, bytes: &[u8]) -> ShimResult<GuestModule> {
        let module =
            Module::new(&self.engine, bytes).map_err(|e| ShimError::Compile(e.to_string()))?;
        tracing::debug!(
            "compiled module: {} imports, {} exports",
            module.imports().len(),
            module.exports().len()
        );
        Ok(GuestModule { module })
    }

    /// Read a module file fully, then compile it.
    pub fn load_module_from_path(&self, path: &Path) -> ShimResult<GuestModule> {
        let bytes = std::fs::read(path).map_err(|source| ShimError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("loaded {} ({} bytes)", path.display(), bytes.len());
        self.load_module(&bytes)
    }

    /// Link the host calls, instantiate, and resolve the entry and memory exports.
    ///
    /// Memory is bound into the context only after instantiation succeeds.
    pub fn instantiate(
        &self,
        module: &GuestModule,
        ctx: HostContext,
    ) -> ShimResult<GuestInstance> {
        let mut store = Store::new(&self.engine, ctx);
        let mut linker = Linker::new(&self.engine);
        self.table.link(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| ShimError::Instantiate(format!("{e:#}")))?;

        let entry = instance
            .get_func(&mut store, &self.config.entry)
            .ok_or_else(|| ShimError::MissingExport {
                name: self.config.entry.clone(),
                kind: "function",
            })?;
        let params = entry.ty(&store).params().len();
        if params != 0 {
            return Err(ShimError::EntrySignature {
                name: self.config.entry.clone(),
                params,
            });
        }

        let memory = instance
            .get_memory(&mut store, &self.config.memory)
            .ok_or_else(|| ShimError::MissingExport {
                name: self.config.memory.clone(),
                kind: "memory",
            })?;
        store.data_mut().bind_memory(memory);
        tracing::debug!("bound memory export '{}'", self.config.memory);

        Ok(GuestInstance {
            store,
            entry,
            memory,
        })
    }

    /// Compile, instantiate and run a module held in memory.
    ///
    /// Writes `running`, `size= <pages>` and `done <result> <error>` to the
    /// context's sink, with guest output in between.
    pub fn run_bytes(&self, bytes: &[u8], ctx: HostContext) -> ShimResult<RunReport> {
        let module = self.load_module(bytes)?;
        self.run_module(&module, ctx)
    }

    /// Read, compile, instantiate and run the module at `path`.
    pub fn run_path(&self, path: &Path, ctx: HostContext) -> ShimResult<RunReport> {
        let module = self.load_module_from_path(path)?;
        self.run_module(&module, ctx)
    }

    fn run_module(&self, module: &GuestModule, ctx: HostContext) -> ShimResult<RunReport> {
        let mut guest = self.instantiate(module, ctx)?;
        let memory_pages = guest.memory_pages();

        guest.context_mut().write_out(b"running\n")?;
        guest
            .context_mut()
            .write_out(format!("size= {memory_pages}\n").as_bytes())?;

        tracing::info!("invoking '{}'", self.config.entry);
        let (results, trap) = guest.invoke();
        let report = RunReport {
            memory_pages,
            results,
            trap,
        };
        guest
            .context_mut()
            .write_out(format!("{}\n", report.done_line()).as_bytes())?;
        Ok(report)
    }
}

/// Run the module at `path` with the default configuration, printing to stdout.
pub fn run(path: &Path) -> ShimResult<RunReport> {
    GuestRuntime::new(ShimConfig::default())?.run_path(path, HostContext::stdout())
}
