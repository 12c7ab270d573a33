//! Host call table — the fixed set of `env` imports offered to the guest.
//!
//! Each host call is a tagged variant with a declared signature. The table
//! maps import names to variants and registers them all with the linker in
//! one pass; every call dispatches through [`HostCall::dispatch`] with the
//! store's [`HostContext`].

use std::collections::BTreeMap;
use std::time::Duration;

use wasmtime::{Caller, Engine, FuncType, Linker, Memory, Val, ValType};

use super::context::HostContext;
use super::error::{ShimError, ShimResult};

/// Value types used by host call signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmTy {
    I32,
    I64,
}

impl WasmTy {
    pub fn val_type(self) -> ValType {
        match self {
            WasmTy::I32 => ValType::I32,
            WasmTy::I64 => ValType::I64,
        }
    }
}

/// Declared parameter and result types of a host call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [WasmTy],
    pub results: &'static [WasmTy],
}

/// A host-provided system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    /// `sys_sleep(micros: i32)`
    Sleep,
    /// `sys_print(offset: i32, length: i32)`
    Print,
    /// `sys_get(offset: i32, _unused: i32)` — writes `abc\n` at `offset`.
    Get,
    /// `sys_test_call()`
    TestCall,
    /// `sys_get_time() -> i64`
    GetTime,
    /// `sys_send_message(code: i64)`
    SendMessage,
}

/// Bytes written by `sys_get`. The second argument never changes them.
pub const GET_PATTERN: [u8; 4] = *b"abc\n";

impl HostCall {
    pub const ALL: [HostCall; 6] = [
        HostCall::Sleep,
        HostCall::Print,
        HostCall::Get,
        HostCall::TestCall,
        HostCall::GetTime,
        HostCall::SendMessage,
    ];

    /// Import name under the host namespace.
    pub fn name(self) -> &'static str {
        match self {
            HostCall::Sleep => "sys_sleep",
            HostCall::Print => "sys_print",
            HostCall::Get => "sys_get",
            HostCall::TestCall => "sys_test_call",
            HostCall::GetTime => "sys_get_time",
            HostCall::SendMessage => "sys_send_message",
        }
    }

    pub fn signature(self) -> Signature {
        use WasmTy::*;
        match self {
            HostCall::Sleep => Signature {
                params: &[I32],
                results: &[],
            },
            HostCall::Print | HostCall::Get => Signature {
                params: &[I32, I32],
                results: &[],
            },
            HostCall::TestCall => Signature {
                params: &[],
                results: &[],
            },
            HostCall::GetTime => Signature {
                params: &[],
                results: &[I64],
            },
            HostCall::SendMessage => Signature {
                params: &[I64],
                results: &[],
            },
        }
    }

    pub fn func_type(self, engine: &Engine) -> FuncType {
        let sig = self.signature();
        FuncType::new(
            engine,
            sig.params.iter().map(|t| t.val_type()),
            sig.results.iter().map(|t| t.val_type()),
        )
    }

    /// Run the host call against the caller's context.
    ///
    /// Any error returned here becomes a trap in the guest.
    pub fn dispatch(
        self,
        mut caller: Caller<'_, HostContext>,
        params: &[Val],
        results: &mut [Val],
    ) -> wasmtime::Result<()> {
        match self {
            HostCall::Sleep => {
                let micros = arg_i32(params, 0)?;
                // Negative durations return immediately.
                let micros = u64::try_from(micros).unwrap_or(0);
                std::thread::sleep(Duration::from_micros(micros));
            }
            HostCall::Print => {
                let offset = guest_addr(arg_i32(params, 0)?);
                let len = usize::try_from(arg_i32(params, 1)?).unwrap_or(0);
                let memory = bound_memory(&caller)?;
                let (data, ctx) = memory.data_and_store_mut(&mut caller);
                let bytes = offset
                    .checked_add(len)
                    .and_then(|end| data.get(offset..end))
                    .ok_or_else(|| {
                        wasmtime::Error::msg(format!(
                            "sys_print: out of bounds memory access ({len} bytes at {offset})"
                        ))
                    })?;
                ctx.write_out(bytes)?;
            }
            HostCall::Get => {
                let offset = guest_addr(arg_i32(params, 0)?);
                let memory = bound_memory(&caller)?;
                memory.write(&mut caller, offset, &GET_PATTERN)?;
            }
            HostCall::TestCall => {}
            HostCall::GetTime => {
                let now = caller.data().clock().now_nanos();
                let slot = results
                    .first_mut()
                    .ok_or_else(|| wasmtime::Error::msg("sys_get_time: missing result slot"))?;
                *slot = Val::I64(now);
            }
            HostCall::SendMessage => {
                let code = params
                    .first()
                    .and_then(Val::i64)
                    .ok_or_else(|| wasmtime::Error::msg("sys_send_message: expected i64 code"))?;
                GuestMessage::from(code).log();
            }
        }
        Ok(())
    }
}

fn arg_i32(params: &[Val], idx: usize) -> wasmtime::Result<i32> {
    params
        .get(idx)
        .and_then(Val::i32)
        .ok_or_else(|| wasmtime::Error::msg(format!("expected i32 argument at position {idx}")))
}

/// Guest pointers are 32-bit unsigned addresses carried in an i32.
fn guest_addr(raw: i32) -> usize {
    raw as u32 as usize
}

fn bound_memory(caller: &Caller<'_, HostContext>) -> wasmtime::Result<Memory> {
    caller
        .data()
        .memory()
        .ok_or_else(|| wasmtime::Error::msg("guest memory not bound"))
}

/// Status codes a guest can report through `sys_send_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestMessage {
    GenericError,
    TooMuchData,
    TryFromIntError,
    Panic,
    Unknown(i64),
}

impl From<i64> for GuestMessage {
    fn from(code: i64) -> Self {
        match code {
            0 => GuestMessage::GenericError,
            1 => GuestMessage::TooMuchData,
            2 => GuestMessage::TryFromIntError,
            3 => GuestMessage::Panic,
            other => GuestMessage::Unknown(other),
        }
    }
}

impl GuestMessage {
    fn log(self) {
        match self {
            GuestMessage::GenericError => tracing::warn!("guest reported a generic error"),
            GuestMessage::TooMuchData => tracing::warn!("guest reported too much data"),
            GuestMessage::TryFromIntError => {
                tracing::warn!("guest reported an integer conversion error")
            }
            GuestMessage::Panic => tracing::error!("guest panicked"),
            GuestMessage::Unknown(code) => tracing::warn!("guest sent unknown message code {code}"),
        }
    }
}

/// Name → host call dispatch map, fixed once built.
#[derive(Debug, Clone)]
pub struct HostCallTable {
    namespace: String,
    calls: BTreeMap<&'static str, HostCall>,
}

impl HostCallTable {
    /// Build the table with every host call under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        let calls = HostCall::ALL.iter().map(|c| (c.name(), *c)).collect();
        Self {
            namespace: namespace.into(),
            calls,
        }
    }

    #[cfg(test)]
    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<HostCall> {
        self.calls.get(name).copied()
    }

    #[cfg(test)]
    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.calls.keys().copied()
    }

    /// Register every entry with the linker.
    pub fn link(&self, linker: &mut Linker<HostContext>) -> ShimResult<()> {
        for (name, call) in &self.calls {
            let call = *call;
            let ty = call.func_type(linker.engine());
            linker
                .func_new(&self.namespace, name, ty, move |caller, params, results| {
                    call.dispatch(caller, params, results)
                })
                .map_err(|e| ShimError::Link(format!("{}::{name}: {e}", self.namespace)))?;
        }
        tracing::debug!(
            "linked {} host calls under '{}'",
            self.calls.len(),
            self.namespace
        );
        Ok(())
    }
}
