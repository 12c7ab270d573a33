//! Per-store execution context handed to every host call.
//!
//! Host calls never capture the guest memory from an enclosing scope. They
//! reach it through `Caller<HostContext>`, and it only exists once the
//! runtime has instantiated the module and bound the `memory` export.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use wasmtime::Memory;

/// Wall-clock time that never runs backwards within one run.
///
/// Anchored to `SystemTime` once, then advanced by a monotonic `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    since_epoch: Duration,
    anchor: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            since_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
            anchor: Instant::now(),
        }
    }

    /// Nanoseconds since the UNIX epoch, saturating at `i64::MAX`.
    pub fn now_nanos(&self) -> i64 {
        let now = self.since_epoch + self.anchor.elapsed();
        i64::try_from(now.as_nanos()).unwrap_or(i64::MAX)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory output sink that can be cloned and inspected after a run.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("shared buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Store data for guest execution.
pub struct HostContext {
    memory: Option<Memory>,
    out: Box<dyn Write + Send>,
    clock: WallClock,
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("memory_bound", &self.memory.is_some())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl HostContext {
    /// Context writing guest and status output to the given sink.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            memory: None,
            out: Box::new(out),
            clock: WallClock::new(),
        }
    }

    /// Context writing to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Bind the instance's exported memory. Only valid after instantiation.
    pub fn bind_memory(&mut self, memory: Memory) {
        self.memory = Some(memory);
    }

    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    pub fn clock(&self) -> &WallClock {
        &self.clock
    }

    /// Write bytes to the sink and flush, so guest output keeps its order
    /// relative to the shim's status lines.
    pub fn write_out(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_non_decreasing() {
        let clock = WallClock::new();
        let mut last = clock.now_nanos();
        for _ in 0..1000 {
            let now = clock.now_nanos();
            assert!(now >= last, "clock went backwards: {now} < {last}");
            last = now;
        }
    }

    #[test]
    fn clock_tracks_system_time() {
        let clock = WallClock::new();
        let system = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as i64;
        let delta = (clock.now_nanos() - system).abs();
        assert!(delta < 1_000_000_000, "clock off by {delta}ns");
    }

    #[test]
    fn memory_unbound_by_default() {
        let ctx = HostContext::new(SharedBuffer::new());
        assert!(ctx.memory().is_none());
    }

    #[test]
    fn write_out_reaches_shared_buffer() {
        let buf = SharedBuffer::new();
        let mut ctx = HostContext::new(buf.clone());
        ctx.write_out(b"hello ").unwrap();
        ctx.write_out(b"world").unwrap();
        assert_eq!(buf.to_string_lossy(), "hello world");
    }
}
