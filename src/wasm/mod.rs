//! Guest host shim — runs a single core WASM module against a fixed set of host calls.
//!
//! Architecture:
//! - `runtime.rs` — GuestRuntime: compile, instantiate, bind memory, invoke `wasm_main`
//! - `host_calls.rs` — HostCall variants and the HostCallTable dispatch map
//! - `context.rs` — HostContext: per-store memory handle, output sink, clock
//! - `error.rs` — ShimError types

pub mod context;
pub mod error;
pub mod host_calls;
pub mod runtime;

pub use context::{HostContext, SharedBuffer};
pub use error::{ShimError, ShimResult};
pub use host_calls::{HostCall, HostCallTable};
pub use runtime::{run, GuestRuntime, RunReport};
