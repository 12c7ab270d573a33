//! guest-shim — a minimal host for a single WebAssembly guest.
//!
//! Loads one module, offers it the `env` system calls (sleep, print,
//! memory poke, time, status messages), and runs its `wasm_main` export.

pub mod config;
pub mod wasm;
