//! Exit status of the `guest-shim` binary.

use std::path::Path;
use std::process::{Command, Output};

fn shim(module: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_guest-shim"))
        .arg(module)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to spawn guest-shim")
}

fn write(dir: &Path, name: &str, wat: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, wat).unwrap();
    path
}

#[test]
fn clean_guest_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "ok.wat",
        r#"(module (memory (export "memory") 1) (func (export "wasm_main") (result i32) i32.const 7))"#,
    );
    let out = shim(&path);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout, "running\nsize= 1\ndone 7 <nil>\n");
}

#[test]
fn trapping_guest_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "trap.wat",
        r#"(module (memory (export "memory") 1) (func (export "wasm_main") unreachable))"#,
    );
    let out = shim(&path);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("done <nil> "));
    assert!(String::from_utf8_lossy(&out.stderr).contains("guest trapped"));
}

#[test]
fn missing_module_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = shim(&dir.path().join("absent.wasm"));
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}
