//! Demo guest for guest-shim.
//!
//! Build: cargo build --manifest-path tools/demo-guest/Cargo.toml --target wasm32-unknown-unknown --release
//! Run:   guest-shim tools/demo-guest/target/wasm32-unknown-unknown/release/demo_guest.wasm

use std::time::Duration;

#[link(wasm_import_module = "env")]
extern "C" {
    fn sys_sleep(micros: i32);
    fn sys_print(address: *const u8, size: usize);
    fn sys_get(address: *mut u8, size: usize);
    fn sys_test_call();
    fn sys_get_time() -> i64;
    fn sys_send_message(msg: i64);
}

/// Codes understood by the host's `sys_send_message`.
#[derive(Clone, Copy)]
enum Message {
    GenericError = 0,
    TryFromIntError = 2,
}

fn print(text: &str) {
    unsafe { sys_print(text.as_ptr(), text.len()) }
}

fn sleep(d: Duration) -> Result<(), Message> {
    let micros = i32::try_from(d.as_micros()).map_err(|_| Message::TryFromIntError)?;
    unsafe { sys_sleep(micros) };
    Ok(())
}

fn now() -> i64 {
    unsafe { sys_get_time() }
}

/// The host writes a fixed `abc\n` into the buffer.
fn get(buf: &mut [u8; 4]) {
    unsafe { sys_get(buf.as_mut_ptr(), buf.len()) }
}

fn send(msg: Message) {
    unsafe { sys_send_message(msg as i64) }
}

#[no_mangle]
pub extern "C" fn wasm_main() -> i32 {
    unsafe { sys_test_call() };
    print("Ping\n");

    let start = now();
    if let Err(msg) = sleep(Duration::from_millis(1)) {
        send(msg);
        return 1;
    }
    let slept = now() - start;
    print(&format!("slept {slept}ns\n"));

    let mut buf = [0u8; 4];
    get(&mut buf);
    match std::str::from_utf8(&buf) {
        Ok(text) => print(text),
        Err(_) => {
            send(Message::GenericError);
            return 1;
        }
    }
    0
}
