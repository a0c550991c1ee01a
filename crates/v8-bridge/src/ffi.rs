//! C ABI for hosts that embed the bridge from another language.
//!
//! Workers cross the boundary as opaque pointers. Every string handed back
//! to the caller is a fresh allocation that must be released with
//! [`v8_bridge_string_free`]. Strings passed in are borrowed for the duration
//! of the call.
//!
//! A worker belongs to the thread that created it. Calls from any other
//! thread are refused with the `WRONG_THREAD` diagnostic instead of touching
//! the engine; only [`v8_bridge_worker_terminate`] works from anywhere.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;
use std::sync::OnceLock;

use crate::config::WorkerConfig;
use crate::error::ResultCode;
use crate::host::{MessageHost, WorkerId};
use crate::worker::Worker;

/// Receives `$send` messages. `message` is only valid during the call.
pub type SendCallback = extern "C" fn(message: *const c_char, worker_id: c_int, user_data: *mut c_void);

/// Answers `$sendSync` messages. The returned string is copied before the
/// callback's caller continues; returning null means "no reply".
pub type SendSyncCallback =
    extern "C" fn(message: *const c_char, worker_id: c_int, user_data: *mut c_void) -> *const c_char;

struct ForeignHost {
    on_send: Option<SendCallback>,
    on_send_sync: Option<SendSyncCallback>,
    user_data: *mut c_void,
}

impl MessageHost for ForeignHost {
    fn on_message(&self, worker: WorkerId, message: &str) {
        let Some(on_send) = self.on_send else {
            return;
        };
        let message = to_c_string(message);
        on_send(message.as_ptr(), worker.0, self.user_data);
    }

    fn on_message_sync(&self, worker: WorkerId, message: &str) -> Option<String> {
        let on_send_sync = self.on_send_sync?;
        let message = to_c_string(message);
        let reply = on_send_sync(message.as_ptr(), worker.0, self.user_data);
        if reply.is_null() {
            return None;
        }
        // SAFETY: the callback contract requires a NUL-terminated string that
        // stays valid until we return.
        Some(unsafe { CStr::from_ptr(reply) }.to_string_lossy().into_owned())
    }
}

/// Interior NUL bytes can't cross the boundary; the string is cut there.
fn to_c_string(value: &str) -> CString {
    let end = value.find('\0').unwrap_or(value.len());
    CString::new(&value[..end]).unwrap_or_default()
}

fn into_raw_string(value: &str) -> *mut c_char {
    to_c_string(value).into_raw()
}

/// # Safety
/// `value` must be null or a valid NUL-terminated string.
unsafe fn borrow_str<'a>(value: *const c_char) -> std::borrow::Cow<'a, str> {
    if value.is_null() {
        return std::borrow::Cow::Borrowed("");
    }
    unsafe { CStr::from_ptr(value) }.to_string_lossy()
}

/// Initialize the engine platform. Returns false if it was already torn down.
#[unsafe(no_mangle)]
pub extern "C" fn v8_bridge_init() -> bool {
    crate::platform::init().is_ok()
}

/// Engine version. The returned string is static and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn v8_bridge_version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();
    VERSION
        .get_or_init(|| to_c_string(crate::platform::version()))
        .as_ptr()
}

/// Create a worker. Returns null if the platform isn't initialized.
///
/// Either callback may be null. `user_data` is passed back verbatim.
#[unsafe(no_mangle)]
pub extern "C" fn v8_bridge_worker_new(
    id: c_int,
    enable_print: bool,
    on_send: Option<SendCallback>,
    on_send_sync: Option<SendSyncCallback>,
    user_data: *mut c_void,
) -> *mut Worker {
    let host = ForeignHost {
        on_send,
        on_send_sync,
        user_data,
    };
    match Worker::with_config(id, host, &WorkerConfig::with_print(enable_print)) {
        Ok(worker) => Box::into_raw(Box::new(worker)),
        Err(err) => {
            tracing::error!("[ffi] Failed to create worker {}: {}", id, err);
            ptr::null_mut()
        }
    }
}

/// Dispose a worker created by [`v8_bridge_worker_new`]. Returns false, and
/// leaves the worker alive, when called from a thread other than its creator.
///
/// # Safety
/// `worker` must be null or a live pointer from `v8_bridge_worker_new`, with
/// no call into it still running.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_dispose(worker: *mut Worker) -> bool {
    if worker.is_null() {
        return true;
    }
    if !unsafe { &*worker }.is_owner_thread() {
        tracing::error!("[ffi] Refusing to dispose a worker from a thread other than its creator");
        return false;
    }
    drop(unsafe { Box::from_raw(worker) });
    true
}

/// Load and run a script. Returns a [`ResultCode`] as an int; a call from
/// the wrong thread reports a runtime error.
///
/// # Safety
/// `worker` must be a live worker pointer; `name` and `source` must be null
/// or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_load(
    worker: *mut Worker,
    name: *const c_char,
    source: *const c_char,
) -> c_int {
    let worker = unsafe { &*worker };
    let (name, source) = unsafe { (borrow_str(name), borrow_str(source)) };
    match worker.load(&name, &source) {
        Ok(()) => ResultCode::Ok as c_int,
        Err(err) => err.code() as c_int,
    }
}

/// Copy of the worker's last exception. Free with [`v8_bridge_string_free`].
/// Readable from any thread; it waits for a running call to finish.
///
/// # Safety
/// `worker` must be a live worker pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_last_exception(worker: *mut Worker) -> *mut c_char {
    let worker = unsafe { &*worker };
    into_raw_string(&worker.last_exception())
}

/// Call the `$recv` handler. Returns 0 on success, 1 on error, including a
/// call from the wrong thread (see [`v8_bridge_worker_last_exception`]).
///
/// # Safety
/// `worker` must be a live worker pointer; `message` must be null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_send(worker: *mut Worker, message: *const c_char) -> c_int {
    let worker = unsafe { &*worker };
    let message = unsafe { borrow_str(message) };
    match worker.send_message(&message) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Call the `$recvSync` handler and return its reply. Free the result with
/// [`v8_bridge_string_free`]. From the wrong thread the reply is the
/// `WRONG_THREAD` diagnostic.
///
/// # Safety
/// `worker` must be a live worker pointer; `message` must be null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_send_sync(
    worker: *mut Worker,
    message: *const c_char,
) -> *mut c_char {
    let worker = unsafe { &*worker };
    let message = unsafe { borrow_str(message) };
    into_raw_string(&worker.send_message_sync(&message))
}

/// Interrupt script running in the worker. May be called from any thread.
///
/// # Safety
/// `worker` must be a live worker pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_worker_terminate(worker: *mut Worker) {
    unsafe { crate::worker::terminate_raw(worker) };
}

/// Release a string returned by this library.
///
/// # Safety
/// `value` must be null or a pointer returned by a `v8_bridge_*` function
/// that hasn't been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_string_free(value: *mut c_char) {
    if !value.is_null() {
        drop(unsafe { CString::from_raw(value) });
    }
}
