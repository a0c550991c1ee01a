//! V8 Bridge
//!
//! Embeds V8 so a host application can run small JavaScript programs in
//! isolated workers and exchange string messages with them.
//!
//! # Architecture
//!
//! - The V8 platform is initialized once per process ([`init`]) and torn
//!   down once after every worker is gone ([`teardown`])
//! - Each [`Worker`] owns one isolate and one context, and runs calls
//!   synchronously on the thread that created it. Workers can be disposed in
//!   any order
//! - Script reaches the host only through five globals: `$print`, `$recv`,
//!   `$recvSync`, `$send` and `$sendSync`
//! - The host reaches script through [`Worker::send_message`] and
//!   [`Worker::send_message_sync`], and receives script messages through its
//!   [`MessageHost`]
//! - Any thread may interrupt a worker through a [`TerminateHandle`]
//!
//! Hosts written in other languages use the C ABI in [`ffi`].

mod bridge;
mod config;
mod error;
mod exception;
pub mod ffi;
mod host;
mod platform;
mod state;
mod worker;

pub use config::{ConfigError, WorkerConfig};
pub use error::{
    HandlerKind, PlatformError, ResultCode, WorkerError, ALLOCATION_FAILED, EXECUTION_TERMINATED,
    NON_STRING_RETURN, NO_HOST_REPLY, RECV_NOT_REGISTERED, RECV_SYNC_NOT_REGISTERED,
    SYNC_HANDLER_THREW, WRONG_THREAD,
};
pub use exception::{format_exception, ExceptionRecord, SourceLocation};
pub use host::{MessageHost, NullHost, WorkerId};
pub use platform::{init, is_initialized, live_workers, teardown, version};
pub use worker::{TerminateHandle, Worker};
