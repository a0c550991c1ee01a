//! Error types for the bridge.

use std::fmt;

/// Diagnostic stored when `send_message` runs before `$recv` was called.
pub const RECV_NOT_REGISTERED: &str = "v8-bridge: callback not registered with $recv";

/// Reply of `send_message_sync` when `$recvSync` was never called.
pub const RECV_SYNC_NOT_REGISTERED: &str = "v8-bridge: callback not registered with $recvSync";

/// Reply of `send_message_sync` when the sync handler returned a non-string.
pub const NON_STRING_RETURN: &str = "v8-bridge: non-string return value";

/// Value `$sendSync` yields to script when the host has no textual reply.
pub const NO_HOST_REPLY: &str = "v8-bridge: host returned no reply to $sendSync";

/// Reply of `send_message_sync` when the sync handler threw.
pub const SYNC_HANDLER_THREW: &str = "v8-bridge: uncaught exception in $recvSync handler";

/// Diagnostic recorded when execution was interrupted by `terminate`.
pub const EXECUTION_TERMINATED: &str = "v8-bridge: execution terminated";

/// Diagnostic for a call made from a thread other than the worker's creator.
pub const WRONG_THREAD: &str = "v8-bridge: worker called from a thread other than its creator";

/// Reply of `send_message_sync` when the message couldn't become an engine string.
pub const ALLOCATION_FAILED: &str = "v8-bridge: failed to allocate engine string";

/// Which of the two script-registered handlers an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Registered with `$recv`, invoked by `send_message`.
    Async,
    /// Registered with `$recvSync`, invoked by `send_message_sync`.
    Sync,
}

impl HandlerKind {
    /// Name of the global function that registers this handler.
    pub fn registrar(self) -> &'static str {
        match self {
            HandlerKind::Async => "$recv",
            HandlerKind::Sync => "$recvSync",
        }
    }

    /// Fixed diagnostic for a call that found no handler of this kind.
    pub fn not_registered(self) -> &'static str {
        match self {
            HandlerKind::Async => RECV_NOT_REGISTERED,
            HandlerKind::Sync => RECV_SYNC_NOT_REGISTERED,
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.registrar())
    }
}

/// Result codes reported across the native boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    CompileError = 1,
    RuntimeError = 2,
}

/// Errors from process-wide engine setup and teardown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("V8 platform is not initialized; call v8_bridge::init() first")]
    NotInitialized,

    #[error("V8 platform has been torn down and cannot be re-initialized")]
    TornDown,

    #[error("{0} worker(s) still alive; dispose them before teardown")]
    WorkersAlive(usize),
}

/// Errors that can occur while operating a worker.
///
/// Script failures carry the formatted diagnostic, which is also kept as the
/// worker's last exception.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("{0}")]
    Compile(String),

    #[error("{0}")]
    Runtime(String),

    #[error("{}", .0.not_registered())]
    HandlerNotRegistered(HandlerKind),

    #[error("{}", EXECUTION_TERMINATED)]
    Terminated,

    #[error("Failed to allocate {0}")]
    Allocation(&'static str),

    #[error("{}", WRONG_THREAD)]
    WrongThread,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl WorkerError {
    /// Boundary result code for this error.
    ///
    /// Everything that happened after compilation succeeded, including a
    /// missing handler or termination, is reported as a runtime error.
    pub fn code(&self) -> ResultCode {
        match self {
            WorkerError::Compile(_) => ResultCode::CompileError,
            _ => ResultCode::RuntimeError,
        }
    }

    /// Fixed text `send_message_sync` replies with instead of failing.
    pub fn sync_reply(&self) -> &'static str {
        match self {
            WorkerError::HandlerNotRegistered(kind) => kind.not_registered(),
            WorkerError::Terminated => EXECUTION_TERMINATED,
            WorkerError::WrongThread => WRONG_THREAD,
            WorkerError::Allocation(_) => ALLOCATION_FAILED,
            WorkerError::Compile(_) | WorkerError::Runtime(_) | WorkerError::Platform(_) => {
                SYNC_HANDLER_THREW
            }
        }
    }

    /// Returns true if the error came from script execution being interrupted.
    pub fn is_terminated(&self) -> bool {
        matches!(self, WorkerError::Terminated)
    }
}
