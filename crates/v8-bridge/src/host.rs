//! Host-side receiver for messages sent from script.
//!
//! `$send` and `$sendSync` are the only places where control leaves the
//! bridge and enters host application logic. Both go through the worker's
//! [`MessageHost`].

use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

/// Identifier the host assigned to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub i32);

impl WorkerId {
    /// Allocate a process-unique id, for hosts that don't manage ids themselves.
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicI32, Ordering};
        static NEXT_ID: AtomicI32 = AtomicI32::new(1);
        WorkerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for WorkerId {
    fn from(id: i32) -> Self {
        WorkerId(id)
    }
}

/// Handler for messages sent by script - implemented by the host
///
/// Both methods have defaults so hosts only override the direction they use.
/// A callback may call back into the same worker (for example
/// `send_message_sync` from inside `on_message_sync`); the worker supports
/// that re-entry on the calling thread.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl MessageHost for Echo {
///     fn on_message_sync(&self, _worker: WorkerId, message: &str) -> Option<String> {
///         Some(message.to_uppercase())
///     }
/// }
/// ```
pub trait MessageHost {
    /// Called for every `$send(message)`.
    ///
    /// Default: drops the message
    fn on_message(&self, worker: WorkerId, message: &str) {
        tracing::debug!("[worker:{}] $send dropped, no host handler: {}", worker, message);
    }

    /// Called for every `$sendSync(message)`. The returned text becomes the
    /// script-visible result; `None` is replaced by a fixed placeholder.
    ///
    /// Default: returns `None`
    fn on_message_sync(&self, worker: WorkerId, message: &str) -> Option<String> {
        tracing::debug!("[worker:{}] $sendSync unanswered, no host handler: {}", worker, message);
        None
    }

    /// Called for every `$print(...)` line of a worker created with printing
    /// enabled.
    ///
    /// Default: writes the line to stdout
    fn on_print(&self, _worker: WorkerId, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}

/// Host that ignores `$send` and never answers `$sendSync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl MessageHost for NullHost {}

impl<T: MessageHost + ?Sized> MessageHost for Rc<T> {
    fn on_message(&self, worker: WorkerId, message: &str) {
        (**self).on_message(worker, message)
    }

    fn on_message_sync(&self, worker: WorkerId, message: &str) -> Option<String> {
        (**self).on_message_sync(worker, message)
    }

    fn on_print(&self, worker: WorkerId, line: &str) {
        (**self).on_print(worker, line)
    }
}

impl<T: MessageHost + ?Sized> MessageHost for Arc<T> {
    fn on_message(&self, worker: WorkerId, message: &str) {
        (**self).on_message(worker, message)
    }

    fn on_message_sync(&self, worker: WorkerId, message: &str) -> Option<String> {
        (**self).on_message_sync(worker, message)
    }

    fn on_print(&self, worker: WorkerId, line: &str) {
        (**self).on_print(worker, line)
    }
}

impl<T: MessageHost + ?Sized> MessageHost for Box<T> {
    fn on_message(&self, worker: WorkerId, message: &str) {
        (**self).on_message(worker, message)
    }

    fn on_message_sync(&self, worker: WorkerId, message: &str) -> Option<String> {
        (**self).on_message_sync(worker, message)
    }

    fn on_print(&self, worker: WorkerId, line: &str) {
        (**self).on_print(worker, line)
    }
}
