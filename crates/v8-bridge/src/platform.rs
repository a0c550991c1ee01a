//! Process-wide V8 platform lifecycle.
//!
//! The platform must be initialized once before any worker exists and may
//! only be torn down after every worker has been disposed. Workers hold a
//! [`PlatformLease`] for their whole life, so the number of outstanding
//! leases is the number of live workers.

use deno_core::v8;
use deno_core::JsRuntime;
use parking_lot::Mutex;

use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformState {
    Uninitialized,
    Ready { workers: usize },
    TornDown,
}

static PLATFORM: Mutex<PlatformState> = Mutex::new(PlatformState::Uninitialized);

/// Held while a worker's isolate is being built. Isolates are never
/// constructed on two threads at once.
pub(crate) static ISOLATE_CREATE_LOCK: Mutex<()> = Mutex::new(());

/// Initialize the V8 platform. Call this before creating any worker.
/// Safe to call multiple times - will only initialize once.
pub fn init() -> Result<(), PlatformError> {
    let mut state = PLATFORM.lock();
    let current = *state;
    match current {
        PlatformState::Uninitialized => {
            JsRuntime::init_platform(None, false);
            *state = PlatformState::Ready { workers: 0 };
            tracing::debug!("[platform] V8 {} initialized", v8::V8::get_version());
            Ok(())
        }
        PlatformState::Ready { .. } => Ok(()),
        PlatformState::TornDown => Err(PlatformError::TornDown),
    }
}

/// Dispose V8 and its platform.
///
/// Refuses while any worker is alive. Once torn down the platform cannot be
/// brought back in this process.
pub fn teardown() -> Result<(), PlatformError> {
    let mut state = PLATFORM.lock();
    let current = *state;
    match current {
        PlatformState::Uninitialized => Err(PlatformError::NotInitialized),
        PlatformState::Ready { workers } if workers > 0 => {
            Err(PlatformError::WorkersAlive(workers))
        }
        PlatformState::Ready { .. } => {
            // SAFETY: no worker holds a lease, so no isolate exists, and the
            // state transition below rules out creating one afterwards.
            unsafe {
                v8::V8::dispose();
            }
            v8::V8::dispose_platform();
            *state = PlatformState::TornDown;
            tracing::debug!("[platform] V8 torn down");
            Ok(())
        }
        PlatformState::TornDown => Ok(()),
    }
}

/// Returns true between a successful [`init`] and [`teardown`].
pub fn is_initialized() -> bool {
    matches!(*PLATFORM.lock(), PlatformState::Ready { .. })
}

/// Number of workers currently holding the platform.
pub fn live_workers() -> usize {
    match *PLATFORM.lock() {
        PlatformState::Ready { workers } => workers,
        _ => 0,
    }
}

/// Version string of the embedded engine, e.g. "12.9.202.13".
pub fn version() -> &'static str {
    v8::V8::get_version()
}

/// Keeps the platform alive for one worker.
#[derive(Debug)]
pub(crate) struct PlatformLease {
    _private: (),
}

impl PlatformLease {
    pub(crate) fn acquire() -> Result<Self, PlatformError> {
        let mut state = PLATFORM.lock();
        match &mut *state {
            PlatformState::Ready { workers } => {
                *workers += 1;
                Ok(Self { _private: () })
            }
            PlatformState::Uninitialized => Err(PlatformError::NotInitialized),
            PlatformState::TornDown => Err(PlatformError::TornDown),
        }
    }
}

impl Drop for PlatformLease {
    fn drop(&mut self) {
        if let PlatformState::Ready { workers } = &mut *PLATFORM.lock() {
            *workers = workers.saturating_sub(1);
        }
    }
}
