//! Per-worker state shared between the [`Worker`](crate::Worker) and the
//! bridge functions running inside its isolate.
//!
//! The state sits behind a re-entrant mutex: every entry point holds the
//! lock for its whole duration, and a host callback that calls back into the
//! same worker on the same thread simply re-acquires it.

use std::cell::RefCell;
use std::ptr::NonNull;
use std::rc::Rc;

use deno_core::v8;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::HandlerKind;
use crate::host::{MessageHost, WorkerId};

pub(crate) type ExecutionGuard<'a> = ReentrantMutexGuard<'a, RefCell<WorkerState>>;

/// A callback scope that is suspended while the host handles `$send` or
/// `$sendSync`.
type ScopePtr = NonNull<v8::HandleScope<'static>>;

#[derive(Default)]
pub(crate) struct WorkerState {
    async_handler: Option<v8::Global<v8::Function>>,
    sync_handler: Option<v8::Global<v8::Function>>,
    last_exception: String,
    /// Innermost last. Non-empty only while a host callback is running.
    active_scopes: Vec<ScopePtr>,
}

pub(crate) struct WorkerShared {
    pub(crate) id: WorkerId,
    pub(crate) enable_print: bool,
    pub(crate) host: Box<dyn MessageHost>,
    state: ReentrantMutex<RefCell<WorkerState>>,
}

impl WorkerShared {
    pub(crate) fn new(id: WorkerId, enable_print: bool, host: Box<dyn MessageHost>) -> Self {
        Self {
            id,
            enable_print,
            host,
            state: ReentrantMutex::new(RefCell::new(WorkerState::default())),
        }
    }

    /// Get the shared state of the worker owning `isolate`.
    pub(crate) fn from_isolate(isolate: &v8::Isolate) -> Option<Rc<Self>> {
        isolate.get_slot::<Rc<Self>>().cloned()
    }

    /// Acquire the worker's execution lock.
    pub(crate) fn lock(&self) -> ExecutionGuard<'_> {
        self.state.lock()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WorkerState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    pub(crate) fn handler(&self, kind: HandlerKind) -> Option<v8::Global<v8::Function>> {
        self.with_state(|state| match kind {
            HandlerKind::Async => state.async_handler.clone(),
            HandlerKind::Sync => state.sync_handler.clone(),
        })
    }

    /// Store a handler, replacing any previous one of the same kind.
    pub(crate) fn set_handler(&self, kind: HandlerKind, handler: v8::Global<v8::Function>) {
        self.with_state(|state| match kind {
            HandlerKind::Async => state.async_handler = Some(handler),
            HandlerKind::Sync => state.sync_handler = Some(handler),
        })
    }

    pub(crate) fn last_exception(&self) -> String {
        self.with_state(|state| state.last_exception.clone())
    }

    pub(crate) fn set_last_exception(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_state(|state| state.last_exception = text)
    }

    /// Scope of the innermost suspended bridge call, if any.
    pub(crate) fn active_scope(&self) -> Option<ScopePtr> {
        self.with_state(|state| state.active_scopes.last().copied())
    }

    /// Drop the persistent handler handles. Must run before the isolate is
    /// disposed.
    pub(crate) fn release_handles(&self) {
        let (async_handler, sync_handler) = self.with_state(|state| {
            (state.async_handler.take(), state.sync_handler.take())
        });
        drop(async_handler);
        drop(sync_handler);
    }
}

/// Marks a bridge callback's scope as the one re-entrant calls must run in.
///
/// The frame is popped on drop, so the stack stays balanced even if the host
/// callback unwinds.
pub(crate) struct ScopeFrame<'a> {
    shared: &'a WorkerShared,
}

impl<'a> ScopeFrame<'a> {
    pub(crate) fn push(shared: &'a WorkerShared, scope: &mut v8::HandleScope) -> Self {
        let ptr = NonNull::from(scope).cast::<v8::HandleScope<'static>>();
        shared.with_state(|state| state.active_scopes.push(ptr));
        Self { shared }
    }
}

impl Drop for ScopeFrame<'_> {
    fn drop(&mut self) {
        self.shared.with_state(|state| {
            state.active_scopes.pop();
        });
    }
}
