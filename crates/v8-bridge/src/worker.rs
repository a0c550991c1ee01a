//! Worker implementation.
//!
//! A [`Worker`] owns one V8 isolate and the single context created for it.
//! All calls run synchronously on the calling thread. A worker is bound to
//! the thread that created it; other threads can only interrupt it through a
//! [`TerminateHandle`]. The isolate is entered only for the duration of each
//! outermost call, so workers may be disposed in any order.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use deno_core::v8;

use crate::bridge;
use crate::config::WorkerConfig;
use crate::error::{HandlerKind, WorkerError, NON_STRING_RETURN, WRONG_THREAD};
use crate::exception::ExceptionRecord;
use crate::host::{MessageHost, WorkerId};
use crate::platform::{PlatformLease, ISOLATE_CREATE_LOCK};
use crate::state::WorkerShared;

/// Interrupts script running in a worker. Can be used from any thread.
#[derive(Clone)]
pub struct TerminateHandle(v8::IsolateHandle);

impl TerminateHandle {
    /// Ask the isolate to stop executing script at its next interruption
    /// point. Returns false if the worker is already gone.
    pub fn terminate(&self) -> bool {
        self.0.terminate_execution()
    }
}

impl fmt::Debug for TerminateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminateHandle").finish_non_exhaustive()
    }
}

/// A single isolated JavaScript execution context.
pub struct Worker {
    // Field order matters: persistent handles drop before the isolate, and
    // the isolate before the platform lease.
    context: v8::Global<v8::Context>,
    shared: Rc<WorkerShared>,
    terminate: TerminateHandle,
    isolate: RefCell<v8::OwnedIsolate>,
    _lease: PlatformLease,
    owner: ThreadId,
}

impl Worker {
    /// Create a worker with the default configuration.
    pub fn new(id: impl Into<WorkerId>, host: impl MessageHost + 'static) -> Result<Self, WorkerError> {
        Self::with_config(id, host, &WorkerConfig::default())
    }

    /// Create a worker. The platform must already be initialized.
    pub fn with_config(
        id: impl Into<WorkerId>,
        host: impl MessageHost + 'static,
        config: &WorkerConfig,
    ) -> Result<Self, WorkerError> {
        let id = id.into();
        let lease = PlatformLease::acquire()?;

        let mut isolate = {
            let _lock = ISOLATE_CREATE_LOCK.lock();
            tracing::debug!("[worker:{}] Creating isolate", id);
            v8::Isolate::new(config.create_params())
        };
        isolate.set_capture_stack_trace_for_uncaught_exceptions(true, config.stack_trace_limit);

        let shared = Rc::new(WorkerShared::new(id, config.enable_print, Box::new(host)));
        isolate.set_slot(shared.clone());

        let context = {
            let scope = &mut v8::HandleScope::new(&mut isolate);
            let global =
                bridge::global_template(scope).ok_or(WorkerError::Allocation("global template"))?;
            let context = v8::Context::new(
                scope,
                v8::ContextOptions {
                    global_template: Some(global),
                    ..Default::default()
                },
            );
            v8::Global::new(scope, context)
        };

        // `Isolate::new` entered the isolate; from here on it is only entered
        // around calls.
        // SAFETY: it is the current isolate of this thread, entered above.
        unsafe { isolate.exit() };

        let terminate = TerminateHandle(isolate.thread_safe_handle());
        tracing::debug!("[worker:{}] Ready", id);

        Ok(Self {
            context,
            shared,
            terminate,
            isolate: RefCell::new(isolate),
            _lease: lease,
            owner: thread::current().id(),
        })
    }

    /// The id the host assigned at creation.
    pub fn id(&self) -> WorkerId {
        self.shared.id
    }

    /// Diagnostic text of the most recent failure, empty if nothing failed yet.
    pub fn last_exception(&self) -> String {
        let _lock = self.shared.lock();
        self.shared.last_exception()
    }

    /// Compile `source` under `name` and run it once in the worker's context.
    pub fn load(&self, name: &str, source: &str) -> Result<(), WorkerError> {
        tracing::debug!("[worker:{}] Loading {}", self.id(), name);

        self.enter(|scope, shared| -> Result<(), WorkerError> {
            let tc = &mut v8::TryCatch::new(scope);
            let name = new_string(tc, name, "script name")?;
            let source = new_string(tc, source, "script source")?;
            let origin = script_origin(tc, name);

            let Some(script) = v8::Script::compile(tc, source, Some(&origin)) else {
                return Err(capture(tc, shared, WorkerError::Compile));
            };
            if script.run(tc).is_none() {
                return Err(capture(tc, shared, WorkerError::Runtime));
            }
            Ok(())
        })?
    }

    /// Deliver a message to the handler registered with `$recv`.
    ///
    /// The handler's return value is discarded.
    pub fn send_message(&self, message: &str) -> Result<(), WorkerError> {
        tracing::trace!("[worker:{}] send_message {} bytes", self.id(), message.len());

        self.enter(|scope, shared| -> Result<(), WorkerError> {
            let Some(handler) = shared.handler(HandlerKind::Async) else {
                shared.set_last_exception(HandlerKind::Async.not_registered());
                return Err(WorkerError::HandlerNotRegistered(HandlerKind::Async));
            };

            let tc = &mut v8::TryCatch::new(scope);
            let handler = v8::Local::new(tc, &handler);
            let arg = new_string(tc, message, "message")?;
            let receiver = tc.get_current_context().global(tc);

            if handler.call(tc, receiver.into(), &[arg.into()]).is_none() {
                return Err(capture(tc, shared, WorkerError::Runtime));
            }
            Ok(())
        })?
    }

    /// Deliver a message to the handler registered with `$recvSync` and
    /// return its reply.
    ///
    /// Never fails structurally: a missing handler, a non-string reply, an
    /// uncaught exception or termination all come back as fixed diagnostic
    /// text. Exceptions are also recorded as the last exception.
    pub fn send_message_sync(&self, message: &str) -> String {
        tracing::trace!("[worker:{}] send_message_sync {} bytes", self.id(), message.len());

        let reply = self.enter(|scope, shared| -> Result<String, WorkerError> {
            let handler = shared
                .handler(HandlerKind::Sync)
                .ok_or(WorkerError::HandlerNotRegistered(HandlerKind::Sync))?;

            let tc = &mut v8::TryCatch::new(scope);
            let handler = v8::Local::new(tc, &handler);
            let arg = new_string(tc, message, "message")?;
            let receiver = tc.get_current_context().global(tc);

            match handler.call(tc, receiver.into(), &[arg.into()]) {
                Some(reply) if reply.is_string() => Ok(reply.to_rust_string_lossy(tc)),
                Some(_) => Ok(NON_STRING_RETURN.to_string()),
                None => Err(capture(tc, shared, WorkerError::Runtime)),
            }
        });

        reply
            .and_then(|reply| reply)
            .unwrap_or_else(|err| err.sync_reply().to_string())
    }

    /// Interrupt whatever script is currently running in this worker.
    pub fn terminate(&self) {
        tracing::debug!("[worker:{}] Terminate requested", self.id());
        self.terminate.terminate();
    }

    /// A handle other threads (e.g. a watchdog) can use to interrupt this worker.
    pub fn terminate_handle(&self) -> TerminateHandle {
        self.terminate.clone()
    }

    /// Release the isolate and everything the worker owns.
    pub fn dispose(self) {
        drop(self);
    }

    /// Returns true when called on the thread that created the worker.
    pub(crate) fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Run `op` inside the worker with its execution lock held.
    ///
    /// A call made from a host callback runs inside the suspended bridge
    /// call's scope; an outermost call enters the isolate and opens a fresh
    /// scope on the context. Calls from any thread but the creator's are
    /// rejected before touching the engine.
    fn enter<R>(
        &self,
        op: impl FnOnce(&mut v8::HandleScope, &WorkerShared) -> R,
    ) -> Result<R, WorkerError> {
        let shared = &*self.shared;
        if !self.is_owner_thread() {
            tracing::error!(
                "[worker:{}] Called from {:?}, owned by {:?}",
                shared.id,
                thread::current().id(),
                self.owner
            );
            shared.set_last_exception(WRONG_THREAD);
            return Err(WorkerError::WrongThread);
        }
        let _lock = shared.lock();

        if let Some(active) = shared.active_scope() {
            // SAFETY: the pointer was pushed by a bridge callback on this
            // thread that is suspended inside the host call we are running
            // under. Its scope is V8's current scope and outlives this call,
            // and the callback doesn't touch it until the host returns.
            let parent = unsafe { &mut *active.as_ptr() };
            let scope = &mut v8::HandleScope::new(parent);
            return Ok(op(scope, shared));
        }

        let mut isolate = self.isolate.borrow_mut();
        let mut isolate = EnteredIsolate::new(&mut isolate);
        let scope = &mut v8::HandleScope::new(&mut *isolate);
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);
        let scope: &mut v8::HandleScope = scope;

        let result = op(scope, shared);

        // Leave the worker usable once a termination has fully unwound.
        if scope.is_execution_terminating() {
            scope.cancel_terminate_execution();
        }
        Ok(result)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if !self.is_owner_thread() || self.isolate.try_borrow_mut().is_err() {
            tracing::error!(
                "[worker:{}] Disposed off its thread or while a call into it is still running",
                self.shared.id
            );
            std::process::abort();
        }
        self.shared.release_handles();

        // Dropping an `OwnedIsolate` exits it, so it has to be the current
        // isolate again. Whatever was entered before is restored on exit.
        // SAFETY: no call into this worker is running and we're on its thread.
        unsafe { self.isolate.get_mut().enter() };
        tracing::debug!("[worker:{}] Disposed", self.shared.id);
    }
}

/// Keeps an isolate entered on the current thread for one outermost call.
struct EnteredIsolate<'a>(&'a mut v8::OwnedIsolate);

impl<'a> EnteredIsolate<'a> {
    fn new(isolate: &'a mut v8::OwnedIsolate) -> Self {
        // SAFETY: paired with the `exit` in drop, on the same thread.
        unsafe { isolate.enter() };
        Self(isolate)
    }
}

impl Drop for EnteredIsolate<'_> {
    fn drop(&mut self) {
        // SAFETY: entered in `new`; every scope opened inside has been dropped.
        unsafe { self.0.exit() };
    }
}

impl Deref for EnteredIsolate<'_> {
    type Target = v8::OwnedIsolate;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for EnteredIsolate<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.shared.id).finish_non_exhaustive()
    }
}

/// Terminate through a raw worker pointer without borrowing the worker,
/// which may be running on another thread.
///
/// # Safety
/// `worker` must point to a live worker.
pub(crate) unsafe fn terminate_raw(worker: *const Worker) {
    // Only the thread-safe isolate handle is read.
    let handle = unsafe { &*ptr::addr_of!((*worker).terminate) };
    handle.terminate();
}

fn new_string<'s>(
    scope: &mut v8::HandleScope<'s>,
    value: &str,
    what: &'static str,
) -> Result<v8::Local<'s, v8::String>, WorkerError> {
    v8::String::new(scope, value).ok_or(WorkerError::Allocation(what))
}

fn script_origin<'s>(
    scope: &mut v8::HandleScope<'s>,
    name: v8::Local<'s, v8::String>,
) -> v8::ScriptOrigin<'s> {
    v8::ScriptOrigin::new(
        scope,
        name.into(),
        0,
        0,
        false,
        0,
        None,
        false,
        false,
        false,
        None,
    )
}

/// Record the caught exception as the last exception and build the error.
fn capture(
    tc: &mut v8::TryCatch<v8::HandleScope>,
    shared: &WorkerShared,
    error: fn(String) -> WorkerError,
) -> WorkerError {
    let terminated = tc.has_terminated();
    let diagnostic = ExceptionRecord::from_try_catch(tc).to_string();
    tracing::debug!("[worker:{}] Uncaught exception: {}", shared.id, diagnostic.trim_end());
    shared.set_last_exception(diagnostic.clone());

    if terminated {
        WorkerError::Terminated
    } else {
        error(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        EXECUTION_TERMINATED, NO_HOST_REPLY, RECV_NOT_REGISTERED, RECV_SYNC_NOT_REGISTERED,
        SYNC_HANDLER_THREW,
    };
    use crate::error::ResultCode;
    use crate::host::NullHost;
    use std::cell::OnceCell;
    use std::rc::Weak;
    use std::thread;
    use std::time::Duration;

    fn setup() {
        crate::platform::init().unwrap();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn quiet() -> WorkerConfig {
        WorkerConfig::with_print(false)
    }

    /// Records `$send` traffic and answers `$sendSync` from a fixed table.
    #[derive(Default)]
    struct RecordingHost {
        sent: RefCell<Vec<(WorkerId, String)>>,
        replies: Vec<(&'static str, &'static str)>,
    }

    impl MessageHost for RecordingHost {
        fn on_message(&self, worker: WorkerId, message: &str) {
            self.sent.borrow_mut().push((worker, message.to_string()));
        }

        fn on_message_sync(&self, _worker: WorkerId, message: &str) -> Option<String> {
            self.replies
                .iter()
                .find(|(request, _)| *request == message)
                .map(|(_, reply)| reply.to_string())
        }
    }

    #[test]
    fn test_load_success_keeps_last_exception_empty() {
        setup();
        let worker = Worker::with_config(1, NullHost, &quiet()).unwrap();

        worker.load("ok.js", "var answer = 6 * 7;").unwrap();
        assert_eq!(worker.last_exception(), "");
        assert_eq!(worker.id(), WorkerId(1));
    }

    #[test]
    fn test_compile_error_names_the_unit() {
        setup();
        let worker = Worker::with_config(2, NullHost, &quiet()).unwrap();

        let err = worker.load("bad.js", "let x = ;").unwrap_err();
        let WorkerError::Compile(text) = &err else {
            panic!("expected a compile error, got {:?}", err);
        };
        assert!(text.starts_with("bad.js:1\n"), "{}", text);
        assert!(text.contains("SyntaxError"), "{}", text);
        assert!(text.contains('^'), "{}", text);
        assert_eq!(err.code(), ResultCode::CompileError);
        assert_eq!(&worker.last_exception(), text);

        worker.load("fixed.js", "$recvSync(msg => 'fixed ' + msg);").unwrap();
        assert_eq!(worker.send_message_sync("x"), "fixed x");
    }

    #[test]
    fn test_successful_load_keeps_previous_diagnostic() {
        setup();
        let worker = Worker::with_config(21, NullHost, &quiet()).unwrap();

        worker.load("fails.js", "undefinedFunction();").unwrap_err();
        let diagnostic = worker.last_exception();
        assert!(diagnostic.contains("ReferenceError"), "{}", diagnostic);

        worker.load("ok.js", "var fine = true;").unwrap();
        worker.load("also_ok.js", "$recv(() => {});").unwrap();
        worker.send_message("quiet").unwrap();
        assert_eq!(worker.last_exception(), diagnostic);
    }

    #[test]
    fn test_runtime_error_then_worker_still_usable() {
        setup();
        let worker = Worker::with_config(3, NullHost, &quiet()).unwrap();

        let err = worker.load("boom.js", "throw new Error('boom');").unwrap_err();
        assert_eq!(err.code(), ResultCode::RuntimeError);
        assert!(err.to_string().contains("Error: boom"), "{}", err);
        assert!(worker.last_exception().contains("boom.js:1"));

        worker.load("after.js", "$recvSync(msg => msg + '!');").unwrap();
        assert_eq!(worker.send_message_sync("still here"), "still here!");
    }

    #[test]
    fn test_send_before_recv() {
        setup();
        let worker = Worker::with_config(4, NullHost, &quiet()).unwrap();

        let err = worker.send_message("ping").unwrap_err();
        assert_eq!(err, WorkerError::HandlerNotRegistered(HandlerKind::Async));
        assert!(err.to_string().contains("$recv"));
        assert_eq!(worker.last_exception(), RECV_NOT_REGISTERED);
    }

    #[test]
    fn test_ping_pong() {
        setup();
        let host = Rc::new(RecordingHost::default());
        let worker = Worker::with_config(5, host.clone(), &quiet()).unwrap();

        worker
            .load(
                "pong.js",
                r#"$recv(msg => { if (msg === "ping") $send("pong"); });"#,
            )
            .unwrap();
        worker.send_message("ping").unwrap();
        worker.send_message("not ping").unwrap();

        assert_eq!(*host.sent.borrow(), vec![(WorkerId(5), "pong".to_string())]);
    }

    #[test]
    fn test_async_handler_throws() {
        setup();
        let worker = Worker::with_config(6, NullHost, &quiet()).unwrap();

        worker
            .load("throws.js", "$recv(msg => { throw new RangeError(msg); });")
            .unwrap();
        let err = worker.send_message("too far").unwrap_err();
        assert!(matches!(err, WorkerError::Runtime(_)));
        assert!(worker.last_exception().contains("RangeError: too far"));
    }

    #[test]
    fn test_sync_before_recv_sync() {
        setup();
        let worker = Worker::with_config(7, NullHost, &quiet()).unwrap();

        assert_eq!(worker.send_message_sync("anything"), RECV_SYNC_NOT_REGISTERED);
    }

    #[test]
    fn test_sync_echo_and_concat() {
        setup();
        let worker = Worker::with_config(8, NullHost, &quiet()).unwrap();

        worker.load("echo.js", "$recvSync(msg => msg);").unwrap();
        assert_eq!(worker.send_message_sync("x"), "x");
        assert_eq!(worker.send_message_sync(""), "");

        // Registering again replaces the handler.
        worker.load("double.js", "$recvSync(input => input + input);").unwrap();
        assert_eq!(worker.send_message_sync("a"), "aa");
    }

    #[test]
    fn test_sync_round_trip_through_host() {
        setup();
        let host = RecordingHost {
            replies: vec![("hello", "world")],
            ..Default::default()
        };
        let worker = Worker::with_config(9, host, &quiet()).unwrap();

        worker.load("relay.js", "$recvSync(msg => $sendSync(msg));").unwrap();
        assert_eq!(worker.send_message_sync("hello"), "world");
        assert_eq!(worker.send_message_sync("unknown"), NO_HOST_REPLY);
    }

    #[test]
    fn test_null_host_sync_reply() {
        setup();
        let worker = Worker::with_config(10, NullHost, &quiet()).unwrap();

        worker.load("relay.js", "$recvSync(msg => $sendSync(msg));").unwrap();
        assert_eq!(worker.send_message_sync("hello"), NO_HOST_REPLY);
    }

    #[test]
    fn test_sync_non_string_return() {
        setup();
        let worker = Worker::with_config(11, NullHost, &quiet()).unwrap();

        worker.load("number.js", "$recvSync(msg => msg.length);").unwrap();
        assert_eq!(worker.send_message_sync("abc"), NON_STRING_RETURN);
    }

    #[test]
    fn test_sync_handler_throws() {
        setup();
        let worker = Worker::with_config(12, NullHost, &quiet()).unwrap();

        worker
            .load("nope.js", "$recvSync(msg => { throw new Error('nope'); });")
            .unwrap();
        assert_eq!(worker.send_message_sync("x"), SYNC_HANDLER_THREW);
        assert!(worker.last_exception().contains("Error: nope"));
    }

    #[test]
    fn test_bridge_argument_errors_throw_type_error() {
        setup();
        let worker = Worker::with_config(13, NullHost, &quiet()).unwrap();

        let err = worker.load("send.js", "$send(42);").unwrap_err();
        assert!(err.to_string().contains("TypeError"), "{}", err);

        let err = worker.load("recv.js", "$recv('not a function');").unwrap_err();
        assert!(err.to_string().contains("TypeError"), "{}", err);

        // Script can catch them like any other error.
        worker
            .load(
                "caught.js",
                r#"
                let caught = "";
                try { $sendSync({}); } catch (e) { caught = e.name; }
                $recvSync(() => caught);
                "#,
            )
            .unwrap();
        assert_eq!(worker.send_message_sync(""), "TypeError");
    }

    /// Collects `$print` lines instead of writing them to stdout.
    #[derive(Default)]
    struct PrintHost {
        lines: RefCell<Vec<(WorkerId, String)>>,
    }

    impl MessageHost for PrintHost {
        fn on_print(&self, worker: WorkerId, line: &str) {
            self.lines.borrow_mut().push((worker, line.to_string()));
        }
    }

    #[test]
    fn test_print_joins_arguments_with_spaces() {
        setup();
        let host = Rc::new(PrintHost::default());
        let worker = Worker::new(14, host.clone()).unwrap();

        worker
            .load(
                "print.js",
                "$print('a', 1, { toString() { throw new Error('no'); } }, null);\n$print();",
            )
            .unwrap();

        assert_eq!(
            *host.lines.borrow(),
            vec![
                (WorkerId(14), "a 1 <string conversion failed> null".to_string()),
                (WorkerId(14), String::new()),
            ]
        );
        assert_eq!(worker.last_exception(), "");
    }

    #[test]
    fn test_print_disabled_skips_host() {
        setup();
        let host = Rc::new(PrintHost::default());
        let worker = Worker::with_config(22, host.clone(), &quiet()).unwrap();

        worker.load("print.js", "$print('hidden');").unwrap();
        assert!(host.lines.borrow().is_empty());
    }

    #[test]
    fn test_workers_are_isolated() {
        setup();
        let first = Worker::with_config(15, NullHost, &quiet()).unwrap();
        let second = Worker::with_config(16, NullHost, &quiet()).unwrap();

        first.load("a.js", "var shared = 'first'; $recvSync(() => typeof shared);").unwrap();
        second.load("b.js", "$recvSync(() => typeof shared);").unwrap();

        assert_eq!(first.send_message_sync(""), "string");
        assert_eq!(second.send_message_sync(""), "undefined");
    }

    #[test]
    fn test_heap_limits_from_config() {
        setup();
        let config = WorkerConfig {
            heap_initial_mb: 1,
            heap_max_mb: 32,
            ..quiet()
        };
        let worker = Worker::with_config(17, NullHost, &config).unwrap();

        worker.load("alloc.js", "const xs = new Array(1000).fill('x');").unwrap();
    }

    /// Calls back into its own worker while handling `$sendSync`.
    struct ReentrantHost {
        worker: Rc<OnceCell<Weak<Worker>>>,
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl MessageHost for ReentrantHost {
        fn on_message(&self, _worker: WorkerId, message: &str) {
            self.sent.borrow_mut().push(message.to_string());
            if message == "poke" {
                if let Some(worker) = self.worker.get().and_then(Weak::upgrade) {
                    worker.send_message("poked").unwrap();
                }
            }
        }

        fn on_message_sync(&self, _worker: WorkerId, message: &str) -> Option<String> {
            let worker = self.worker.get()?.upgrade()?;
            match message {
                "nested" => Some(worker.send_message_sync("inner")),
                _ => None,
            }
        }
    }

    #[test]
    fn test_reentrant_calls_from_host() {
        setup();
        let slot = Rc::new(OnceCell::new());
        let sent = Rc::new(RefCell::new(Vec::new()));
        let host = ReentrantHost {
            worker: slot.clone(),
            sent: sent.clone(),
        };
        let worker = Rc::new(Worker::with_config(18, host, &quiet()).unwrap());
        slot.set(Rc::downgrade(&worker)).unwrap();

        worker
            .load(
                "reenter.js",
                r#"
                $recvSync(msg => msg === "inner" ? "deep" : "outer:" + $sendSync("nested"));
                $recv(msg => { if (msg !== "poked") $send(msg); else $send("done"); });
                "#,
            )
            .unwrap();

        assert_eq!(worker.send_message_sync("start"), "outer:deep");

        worker.send_message("poke").unwrap();
        assert_eq!(*sent.borrow(), vec!["poke".to_string(), "done".to_string()]);
        assert_eq!(worker.last_exception(), "");
    }

    #[test]
    fn test_terminate_infinite_loop() {
        setup();
        let worker = Worker::with_config(19, NullHost, &quiet()).unwrap();
        let handle = worker.terminate_handle();

        let watchdog = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handle.terminate();
        });

        let err = worker.load("spin.js", "while (true) {}").unwrap_err();
        watchdog.join().unwrap();

        assert!(err.is_terminated());
        assert_eq!(err.code(), ResultCode::RuntimeError);
        assert!(worker.last_exception().contains(EXECUTION_TERMINATED));

        worker.load("after.js", "$recvSync(() => 'alive');").unwrap();
        assert_eq!(worker.send_message_sync(""), "alive");
    }

    #[test]
    fn test_terminate_sync_handler() {
        setup();
        let worker = Worker::with_config(20, NullHost, &quiet()).unwrap();
        worker.load("spin.js", "$recvSync(() => { for (;;) {} });").unwrap();

        let handle = worker.terminate_handle();
        let watchdog = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handle.terminate();
        });

        assert_eq!(worker.send_message_sync(""), EXECUTION_TERMINATED);
        watchdog.join().unwrap();
        assert!(worker.last_exception().contains(EXECUTION_TERMINATED));
    }

    #[test]
    fn test_dispose_in_creation_order() {
        setup();
        let first = Worker::with_config(23, NullHost, &quiet()).unwrap();
        let second = Worker::with_config(24, NullHost, &quiet()).unwrap();

        first.load("first.js", "$recvSync(msg => 'first ' + msg);").unwrap();
        second.load("second.js", "$recvSync(msg => 'second ' + msg);").unwrap();

        first.dispose();
        assert_eq!(second.send_message_sync("y"), "second y");

        let third = Worker::with_config(25, NullHost, &quiet()).unwrap();
        third.load("third.js", "$recvSync(msg => 'third ' + msg);").unwrap();
        assert_eq!(second.send_message_sync("z"), "second z");

        second.dispose();
        assert_eq!(third.send_message_sync("w"), "third w");
        third.dispose();
    }

    #[test]
    fn test_dispose() {
        setup();
        let worker = Worker::new(WorkerId::next(), NullHost).unwrap();
        worker.load("noop.js", "").unwrap();
        worker.dispose();
    }
}
