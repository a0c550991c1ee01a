//! Global bridge functions.
//!
//! These are the five primitives installed into every worker's global
//! object. They are the only way script code talks to the host:
//!
//! - `$print(...args)` - hand one line of output to the host
//! - `$recv(fn)` / `$recvSync(fn)` - register the handlers the host calls
//! - `$send(msg)` - fire-and-forget message to the host
//! - `$sendSync(msg)` - message to the host, returns the host's reply

use deno_core::v8;

use crate::error::{HandlerKind, NO_HOST_REPLY};
use crate::exception::to_string_lossy;
use crate::state::{ScopeFrame, WorkerShared};

/// Build the global object template with all bridge functions installed.
pub(crate) fn global_template<'s>(
    scope: &mut v8::HandleScope<'s, ()>,
) -> Option<v8::Local<'s, v8::ObjectTemplate>> {
    let global = v8::ObjectTemplate::new(scope);

    set_function(scope, global, "$print", print)?;
    set_function(scope, global, "$recv", recv)?;
    set_function(scope, global, "$recvSync", recv_sync)?;
    set_function(scope, global, "$send", send)?;
    set_function(scope, global, "$sendSync", send_sync)?;

    Some(global)
}

fn set_function(
    scope: &mut v8::HandleScope<'_, ()>,
    template: v8::Local<v8::ObjectTemplate>,
    name: &str,
    callback: impl v8::MapFnTo<v8::FunctionCallback>,
) -> Option<()> {
    let key = v8::String::new(scope, name)?;
    let function = v8::FunctionTemplate::new(scope, callback);
    template.set(key.into(), function.into());
    Some(())
}

fn throw_type_error(scope: &mut v8::HandleScope, message: &str) {
    if let Some(message) = v8::String::new(scope, message) {
        let exception = v8::Exception::type_error(scope, message);
        scope.throw_exception(exception);
    }
}

/// `$print(...args)`: arguments joined by a single space, one line.
///
/// Stdout unless the host overrides [`MessageHost::on_print`](crate::MessageHost::on_print).
fn print(scope: &mut v8::HandleScope, args: v8::FunctionCallbackArguments, _rv: v8::ReturnValue) {
    let line = (0..args.length())
        .map(|i| to_string_lossy(scope, args.get(i)))
        .collect::<Vec<_>>()
        .join(" ");

    let Some(shared) = WorkerShared::from_isolate(scope) else {
        return;
    };
    let _lock = shared.lock();

    tracing::trace!("[worker:{}] $print {}", shared.id, line);
    if shared.enable_print {
        let _frame = ScopeFrame::push(&shared, scope);
        shared.host.on_print(shared.id, &line);
    }
}

fn recv(scope: &mut v8::HandleScope, args: v8::FunctionCallbackArguments, _rv: v8::ReturnValue) {
    register_handler(scope, &args, HandlerKind::Async);
}

fn recv_sync(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    register_handler(scope, &args, HandlerKind::Sync);
}

fn register_handler(
    scope: &mut v8::HandleScope,
    args: &v8::FunctionCallbackArguments,
    kind: HandlerKind,
) {
    let Ok(function) = v8::Local::<v8::Function>::try_from(args.get(0)) else {
        tracing::warn!("{} called with a non-function argument", kind);
        throw_type_error(scope, &format!("{} expects a function", kind));
        return;
    };
    let Some(shared) = WorkerShared::from_isolate(scope) else {
        return;
    };
    let _lock = shared.lock();

    let handler = v8::Global::new(scope, function);
    shared.set_handler(kind, handler);
    tracing::debug!("[worker:{}] {} handler registered", shared.id, kind);
}

/// Read the single string argument of `$send`/`$sendSync`, throwing a
/// `TypeError` into script if it isn't one.
fn message_arg(
    scope: &mut v8::HandleScope,
    args: &v8::FunctionCallbackArguments,
    name: &str,
) -> Option<String> {
    let value = args.get(0);
    if !value.is_string() {
        tracing::warn!("{} called with a non-string argument", name);
        throw_type_error(scope, &format!("{} expects a string", name));
        return None;
    }
    Some(value.to_rust_string_lossy(scope))
}

/// `$send(msg)`: hand the message to the host, nothing comes back.
fn send(scope: &mut v8::HandleScope, args: v8::FunctionCallbackArguments, _rv: v8::ReturnValue) {
    let Some(message) = message_arg(scope, &args, "$send") else {
        return;
    };
    let Some(shared) = WorkerShared::from_isolate(scope) else {
        return;
    };
    let _lock = shared.lock();

    tracing::trace!("[worker:{}] $send {} bytes", shared.id, message.len());
    let _frame = ScopeFrame::push(&shared, scope);
    shared.host.on_message(shared.id, &message);
}

/// `$sendSync(msg)`: hand the message to the host and return its reply.
fn send_sync(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(message) = message_arg(scope, &args, "$sendSync") else {
        return;
    };
    let Some(shared) = WorkerShared::from_isolate(scope) else {
        return;
    };
    let _lock = shared.lock();

    tracing::trace!("[worker:{}] $sendSync {} bytes", shared.id, message.len());
    let reply = {
        let _frame = ScopeFrame::push(&shared, scope);
        shared.host.on_message_sync(shared.id, &message)
    };

    // A nested call may have been terminated; let the termination unwind.
    if scope.is_execution_terminating() {
        return;
    }

    let reply = reply.unwrap_or_else(|| NO_HOST_REPLY.to_string());
    match v8::String::new(scope, &reply) {
        Some(reply) => rv.set(reply.into()),
        None => throw_type_error(scope, "$sendSync reply is too large"),
    }
}
