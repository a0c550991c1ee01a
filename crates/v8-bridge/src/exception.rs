//! Uncaught exception rendering.
//!
//! [`ExceptionRecord`] is an engine-neutral description of an uncaught
//! error. Its `Display` output is the diagnostic stored as a worker's last
//! exception:
//!
//! ```text
//! app.js:3
//! let x = ;
//!         ^
//! SyntaxError: Unexpected token ';'
//! ```
//!
//! Without location information only the message line is produced.

use std::fmt;

use deno_core::v8;

use crate::error::EXECUTION_TERMINATED;

/// Where in the source an exception was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Name the unit was compiled under
    pub origin: String,
    /// 1-based line number
    pub line: usize,
    /// Text of the offending line
    pub source_line: String,
    /// 0-based column where the error starts
    pub start_column: usize,
    /// 0-based column where the error ends (exclusive)
    pub end_column: usize,
}

/// An uncaught exception captured from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    /// The exception converted to a string, e.g. "Error: boom"
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Full stack trace if the engine provided a non-empty one
    pub stack_trace: Option<String>,
}

impl ExceptionRecord {
    /// A record with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            stack_trace: None,
        }
    }

    /// Capture the exception currently held by `tc`.
    ///
    /// Must only be called after `tc` caught something.
    pub(crate) fn from_try_catch(tc: &mut v8::TryCatch<v8::HandleScope>) -> Self {
        if tc.has_terminated() {
            return Self::message(EXECUTION_TERMINATED);
        }

        let message = match tc.exception() {
            Some(exception) => to_string_lossy(tc, exception),
            None => String::new(),
        };

        let location = tc.message().map(|msg| {
            let origin = msg
                .get_script_resource_name(tc)
                .map(|name| to_string_lossy(tc, name))
                .unwrap_or_default();
            let source_line = msg
                .get_source_line(tc)
                .map(|line| line.to_rust_string_lossy(tc))
                .unwrap_or_default();

            SourceLocation {
                origin,
                line: msg.get_line_number(tc).unwrap_or(0),
                source_line,
                start_column: msg.get_start_column(),
                end_column: msg.get_end_column(),
            }
        });

        let stack_trace = tc
            .stack_trace()
            .map(|stack| to_string_lossy(tc, stack))
            .filter(|stack| !stack.is_empty());

        Self {
            message,
            location,
            stack_trace,
        }
    }
}

impl fmt::Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(location) = &self.location else {
            return writeln!(f, "{}", self.message);
        };

        writeln!(f, "{}:{}", location.origin, location.line)?;
        writeln!(f, "{}", location.source_line)?;

        // Wavy underline
        for _ in 0..location.start_column {
            f.write_str(" ")?;
        }
        for _ in location.start_column..location.end_column {
            f.write_str("^")?;
        }
        f.write_str("\n")?;

        match &self.stack_trace {
            Some(stack) => writeln!(f, "{}", stack),
            None => writeln!(f, "{}", self.message),
        }
    }
}

/// Render an exception record as diagnostic text.
pub fn format_exception(record: &ExceptionRecord) -> String {
    record.to_string()
}

const CONVERSION_FAILED: &str = "<string conversion failed>";

/// Stringify a value without letting a throwing `toString` escape.
pub(crate) fn to_string_lossy(scope: &mut v8::HandleScope, value: v8::Local<v8::Value>) -> String {
    let tc = &mut v8::TryCatch::new(scope);
    match value.to_string(tc) {
        Some(s) => s.to_rust_string_lossy(tc),
        None => CONVERSION_FAILED.to_string(),
    }
}
