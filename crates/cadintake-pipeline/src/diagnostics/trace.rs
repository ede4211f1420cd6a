//! Helpers for filling the `stack_trace` field of an entry.

use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write;

/// Render an error and its chain of sources, outermost first.
pub fn stack_trace_of(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\n  caused by: {cause}");
        source = cause.source();
    }
    rendered
}

/// Capture the current call stack regardless of `RUST_BACKTRACE`.
pub fn call_site_trace() -> String {
    Backtrace::force_capture().to_string()
}
