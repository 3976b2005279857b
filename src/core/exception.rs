//! Exception sinks for failures that have no caller to report to.
//!
//! Listener panics, consumer handler panics and recurring task failures are
//! routed to an [`ExceptionHandler`] supplied at construction. Components that
//! are not given one fall back to [`default_handler`], which is whatever the
//! application installed via [`install_default_handler`] or, failing that, a
//! handler that logs through `tracing`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::core::error::TaskFailure;

/// Sink for uncaught task, listener and handler failures.
pub trait ExceptionHandler: Send + Sync {
    /// Handle a failure that could not be delivered anywhere else.
    fn handle(&self, failure: &TaskFailure);
}

impl<F> ExceptionHandler for F
where
    F: Fn(&TaskFailure) + Send + Sync,
{
    fn handle(&self, failure: &TaskFailure) {
        self(failure);
    }
}

/// Handler that records failures as `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExceptionHandler;

impl ExceptionHandler for TracingExceptionHandler {
    fn handle(&self, failure: &TaskFailure) {
        tracing::error!(error = %failure, "uncaught failure");
    }
}

static DEFAULT_HANDLER: OnceLock<Arc<dyn ExceptionHandler>> = OnceLock::new();

/// Install a process-wide default handler.
///
/// Returns `false` if a default was already installed.
pub fn install_default_handler(handler: Arc<dyn ExceptionHandler>) -> bool {
    DEFAULT_HANDLER.set(handler).is_ok()
}

/// The installed process-wide handler, or a `tracing` logger.
#[must_use]
pub fn default_handler() -> Arc<dyn ExceptionHandler> {
    DEFAULT_HANDLER
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(TracingExceptionHandler))
}

/// Run `f`, routing a panic to `handler`. Returns `true` if `f` completed.
pub(crate) fn run_isolated<F: FnOnce()>(handler: &dyn ExceptionHandler, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let failure = TaskFailure::from_panic(payload.as_ref());
            // A panicking handler must not take the calling thread down with it.
            if panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&failure))).is_err() {
                tracing::error!(error = %failure, "exception handler panicked");
            }
            false
        }
    }
}
