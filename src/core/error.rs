//! Error types for scheduler operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced synchronously by scheduler, limiter and consumer calls.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid construction parameter or missing required collaborator.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Submission after the scheduler was shut down.
    #[error("task rejected: scheduler has been shut down")]
    Rejected,
    /// A thread did not reach (or left) the expected lifecycle state.
    #[error("illegal thread state: {0}")]
    ThreadState(String),
    /// The operating system refused to spawn a thread.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Cause recorded in a failed future or routed to an exception handler.
#[derive(Debug, Clone, Error)]
pub enum TaskFailure {
    /// The task, listener or handler panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task reported an error.
    #[error("task failed: {0}")]
    Error(Arc<anyhow::Error>),
}

impl TaskFailure {
    /// Build a failure from a panic payload captured by `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked(message)
    }
}

impl From<anyhow::Error> for TaskFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Error(Arc::new(err))
    }
}

/// Outcome of waiting on a future that did not produce a value.
#[derive(Debug, Clone, Error)]
pub enum FutureError {
    /// The future was cancelled before producing a value.
    #[error("future was cancelled")]
    Cancelled,
    /// The computation failed.
    #[error("execution failed: {0}")]
    Failed(#[source] TaskFailure),
    /// The wait timed out; the future itself is unaffected.
    #[error("timed out waiting for result")]
    Timeout,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_rendering() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        match TaskFailure::from_panic(payload.as_ref()) {
            TaskFailure::Panicked(msg) => assert_eq!(msg, "boom"),
            TaskFailure::Error(_) => panic!("expected panic variant"),
        }

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(
            TaskFailure::from_panic(payload.as_ref()).to_string(),
            "task panicked: owned"
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u32);
        assert_eq!(
            TaskFailure::from_panic(payload.as_ref()).to_string(),
            "task panicked: non-string panic payload"
        );
    }

    #[test]
    fn test_error_conversion() {
        let failure = TaskFailure::from(anyhow::anyhow!("disk full"));
        assert_eq!(failure.to_string(), "task failed: disk full");
    }
}
