//! Tests for error types

use priority_scheduler::core::{AppResult, FutureError, SchedulerError, TaskFailure};
use std::error::Error;

#[test]
fn test_rejected_error() {
    let err = SchedulerError::Rejected;
    assert_eq!(format!("{err}"), "task rejected: scheduler has been shut down");
}

#[test]
fn test_invalid_argument_error() {
    let err = SchedulerError::InvalidArgument("max_concurrency must be at least 1".to_string());
    assert_eq!(format!("{err}"), "invalid argument: max_concurrency must be at least 1");
}

#[test]
fn test_thread_state_error() {
    let err = SchedulerError::ThreadState("not started".to_string());
    assert_eq!(format!("{err}"), "illegal thread state: not started");
}

#[test]
fn test_thread_spawn_from_io() {
    let io = std::io::Error::other("resource limit");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::ThreadSpawn(_)));
    assert_eq!(format!("{err}"), "failed to spawn thread: resource limit");
}

#[test]
fn test_future_error_exposes_cause() {
    let failure = TaskFailure::Panicked("boom".to_string());
    let err = FutureError::Failed(failure);
    assert_eq!(format!("{err}"), "execution failed: task panicked: boom");
    assert_eq!(err.source().map(ToString::to_string), Some("task panicked: boom".to_string()));
}

#[test]
fn test_anyhow_into_failure() {
    let failure: TaskFailure = anyhow::anyhow!("disk full").into();
    assert_eq!(format!("{failure}"), "task failed: disk full");
    let cloned = failure.clone();
    assert_eq!(cloned.to_string(), failure.to_string());
}

#[test]
fn test_app_result_wraps_scheduler_error() {
    fn submit() -> AppResult<()> {
        Err(SchedulerError::Rejected)?;
        Ok(())
    }
    let err = submit().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
