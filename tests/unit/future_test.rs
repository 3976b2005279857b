//! Tests for ListenableFuture used outside a scheduler

use priority_scheduler::core::{FutureError, ListenableFuture, TaskFailure};
use std::thread;
use std::time::Duration;

#[test]
fn test_fail_reports_cause() {
    let future: ListenableFuture<()> = ListenableFuture::new();
    assert!(future.fail(TaskFailure::Panicked("worker lost".into())));
    assert!(future.is_done());
    assert!(!future.is_cancelled());
    match future.get() {
        Err(FutureError::Failed(TaskFailure::Panicked(msg))) => assert_eq!(msg, "worker lost"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_get_blocks_until_completed_elsewhere() {
    let future = ListenableFuture::new();
    let completer = future.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        completer.complete("ready")
    });
    assert_eq!(future.get().unwrap(), "ready");
    assert!(handle.join().unwrap());
}

#[tokio::test]
async fn test_await_after_cancel() {
    let future: ListenableFuture<u32> = ListenableFuture::new();
    let canceller = future.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel(false);
    });
    assert!(matches!(future.await, Err(FutureError::Cancelled)));
}
