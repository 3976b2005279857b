//! Tests for scheduler builders

use priority_scheduler::builders::SchedulerBuilder;
use priority_scheduler::config::SchedulerConfig;
use priority_scheduler::core::{
    ExceptionHandler, SchedulerError, SubmitterExt, TaskFailure, ThreadBody,
    ThreadFactory,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_build_rejects_invalid_config() {
    let result = SchedulerBuilder::new(SchedulerConfig::new().with_pool_size(0, 0)).build();
    assert!(matches!(result, Err(SchedulerError::InvalidArgument(_))));
}

#[test]
fn test_build_uses_custom_collaborators() {
    let spawned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&spawned);
    let factory: Arc<dyn ThreadFactory> = Arc::new(move |body: ThreadBody| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, SchedulerError>(std::thread::Builder::new().name("custom".into()).spawn(body)?)
    });
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let handler: Arc<dyn ExceptionHandler> =
        Arc::new(move |failure: &TaskFailure| sink.lock().push(failure.to_string()));

    let scheduler = SchedulerBuilder::new(SchedulerConfig::new().with_pool_size(1, 1))
        .thread_factory(factory)
        .exception_handler(handler)
        .build()
        .unwrap();

    let name = scheduler
        .submit(|| std::thread::current().name().map(str::to_string))
        .unwrap();
    assert_eq!(name.get().unwrap().as_deref(), Some("custom"));
    assert_eq!(spawned.load(Ordering::SeqCst), 1);

    // Listener panics have no future to land in, so they reach the handler.
    let future = scheduler.submit(|| ()).unwrap();
    future.get().unwrap();
    future.add_listener(|| panic!("listener failed"));
    assert_eq!(failures.lock().len(), 1);

    scheduler.shutdown();
    assert!(scheduler.await_termination(Duration::from_secs(5)));
}
