//! Thread creation capability shared by the scheduler and queue consumers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::error::SchedulerError;

/// Body handed to a [`ThreadFactory`].
pub type ThreadBody = Box<dyn FnOnce() + Send>;

/// How long [`start_thread`] waits for a factory's thread to begin running.
pub(crate) const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates the threads components run on.
///
/// Implementations must start `body` on a new thread and return its handle.
/// Components never take that on trust: they start threads through a
/// handshake with the body and fail with `SchedulerError::ThreadState` when
/// the body never runs.
pub trait ThreadFactory: Send + Sync {
    /// Start `body` on a new thread.
    ///
    /// # Errors
    ///
    /// `SchedulerError::ThreadSpawn` if the thread could not be created.
    fn new_thread(&self, body: ThreadBody) -> Result<JoinHandle<()>, SchedulerError>;
}

impl<F> ThreadFactory for F
where
    F: Fn(ThreadBody) -> Result<JoinHandle<()>, SchedulerError> + Send + Sync,
{
    fn new_thread(&self, body: ThreadBody) -> Result<JoinHandle<()>, SchedulerError> {
        self(body)
    }
}

/// Factory producing named threads (`{prefix}-{n}`) with an optional stack size.
#[derive(Debug)]
pub struct ConfigurableThreadFactory {
    name_prefix: String,
    stack_size: Option<usize>,
    next_id: AtomicUsize,
}

impl Default for ConfigurableThreadFactory {
    fn default() -> Self {
        Self::new("pool-thread", None)
    }
}

impl ConfigurableThreadFactory {
    /// Create a factory naming threads `{name_prefix}-{n}`.
    pub fn new(name_prefix: impl Into<String>, stack_size: Option<usize>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            stack_size,
            next_id: AtomicUsize::new(0),
        }
    }
}

impl ThreadFactory for ConfigurableThreadFactory {
    fn new_thread(&self, body: ThreadBody) -> Result<JoinHandle<()>, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{id}", self.name_prefix));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        Ok(builder.spawn(body)?)
    }
}

/// Start `body` through `factory` and confirm it began running.
///
/// The wrapped body meets the caller on a rendezvous channel before running
/// `body`, so `body` runs only if this returns `Ok`. A factory that drops the
/// body disconnects the channel at once; one that never runs it times out.
pub(crate) fn start_thread(
    factory: &dyn ThreadFactory,
    body: ThreadBody,
    timeout: Duration,
) -> Result<JoinHandle<()>, SchedulerError> {
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);
    let handle = factory.new_thread(Box::new(move || {
        if started_tx.send_timeout((), timeout).is_ok() {
            body();
        }
    }))?;
    match started_rx.recv_timeout(timeout) {
        Ok(()) => Ok(handle),
        Err(_) => Err(SchedulerError::ThreadState(
            "thread factory did not run the thread body".to_string(),
        )),
    }
}
