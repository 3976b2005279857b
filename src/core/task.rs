//! Units of work and the per-task controls the schedulers act on.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::TaskFailure;
use crate::core::exception::ExceptionHandler;
use crate::core::future::ListenableFuture;

/// Scheduling class of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Runs ahead of low priority work.
    High,
    /// Runs when no high priority work is ready, or once its wait bound expires.
    Low,
}

/// How a recurring task is re-armed after each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Next run is `period` after the previous *scheduled* time.
    FixedRate(Duration),
    /// Next run is `delay` after the previous run *completed*.
    FixedDelay(Duration),
}

impl Recurrence {
    pub(crate) const fn interval(self) -> Duration {
        match self {
            Self::FixedRate(d) | Self::FixedDelay(d) => d,
        }
    }
}

/// Object-safe view of a future, used by schedulers to cancel queued work
/// and to learn when a task reached a terminal state.
pub trait TaskControl: Send + Sync {
    /// Whether the associated future is terminal.
    fn is_done(&self) -> bool;
    /// Cancel the associated future.
    fn cancel(&self, may_interrupt: bool) -> bool;
    /// Run `listener` once the associated future is terminal.
    fn on_done(&self, listener: Box<dyn FnOnce() + Send>);
    /// Whether the associated future was cancelled.
    fn is_cancelled(&self) -> bool;
    /// Flag raised when the running task is asked to stop.
    fn interrupt_flag(&self) -> Arc<AtomicBool>;
}

impl<T: Send + 'static> TaskControl for ListenableFuture<T> {
    fn is_done(&self) -> bool {
        Self::is_done(self)
    }

    fn cancel(&self, may_interrupt: bool) -> bool {
        Self::cancel(self, may_interrupt)
    }

    fn on_done(&self, listener: Box<dyn FnOnce() + Send>) {
        self.add_listener(listener);
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }

    fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Self::interrupt_flag(self)
    }
}

thread_local! {
    static CURRENT_INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether the task running on this thread was asked to stop, via
/// `cancel(true)` on its future or `shutdown_now` on its scheduler.
///
/// Always `false` outside a scheduled task.
#[must_use]
pub fn current_task_interrupted() -> bool {
    CURRENT_INTERRUPT.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    })
}

/// Clears the thread-local interrupt flag even if the task unwinds.
struct InterruptScope;

impl InterruptScope {
    fn enter(flag: Option<Arc<AtomicBool>>) -> Self {
        CURRENT_INTERRUPT.with(|slot| *slot.borrow_mut() = flag);
        Self
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        CURRENT_INTERRUPT.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Type-erased unit of work handed to a [`PriorityScheduler`](crate::core::PriorityScheduler).
pub struct Job {
    run: Box<dyn FnOnce() + Send>,
    control: Option<Arc<dyn TaskControl>>,
    max_wait: Option<Duration>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("has_control", &self.control.is_some())
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Wrap a closure with no associated future.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            run: Box::new(f),
            control: None,
            max_wait: None,
        }
    }

    /// Attach the future this job reports into.
    #[must_use]
    pub fn with_control(mut self, control: Arc<dyn TaskControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Override the scheduler's low priority wait bound for this job.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// The attached future, if any.
    #[must_use]
    pub fn control(&self) -> Option<&Arc<dyn TaskControl>> {
        self.control.as_ref()
    }

    /// Per-job wait bound override.
    #[must_use]
    pub const fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Run the job on the current thread.
    ///
    /// While it runs, [`current_task_interrupted`] reflects the attached
    /// future's interrupt flag.
    pub fn run(self) {
        let _scope = InterruptScope::enter(self.control.as_ref().map(|c| c.interrupt_flag()));
        (self.run)();
    }

    /// Replace the closure with one built around it, keeping control and
    /// wait bound.
    pub(crate) fn wrap<W>(self, wrap: W) -> Self
    where
        W: FnOnce(Box<dyn FnOnce() + Send>) -> Box<dyn FnOnce() + Send>,
    {
        Self {
            run: wrap(self.run),
            control: self.control,
            max_wait: self.max_wait,
        }
    }
}

/// Build a job that runs `task` and resolves the returned future with its
/// value. A panic becomes a failure of the future and is also reported to
/// `handler`.
pub(crate) fn future_job<T, F>(task: F, handler: Arc<dyn ExceptionHandler>) -> (Job, ListenableFuture<T>)
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TaskFailure> + Send + 'static,
{
    let future = ListenableFuture::with_handler(Arc::clone(&handler));
    let completer = future.clone();
    let job = Job::new(move || {
        if !completer.try_start() {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(value)) => {
                completer.complete(value);
            }
            Ok(Err(failure)) => {
                completer.fail(failure);
            }
            Err(payload) => {
                let failure = TaskFailure::from_panic(payload.as_ref());
                handler.handle(&failure);
                completer.fail(failure);
            }
        }
    })
    .with_control(Arc::new(future.clone()));
    (job, future)
}
