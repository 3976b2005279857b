//! Scheduler-shaped collaborator interface and generic submission helpers.
//!
//! [`PriorityScheduler`] is the object-safe surface implemented by
//! [`PriorityTaskScheduler`](crate::core::PriorityTaskScheduler) and by
//! [`SchedulerLimiter`](crate::core::SchedulerLimiter), so a limiter can wrap
//! either. [`SubmitterExt`] builds the typed `execute`/`submit`/`schedule_*`
//! calls on top of the three `dispatch*` primitives.

use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{SchedulerError, TaskFailure};
use crate::core::exception::ExceptionHandler;
use crate::core::future::ListenableFuture;
use crate::core::task::{future_job, Job, Recurrence, TaskPriority};

/// Recurring task body, invoked once per occurrence.
pub type RecurringTask = Arc<dyn Fn() + Send + Sync>;

/// A scheduler that accepts prioritized immediate, delayed and recurring work.
pub trait PriorityScheduler: Send + Sync {
    /// Priority used when a submission does not name one.
    fn default_priority(&self) -> TaskPriority;

    /// Longest a low priority task is passed over by high priority work.
    fn max_wait_for_low_priority(&self) -> Duration;

    /// Sink for failures nobody else observes.
    fn exception_handler(&self) -> Arc<dyn ExceptionHandler>;

    /// Whether new submissions are rejected.
    fn is_shutdown(&self) -> bool;

    /// Queue `job` for immediate execution.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown. `SchedulerError::ThreadState`
    /// if the pool has no worker and none could be started.
    fn dispatch(&self, job: Job, priority: Option<TaskPriority>) -> Result<(), SchedulerError>;

    /// Queue `job` to become ready after `delay`. A delay too large to
    /// express as an `Instant` means the job never becomes ready on its own.
    ///
    /// # Errors
    ///
    /// As [`dispatch`](Self::dispatch).
    fn dispatch_delayed(
        &self,
        job: Job,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<(), SchedulerError>;

    /// Run `task` repeatedly until the returned future is cancelled or the
    /// scheduler shuts down.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` for a zero period,
    /// `SchedulerError::Rejected` after shutdown.
    fn dispatch_recurring(
        &self,
        task: RecurringTask,
        recurrence: Recurrence,
        initial_delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError>;
}

impl<S: PriorityScheduler + ?Sized> PriorityScheduler for Arc<S> {
    fn default_priority(&self) -> TaskPriority {
        (**self).default_priority()
    }

    fn max_wait_for_low_priority(&self) -> Duration {
        (**self).max_wait_for_low_priority()
    }

    fn exception_handler(&self) -> Arc<dyn ExceptionHandler> {
        (**self).exception_handler()
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }

    fn dispatch(&self, job: Job, priority: Option<TaskPriority>) -> Result<(), SchedulerError> {
        (**self).dispatch(job, priority)
    }

    fn dispatch_delayed(
        &self,
        job: Job,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<(), SchedulerError> {
        (**self).dispatch_delayed(job, delay, priority)
    }

    fn dispatch_recurring(
        &self,
        task: RecurringTask,
        recurrence: Recurrence,
        initial_delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError> {
        (**self).dispatch_recurring(task, recurrence, initial_delay, priority)
    }
}

/// Typed submission helpers available on every [`PriorityScheduler`].
pub trait SubmitterExt: PriorityScheduler {
    /// Run `task` at the default priority, discarding its outcome.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn execute<F>(&self, task: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Job::new(task), None)
    }

    /// Run `task` at `priority`, discarding its outcome.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn execute_with_priority<F>(&self, task: F, priority: TaskPriority) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Job::new(task), Some(priority))
    }

    /// Run `task` at the default priority and return a future for its value.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn submit<T, F>(&self, task: F) -> Result<ListenableFuture<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit_with_priority(task, self.default_priority())
    }

    /// Run `task` at `priority` and return a future for its value.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn submit_with_priority<T, F>(
        &self,
        task: F,
        priority: TaskPriority,
    ) -> Result<ListenableFuture<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (job, future) = future_job(move || Ok(task()), self.exception_handler());
        self.dispatch(job, Some(priority))?;
        Ok(future)
    }

    /// Run `task` and resolve the future with `result` once it finishes.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn submit_with_result<T, F>(
        &self,
        task: F,
        result: T,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let (job, future) = future_job(
            move || {
                task();
                Ok(result)
            },
            self.exception_handler(),
        );
        self.dispatch(job, priority)?;
        Ok(future)
    }

    /// Run a fallible `task`; an `Err` resolves the future as failed.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn submit_fallible<T, F>(
        &self,
        task: F,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (job, future) = future_job(move || task().map_err(TaskFailure::from), self.exception_handler());
        self.dispatch(job, priority)?;
        Ok(future)
    }

    /// Run `task` once after `delay`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Rejected` after shutdown.
    fn schedule_with_delay<T, F>(
        &self,
        task: F,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (job, future) = future_job(move || Ok(task()), self.exception_handler());
        self.dispatch_delayed(job, delay, priority)?;
        Ok(future)
    }

    /// Run `task` every `period`, measured between scheduled start times.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` for a zero period,
    /// `SchedulerError::Rejected` after shutdown.
    fn schedule_at_fixed_rate<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatch_recurring(Arc::new(task), Recurrence::FixedRate(period), initial_delay, priority)
    }

    /// Run `task` repeatedly with `delay` between one run's end and the next start.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` for a zero delay,
    /// `SchedulerError::Rejected` after shutdown.
    fn schedule_with_fixed_delay<F>(
        &self,
        task: F,
        initial_delay: Duration,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatch_recurring(Arc::new(task), Recurrence::FixedDelay(delay), initial_delay, priority)
    }
}

impl<S: PriorityScheduler + ?Sized> SubmitterExt for S {}
