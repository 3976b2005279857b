//! Admission control on top of a [`PriorityScheduler`].
//!
//! `SchedulerLimiter` hands at most `max_concurrency` tasks to the wrapped
//! scheduler at a time. Excess submissions park in a local
//! [`PriorityQueue`] with the same ordering rules as the scheduler's ready
//! queue. Each admitted job carries a [`Permit`]; the permit is released when
//! the job finishes or is dropped unrun (cancelled, or discarded by
//! `shutdown_now`), which admits the next waiting job.
//!
//! The limiter's lock is never held while calling into the wrapped scheduler.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::LimiterConfig;
use crate::core::error::SchedulerError;
use crate::core::exception::ExceptionHandler;
use crate::core::future::ListenableFuture;
use crate::core::queue::PriorityQueue;
use crate::core::scheduler::{PriorityScheduler, RecurringTask};
use crate::core::task::{Job, Recurrence, TaskPriority};

struct LimiterState {
    running: usize,
    waiting: PriorityQueue<Job>,
    next_id: u64,
}

struct LimiterShared<S> {
    scheduler: S,
    max_concurrency: usize,
    state: Mutex<LimiterState>,
}

/// Slot held by an admitted job; dropping it frees the slot.
struct Permit<S: PriorityScheduler + 'static> {
    shared: Arc<LimiterShared<S>>,
}

impl<S: PriorityScheduler + 'static> Drop for Permit<S> {
    fn drop(&mut self) {
        self.shared.release();
    }
}

/// Caps how many tasks run concurrently on a wrapped scheduler.
///
/// Only `dispatch` (and the `execute`/`submit` family built on it) is
/// limited; delayed and recurring work passes straight through.
pub struct SchedulerLimiter<S: PriorityScheduler + 'static> {
    shared: Arc<LimiterShared<S>>,
}

impl<S: PriorityScheduler + 'static> std::fmt::Debug for SchedulerLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SchedulerLimiter")
            .field("max_concurrency", &self.shared.max_concurrency)
            .field("running", &state.running)
            .field("waiting", &state.waiting.len())
            .finish()
    }
}

impl<S: PriorityScheduler + 'static> SchedulerLimiter<S> {
    /// Wrap `scheduler`, allowing `max_concurrency` tasks at once.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if `max_concurrency` is zero.
    pub fn new(scheduler: S, max_concurrency: usize) -> Result<Self, SchedulerError> {
        Self::with_config(scheduler, LimiterConfig::new(max_concurrency))
    }

    /// Wrap `scheduler` using `config`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if the configuration is invalid.
    pub fn with_config(scheduler: S, config: LimiterConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidArgument)?;
        debug!(max_concurrency = config.max_concurrency, "SchedulerLimiter initialized");
        Ok(Self {
            shared: Arc::new(LimiterShared {
                scheduler,
                max_concurrency: config.max_concurrency,
                state: Mutex::new(LimiterState {
                    running: 0,
                    waiting: PriorityQueue::new(),
                    next_id: 0,
                }),
            }),
        })
    }

    /// The wrapped scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.shared.scheduler
    }

    /// Configured concurrency cap.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.shared.max_concurrency
    }

    /// Tasks currently holding a permit.
    #[must_use]
    pub fn current_running(&self) -> usize {
        self.shared.state.lock().running
    }

    /// Tasks waiting for a permit.
    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.shared.state.lock().waiting.len()
    }

    #[cfg(test)]
    fn park(&self, job: Job, priority: TaskPriority) {
        let mut state = self.shared.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let max_wait = self.shared.scheduler.max_wait_for_low_priority();
        state.waiting.push(id, priority, max_wait, job, Instant::now());
    }
}

impl<S: PriorityScheduler + 'static> LimiterShared<S> {
    /// Hand `job` to the wrapped scheduler under a permit already counted in
    /// `running`.
    fn admit(self: &Arc<Self>, job: Job, priority: TaskPriority) -> Result<(), SchedulerError> {
        let permit = Permit {
            shared: Arc::clone(self),
        };
        let job = job.wrap(move |run| {
            let guarded: Box<dyn FnOnce() + Send> = Box::new(move || {
                let _permit = permit;
                run();
            });
            guarded
        });
        // On rejection the job, and with it the permit, is dropped.
        self.scheduler.dispatch(job, Some(priority))
    }

    fn release(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.running = state.running.saturating_sub(1);
        }
        self.consume_available();
    }

    /// Admit waiting jobs while permits are free. Safe to call concurrently:
    /// each pop and permit increment happen under one lock acquisition.
    fn consume_available(self: &Arc<Self>) {
        if self.scheduler.is_shutdown() {
            let abandoned = self.state.lock().waiting.drain();
            for entry in abandoned {
                if let Some(control) = entry.item.control() {
                    control.cancel(false);
                }
            }
            return;
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                if state.running >= self.max_concurrency {
                    return;
                }
                let Some(entry) = state.waiting.poll(Instant::now()) else {
                    return;
                };
                state.running += 1;
                entry
            };
            debug!(task_id = next.id, priority = ?next.priority, "Admitting waiting task");
            let control = next.item.control().cloned();
            if let Err(e) = self.admit(next.item, next.priority) {
                warn!(task_id = next.id, error = %e, "Wrapped scheduler rejected waiting task");
                if let Some(control) = control {
                    control.cancel(false);
                }
            }
        }
    }

    fn discard(shared: &Weak<Self>, id: u64) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let removed = shared.state.lock().waiting.remove(id);
        drop(removed);
    }
}

impl<S: PriorityScheduler + 'static> PriorityScheduler for SchedulerLimiter<S> {
    fn default_priority(&self) -> TaskPriority {
        self.shared.scheduler.default_priority()
    }

    fn max_wait_for_low_priority(&self) -> Duration {
        self.shared.scheduler.max_wait_for_low_priority()
    }

    fn exception_handler(&self) -> Arc<dyn ExceptionHandler> {
        self.shared.scheduler.exception_handler()
    }

    fn is_shutdown(&self) -> bool {
        self.shared.scheduler.is_shutdown()
    }

    fn dispatch(&self, job: Job, priority: Option<TaskPriority>) -> Result<(), SchedulerError> {
        if self.shared.scheduler.is_shutdown() {
            return Err(SchedulerError::Rejected);
        }
        let priority = priority.unwrap_or_else(|| self.shared.scheduler.default_priority());

        let mut state = self.shared.state.lock();
        if state.running < self.shared.max_concurrency {
            state.running += 1;
            drop(state);
            return self.shared.admit(job, priority);
        }

        let id = state.next_id;
        state.next_id += 1;
        let max_wait = job
            .max_wait()
            .unwrap_or_else(|| self.shared.scheduler.max_wait_for_low_priority());
        let control = job.control().cloned();
        state.waiting.push(id, priority, max_wait, job, Instant::now());
        debug!(task_id = id, waiting = state.waiting.len(), "Task parked awaiting permit");
        drop(state);

        if let Some(control) = control {
            let shared = Arc::downgrade(&self.shared);
            control.on_done(Box::new(move || LimiterShared::discard(&shared, id)));
        }
        Ok(())
    }

    fn dispatch_delayed(
        &self,
        job: Job,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<(), SchedulerError> {
        self.shared.scheduler.dispatch_delayed(job, delay, priority)
    }

    fn dispatch_recurring(
        &self,
        task: RecurringTask,
        recurrence: Recurrence,
        initial_delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError> {
        self.shared
            .scheduler
            .dispatch_recurring(task, recurrence, initial_delay, priority)
    }
}
