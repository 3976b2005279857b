//! Priority-aware worker pool with delayed and recurring scheduling.
//!
//! `PriorityTaskScheduler` owns a resizable set of OS worker threads that pull
//! from a shared [`PriorityQueue`]. Delayed and recurring work waits in a
//! time-ordered map until due, then moves into the ready queue at its
//! configured priority.
//!
//! # Design
//!
//! - **One lock**: ready queue, delay map and pool counters share one
//!   `parking_lot::Mutex`; tasks never run while it is held
//! - **No polling**: idle workers park on a `Condvar` until work arrives, the
//!   next delayed task is due, or their keep-alive expires
//! - **Failure isolation**: every task runs under `catch_unwind`; a panicking
//!   task never takes its worker down
//! - **Verified workers**: a worker counts toward the pool only once its
//!   thread has started running

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::core::error::SchedulerError;
use crate::core::exception::{default_handler, run_isolated, ExceptionHandler};
use crate::core::future::ListenableFuture;
use crate::core::queue::PriorityQueue;
use crate::core::scheduler::{PriorityScheduler, RecurringTask};
use crate::core::task::{Job, Recurrence, TaskControl, TaskPriority};
use crate::core::thread::{start_thread, ConfigurableThreadFactory, ThreadFactory, START_TIMEOUT};

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub pool_size: usize,
    /// Workers parked waiting for work.
    pub idle_workers: usize,
    /// Tasks currently executing.
    pub active_tasks: usize,
    /// Tasks ready to run.
    pub queued_tasks: usize,
    /// Tasks waiting for their delay to elapse.
    pub delayed_tasks: usize,
    /// Tasks accepted since construction.
    pub submitted_tasks: u64,
    /// Task runs finished since construction, whatever their outcome.
    pub completed_tasks: u64,
}

struct RecurringEntry {
    task: RecurringTask,
    recurrence: Recurrence,
    future: ListenableFuture<()>,
}

enum Work {
    Once(Job),
    Recurring(Arc<RecurringEntry>),
}

impl Work {
    fn cancel(&self) -> bool {
        match self {
            Self::Once(job) => job.control().is_some_and(|control| control.cancel(false)),
            Self::Recurring(entry) => entry.future.cancel(false),
        }
    }
}

/// Ready-queue item: the work plus the time it was due, which anchors
/// fixed-rate re-arming.
struct Ready {
    work: Work,
    due: Instant,
}

struct Delayed {
    work: Work,
    priority: TaskPriority,
    max_wait: Duration,
}

struct PoolState {
    ready: PriorityQueue<Ready>,
    delayed: BTreeMap<(Instant, u64), Delayed>,
    delayed_index: HashMap<u64, Instant>,
    /// Delayed work due beyond the clock's range. Never promoted.
    dormant: HashMap<u64, Delayed>,
    /// Interrupt flags of tasks currently executing, by task id.
    running: HashMap<u64, Option<Arc<AtomicBool>>>,
    workers: usize,
    idle: usize,
    next_worker_id: usize,
    next_task_id: u64,
    shutdown: bool,
    stopping: bool,
}

impl PoolState {
    fn next_id(&mut self) -> u64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// File delayed work under its due time; `None` parks it as dormant.
    fn insert_delayed(&mut self, id: u64, due: Option<Instant>, delayed: Delayed) {
        match due {
            Some(due) => {
                self.delayed_index.insert(id, due);
                self.delayed.insert((due, id), delayed);
            }
            None => {
                self.dormant.insert(id, delayed);
            }
        }
    }

    fn delayed_len(&self) -> usize {
        self.delayed.len() + self.dormant.len()
    }

    /// Move every delayed entry due by `now` into the ready queue.
    fn promote_due(&mut self, now: Instant) {
        while let Some(entry) = self.delayed.first_entry() {
            let (due, id) = *entry.key();
            if due > now {
                break;
            }
            let delayed = entry.remove();
            self.delayed_index.remove(&id);
            let item = Ready { work: delayed.work, due };
            self.ready.push(id, delayed.priority, delayed.max_wait, item, now);
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.first_key_value().map(|(&(due, _), _)| due)
    }

    fn remove(&mut self, id: u64) -> Option<Work> {
        if let Some(entry) = self.ready.remove(id) {
            return Some(entry.item.work);
        }
        if let Some(due) = self.delayed_index.remove(&id) {
            return self.delayed.remove(&(due, id)).map(|d| d.work);
        }
        self.dormant.remove(&id).map(|d| d.work)
    }
}

#[derive(Debug, Clone, Copy)]
struct PoolSettings {
    core_pool_size: usize,
    max_pool_size: usize,
    keep_alive: Duration,
    default_priority: TaskPriority,
    max_wait_for_low_priority: Duration,
}

struct Shared {
    settings: PoolSettings,
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
    submitted_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    handler: Arc<dyn ExceptionHandler>,
    thread_factory: Arc<dyn ThreadFactory>,
}

/// Thread pool executing prioritized immediate, delayed and recurring tasks.
///
/// Dropping the scheduler performs a graceful [`shutdown`](Self::shutdown).
pub struct PriorityTaskScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PriorityTaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityTaskScheduler")
            .field("settings", &self.shared.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

impl PriorityTaskScheduler {
    /// Create a scheduler with high default priority and a 500ms low priority
    /// wait bound.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if `core_pool_size` is zero or
    /// `max_pool_size < core_pool_size`.
    pub fn new(
        core_pool_size: usize,
        max_pool_size: usize,
        keep_alive: Duration,
    ) -> Result<Self, SchedulerError> {
        let keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        Self::with_config(
            SchedulerConfig::new()
                .with_pool_size(core_pool_size, max_pool_size)
                .with_keep_alive_ms(keep_alive_ms),
        )
    }

    /// Create a scheduler from `config` with the default exception handler
    /// and a named thread factory.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if the configuration is invalid.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let factory = Arc::new(ConfigurableThreadFactory::new(
            config.thread_name_prefix.clone(),
            config.thread_stack_size,
        ));
        Self::with_parts(&config, default_handler(), factory)
    }

    /// Create a scheduler from `config` with explicit collaborators.
    ///
    /// No thread is started until work arrives or
    /// [`prestart_all_core_threads`](Self::prestart_all_core_threads) is called.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if the configuration is invalid.
    pub fn with_parts(
        config: &SchedulerConfig,
        handler: Arc<dyn ExceptionHandler>,
        thread_factory: Arc<dyn ThreadFactory>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidArgument)?;

        let settings = PoolSettings {
            core_pool_size: config.core_pool_size,
            max_pool_size: config.max_pool_size,
            keep_alive: config.keep_alive(),
            default_priority: config.default_priority,
            max_wait_for_low_priority: config.max_wait_for_low_priority(),
        };

        info!(
            core_pool_size = settings.core_pool_size,
            max_pool_size = settings.max_pool_size,
            keep_alive_ms = config.keep_alive_ms,
            default_priority = ?settings.default_priority,
            "PriorityTaskScheduler initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                state: Mutex::new(PoolState {
                    ready: PriorityQueue::new(),
                    delayed: BTreeMap::new(),
                    delayed_index: HashMap::new(),
                    dormant: HashMap::new(),
                    running: HashMap::new(),
                    workers: 0,
                    idle: 0,
                    next_worker_id: 0,
                    next_task_id: 0,
                    shutdown: false,
                    stopping: false,
                }),
                work_available: Condvar::new(),
                terminated: Condvar::new(),
                submitted_tasks: AtomicU64::new(0),
                completed_tasks: AtomicU64::new(0),
                handler,
                thread_factory,
            }),
        })
    }

    /// Configured core pool size.
    #[must_use]
    pub fn core_pool_size(&self) -> usize {
        self.shared.settings.core_pool_size
    }

    /// Configured maximum pool size.
    #[must_use]
    pub fn max_pool_size(&self) -> usize {
        self.shared.settings.max_pool_size
    }

    /// Configured keep-alive for workers above the core size.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.shared.settings.keep_alive
    }

    /// Number of live worker threads.
    #[must_use]
    pub fn current_pool_size(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Snapshot of pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            pool_size: state.workers,
            idle_workers: state.idle,
            active_tasks: state.running.len(),
            queued_tasks: state.ready.len(),
            delayed_tasks: state.delayed_len(),
            submitted_tasks: self.shared.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
        }
    }

    /// Start workers until the core pool size is reached.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Rejected` after shutdown.
    /// - `SchedulerError::ThreadState` if the thread factory returned without
    ///   running the worker body.
    /// - The thread factory's own error if it could not create a thread.
    pub fn prestart_all_core_threads(&self) -> Result<(), SchedulerError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(SchedulerError::Rejected);
        }
        while state.workers < self.shared.settings.core_pool_size {
            self.shared.spawn_worker(&mut state)?;
        }
        Ok(())
    }

    /// Stop accepting work. Queued and delayed one-shot tasks still run;
    /// recurring tasks are cancelled and never re-armed. Delayed tasks due
    /// beyond the clock's range can never run and are cancelled too.
    pub fn shutdown(&self) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            info!("Shutting down priority scheduler");

            let recurring_ids: Vec<u64> = state
                .delayed
                .iter()
                .filter(|(_, d)| matches!(d.work, Work::Recurring(_)))
                .map(|(&(_, id), _)| id)
                .collect();
            let mut cancelled: Vec<Work> = recurring_ids
                .into_iter()
                .filter_map(|id| state.remove(id))
                .collect();
            cancelled.extend(state.dormant.drain().map(|(_, d)| d.work));

            let pending = !state.ready.is_empty() || !state.delayed.is_empty();
            if pending && state.workers == 0 {
                if let Err(e) = self.shared.spawn_worker(&mut state) {
                    error!(error = %e, "Failed to start worker to drain queue on shutdown");
                }
            }
            if state.workers == 0 {
                self.shared.terminated.notify_all();
            }
            self.shared.work_available.notify_all();
            cancelled
        };

        for work in &cancelled {
            work.cancel();
        }
    }

    /// Stop accepting work, cancel every queued task and raise the interrupt
    /// flag of running tasks. Returns the number of tasks dropped.
    pub fn shutdown_now(&self) -> usize {
        let (dropped, interrupts) = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.stopping = true;
            warn!("Shutting down priority scheduler immediately");

            let mut dropped: Vec<Work> = state.ready.drain().into_iter().map(|e| e.item.work).collect();
            state.delayed_index.clear();
            dropped.extend(std::mem::take(&mut state.delayed).into_values().map(|d| d.work));
            dropped.extend(state.dormant.drain().map(|(_, d)| d.work));
            let interrupts: Vec<Arc<AtomicBool>> = state.running.values().flatten().cloned().collect();

            if state.workers == 0 {
                self.shared.terminated.notify_all();
            }
            self.shared.work_available.notify_all();
            (dropped, interrupts)
        };

        for flag in interrupts {
            flag.store(true, Ordering::Release);
        }
        for work in &dropped {
            work.cancel();
        }
        dropped.len()
    }

    /// Block until every worker exited after shutdown, or `timeout` elapses.
    /// Returns `true` if the pool terminated. A timeout beyond the clock's
    /// range waits without bound.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        while !(state.shutdown && state.workers == 0) {
            match deadline {
                Some(deadline) => {
                    if self.shared.terminated.wait_until(&mut state, deadline).timed_out() {
                        return state.shutdown && state.workers == 0;
                    }
                }
                None => self.shared.terminated.wait(&mut state),
            }
        }
        true
    }

    /// Whether the scheduler shut down and every worker exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.shutdown && state.workers == 0
    }

    fn resolve(&self, priority: Option<TaskPriority>) -> TaskPriority {
        priority.unwrap_or(self.shared.settings.default_priority)
    }

    /// Remove the task from the queues once its future is terminal, so
    /// cancelled work never lingers.
    fn watch(&self, id: u64, control: &dyn TaskControl) {
        let shared = Arc::downgrade(&self.shared);
        control.on_done(Box::new(move || Shared::discard(&shared, id)));
    }
}

impl Shared {
    fn discard(shared: &Weak<Self>, id: u64) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let removed = shared.state.lock().remove(id);
        if removed.is_some() {
            debug!(task_id = id, "Removed cancelled task from queue");
        }
        // Dropped here, outside the lock.
        drop(removed);
    }

    /// Wake or start a worker for newly ready work.
    fn signal_work(self: &Arc<Self>, state: &mut PoolState) -> Result<(), SchedulerError> {
        let below_core = state.workers < self.settings.core_pool_size;
        let starved = state.ready.len() > state.idle && state.workers < self.settings.max_pool_size;
        let spawned = if below_core || starved || state.workers == 0 {
            self.spawn_worker(state)
        } else {
            Ok(())
        };
        if state.idle > 0 {
            self.work_available.notify_one();
        }
        if let Err(e) = &spawned {
            error!(error = %e, pool_size = state.workers, "Failed to start worker thread");
        }
        spawned
    }

    /// Start one worker. The worker body blocks on the pool lock, which the
    /// caller holds, so it cannot observe `workers` before the count is final.
    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState) -> Result<(), SchedulerError> {
        let worker_id = state.next_worker_id;
        state.next_worker_id += 1;
        state.workers += 1;

        let shared = Arc::clone(self);
        match start_thread(
            self.thread_factory.as_ref(),
            Box::new(move || worker_loop(&shared, worker_id)),
            START_TIMEOUT,
        ) {
            Ok(_detached) => {
                debug!(worker_id = worker_id, pool_size = state.workers, "Worker thread spawned");
                Ok(())
            }
            Err(e) => {
                state.workers -= 1;
                Err(e)
            }
        }
    }

    fn enqueue(self: &Arc<Self>, work: Work, delay: Duration, priority: TaskPriority, max_wait: Duration) -> Result<u64, SchedulerError> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(SchedulerError::Rejected);
        }
        let id = state.next_id();
        let now = Instant::now();
        if delay.is_zero() {
            state.ready.push(id, priority, max_wait, Ready { work, due: now }, now);
        } else {
            state.insert_delayed(id, now.checked_add(delay), Delayed { work, priority, max_wait });
        }
        if let Err(e) = self.signal_work(&mut state) {
            if state.workers == 0 {
                // Nothing would ever run it.
                let abandoned = state.remove(id);
                drop(state);
                drop(abandoned);
                return Err(e);
            }
        }
        self.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Run one task outside the lock. Returns the recurring entry to re-arm.
    fn run(&self, work: Work) -> Option<Arc<RecurringEntry>> {
        let rearm = match work {
            Work::Once(job) => {
                run_isolated(self.handler.as_ref(), || job.run());
                None
            }
            Work::Recurring(entry) => {
                if entry.future.is_done() {
                    return None;
                }
                let task = Arc::clone(&entry.task);
                let job = Job::new(move || task()).with_control(Arc::new(entry.future.clone()));
                run_isolated(self.handler.as_ref(), || job.run());
                Some(entry)
            }
        };
        self.completed_tasks.fetch_add(1, Ordering::Relaxed);
        rearm
    }
}

/// Worker body: take the highest ranked ready task, run it, repeat.
fn worker_loop(shared: &Arc<Shared>, worker_id: usize) {
    debug!(worker_id = worker_id, "Worker thread started");
    let settings = shared.settings;
    let mut state = shared.state.lock();

    loop {
        let Some((id, ready, priority, max_wait)) = take_next(shared, &mut state, worker_id) else {
            break;
        };

        let flag = match &ready.work {
            Work::Once(job) => job.control().map(|c| c.interrupt_flag()),
            Work::Recurring(entry) => Some(entry.future.interrupt_flag()),
        };
        state.running.insert(id, flag);

        // More ready work than idle workers: grow the pool. Failures are
        // logged and this worker keeps serving the queue.
        if !state.ready.is_empty() {
            let _ = shared.signal_work(&mut state);
        }

        let due = ready.due;
        let rearm = MutexGuard::unlocked(&mut state, || shared.run(ready.work));
        state.running.remove(&id);

        if let Some(entry) = rearm {
            if state.shutdown || entry.future.is_done() {
                MutexGuard::unlocked(&mut state, || {
                    entry.future.cancel(false);
                });
            } else {
                let next = match entry.recurrence {
                    Recurrence::FixedRate(period) => due.checked_add(period),
                    Recurrence::FixedDelay(delay) => Instant::now().checked_add(delay),
                };
                state.insert_delayed(
                    id,
                    next,
                    Delayed {
                        work: Work::Recurring(entry),
                        priority,
                        max_wait,
                    },
                );
            }
        }
    }

    state.workers -= 1;
    if state.workers == 0 {
        shared.terminated.notify_all();
    }
    debug!(
        worker_id = worker_id,
        pool_size = state.workers,
        core_pool_size = settings.core_pool_size,
        "Worker thread exiting"
    );
}

/// Wait for the next ready task. `None` means this worker should exit.
fn take_next(
    shared: &Arc<Shared>,
    state: &mut MutexGuard<'_, PoolState>,
    worker_id: usize,
) -> Option<(u64, Ready, TaskPriority, Duration)> {
    let settings = shared.settings;
    let idle_since = Instant::now();

    loop {
        if state.stopping {
            return None;
        }
        let now = Instant::now();
        state.promote_due(now);
        if let Some(entry) = state.ready.poll(now) {
            let waited = now.saturating_duration_since(entry.enqueued_at);
            debug!(
                worker_id = worker_id,
                task_id = entry.id,
                priority = ?entry.priority,
                waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                "Worker executing task"
            );
            let max_wait = settings.max_wait_for_low_priority;
            return Some((entry.id, entry.item, entry.priority, max_wait));
        }
        if state.shutdown && state.delayed.is_empty() {
            return None;
        }

        let above_core = state.workers > settings.core_pool_size;
        let expires_at = above_core.then(|| idle_since + settings.keep_alive);
        if let Some(expires_at) = expires_at {
            if now >= expires_at {
                debug!(worker_id = worker_id, "Worker keep-alive expired");
                return None;
            }
        }

        let wake_at = match (state.next_due(), expires_at) {
            (Some(due), Some(expires)) => Some(due.min(expires)),
            (due, expires) => due.or(expires),
        };
        state.idle += 1;
        match wake_at {
            Some(at) => {
                shared.work_available.wait_until(state, at);
            }
            None => shared.work_available.wait(state),
        }
        state.idle -= 1;
    }
}

impl PriorityScheduler for PriorityTaskScheduler {
    fn default_priority(&self) -> TaskPriority {
        self.shared.settings.default_priority
    }

    fn max_wait_for_low_priority(&self) -> Duration {
        self.shared.settings.max_wait_for_low_priority
    }

    fn exception_handler(&self) -> Arc<dyn ExceptionHandler> {
        Arc::clone(&self.shared.handler)
    }

    fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    fn dispatch(&self, job: Job, priority: Option<TaskPriority>) -> Result<(), SchedulerError> {
        self.dispatch_delayed(job, Duration::ZERO, priority)
    }

    fn dispatch_delayed(
        &self,
        job: Job,
        delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<(), SchedulerError> {
        let priority = self.resolve(priority);
        let max_wait = job.max_wait().unwrap_or(self.shared.settings.max_wait_for_low_priority);
        let control = job.control().cloned();
        let id = self.shared.enqueue(Work::Once(job), delay, priority, max_wait)?;
        if let Some(control) = control {
            self.watch(id, control.as_ref());
        }
        Ok(())
    }

    fn dispatch_recurring(
        &self,
        task: RecurringTask,
        recurrence: Recurrence,
        initial_delay: Duration,
        priority: Option<TaskPriority>,
    ) -> Result<ListenableFuture<()>, SchedulerError> {
        if recurrence.interval().is_zero() {
            return Err(SchedulerError::InvalidArgument(
                "recurring period must be greater than zero".into(),
            ));
        }
        let priority = self.resolve(priority);
        let future = ListenableFuture::with_handler(Arc::clone(&self.shared.handler));
        let entry = Arc::new(RecurringEntry {
            task,
            recurrence,
            future: future.clone(),
        });
        let max_wait = self.shared.settings.max_wait_for_low_priority;
        let id = self
            .shared
            .enqueue(Work::Recurring(entry), initial_delay, priority, max_wait)?;
        self.watch(id, &future);
        Ok(future)
    }
}

impl Drop for PriorityTaskScheduler {
    fn drop(&mut self) {
        // Workers are detached; they drain remaining work and exit on their own.
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FutureError;
    use crate::core::scheduler::SubmitterExt;
    use std::sync::atomic::AtomicUsize;

    fn single_worker() -> PriorityTaskScheduler {
        PriorityTaskScheduler::new(1, 1, Duration::from_millis(100)).unwrap()
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(matches!(
            PriorityTaskScheduler::new(0, 1, Duration::ZERO),
            Err(SchedulerError::InvalidArgument(_))
        ));
        assert!(matches!(
            PriorityTaskScheduler::new(2, 1, Duration::ZERO),
            Err(SchedulerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_no_threads_until_work() {
        let scheduler = PriorityTaskScheduler::new(2, 4, Duration::from_secs(1)).unwrap();
        assert_eq!(scheduler.current_pool_size(), 0);
        scheduler.prestart_all_core_threads().unwrap();
        assert_eq!(scheduler.current_pool_size(), 2);
    }

    #[test]
    fn test_submit_round_trip() {
        let scheduler = single_worker();
        let future = scheduler.submit(|| 6 * 7).unwrap();
        assert_eq!(future.get().unwrap(), 42);
        assert_eq!(scheduler.stats().submitted_tasks, 1);

        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::from_secs(5)));
        let stats = scheduler.stats();
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.pool_size, 0);
        assert!(scheduler.is_terminated());
    }

    #[test]
    fn test_recurring_zero_period_rejected() {
        let scheduler = single_worker();
        let result = scheduler.schedule_at_fixed_rate(|| {}, Duration::ZERO, Duration::ZERO, None);
        assert!(matches!(result, Err(SchedulerError::InvalidArgument(_))));
    }

    #[test]
    fn test_worker_survives_panic() {
        let scheduler = single_worker();
        let failed = scheduler.submit(|| -> u32 { panic!("task failure") }).unwrap();
        assert!(failed.get().is_err());
        let after = scheduler.submit(|| 1).unwrap();
        assert_eq!(after.get().unwrap(), 1);
        assert_eq!(scheduler.current_pool_size(), 1);
    }

    #[test]
    fn test_cancelled_task_removed_from_queue() {
        let scheduler = single_worker();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let blocker = scheduler
            .submit(move || {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv().unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let queued = scheduler
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(queued.cancel(false));
        assert_eq!(scheduler.stats().queued_tasks, 0);

        release_tx.send(()).unwrap();
        blocker.get().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_above_core_worker_expires() {
        let scheduler = PriorityTaskScheduler::new(1, 3, Duration::from_millis(20)).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
        let futures: Vec<_> = (0..3)
            .map(|_| {
                let rx = release_rx.clone();
                scheduler
                    .submit(move || {
                        let _ = rx.recv();
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(scheduler.current_pool_size(), 3);
        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }
        for future in futures {
            future.get().unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.current_pool_size() > 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(scheduler.current_pool_size(), 1);
    }

    #[test]
    fn test_shutdown_now_cancels_queued() {
        let scheduler = single_worker();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let running = scheduler
            .submit(move || {
                let _ = started_tx.send(());
                while !crate::core::current_task_interrupted() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                "interrupted"
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued: Vec<_> = (0..3).map(|i| scheduler.submit(move || i).unwrap()).collect();
        assert_eq!(scheduler.shutdown_now(), 3);
        assert!(queued.iter().all(ListenableFuture::is_cancelled));
        assert_eq!(running.get().unwrap(), "interrupted");
        assert!(scheduler.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_unbounded_delay_stays_dormant() {
        let scheduler = single_worker();
        let never = scheduler.schedule_with_delay(|| 1, Duration::MAX, None).unwrap();
        assert_eq!(scheduler.stats().delayed_tasks, 1);
        assert!(matches!(
            never.get_timeout(Duration::from_millis(30)),
            Err(FutureError::Timeout)
        ));

        scheduler.shutdown();
        assert!(never.is_cancelled());
        assert_eq!(scheduler.stats().delayed_tasks, 0);
        assert!(scheduler.await_termination(Duration::MAX));
    }

    #[test]
    fn test_cancel_dormant_task() {
        let scheduler = single_worker();
        let never = scheduler.schedule_with_delay(|| (), Duration::MAX, None).unwrap();
        assert!(never.cancel(false));
        assert_eq!(scheduler.stats().delayed_tasks, 0);
    }

    #[test]
    fn test_unbounded_period_runs_once() {
        let scheduler = single_worker();
        let (tx, rx) = crossbeam_channel::unbounded();
        let recurring = scheduler
            .schedule_with_fixed_delay(
                move || {
                    let _ = tx.send(());
                },
                Duration::ZERO,
                Duration::MAX,
                None,
            )
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(!recurring.is_done());
        assert!(recurring.cancel(false));
        assert_eq!(scheduler.shutdown_now(), 0);
    }

    #[test]
    fn test_unbounded_max_wait_override() {
        let scheduler = single_worker();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job = Job::new(move || {
            let _ = tx.send(7);
        })
        .with_max_wait(Duration::MAX);
        scheduler.dispatch(job, Some(TaskPriority::Low)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn test_await_termination_unbounded_timeout() {
        let scheduler = single_worker();
        assert_eq!(scheduler.submit(|| 1).unwrap().get().unwrap(), 1);
        scheduler.shutdown();
        assert!(scheduler.await_termination(Duration::MAX));
    }
}
