//! Single-assignment result cell with listeners and cancellation.
//!
//! A [`ListenableFuture`] starts pending and transitions exactly once into one
//! of three terminal states: completed, failed or cancelled. Listeners run on
//! the thread that performs the transition (or immediately, on the registering
//! thread, if the future is already terminal). Blocking waiters park on a
//! `parking_lot::Condvar`; async waiters register a `Waker`.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::error::{FutureError, TaskFailure};
use crate::core::exception::{default_handler, run_isolated, ExceptionHandler};

type Listener = Box<dyn FnOnce() + Send>;

enum State<T> {
    Pending,
    /// Picked up by a worker; no longer cancellable without cooperation.
    Running,
    Completed(T),
    Failed(TaskFailure),
    Cancelled,
}

impl<T> State<T> {
    const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

struct Slot<T> {
    state: State<T>,
    listeners: Vec<Listener>,
    wakers: Vec<Waker>,
}

impl<T: Clone> Slot<T> {
    fn outcome(&self) -> Option<Result<T, FutureError>> {
        match &self.state {
            State::Pending | State::Running => None,
            State::Completed(value) => Some(Ok(value.clone())),
            State::Failed(cause) => Some(Err(FutureError::Failed(cause.clone()))),
            State::Cancelled => Some(Err(FutureError::Cancelled)),
        }
    }
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
    interrupt: Arc<AtomicBool>,
    handler: Arc<dyn ExceptionHandler>,
}

/// Handle to an asynchronous result.
///
/// Cloning yields another handle to the same cell.
pub struct ListenableFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ListenableFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ListenableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenableFuture")
            .field("state", &self.inner.slot.lock().state.name())
            .finish()
    }
}

impl<T> Default for ListenableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenableFuture<T> {
    /// Create a pending future whose listener panics go to the default handler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handler(default_handler())
    }

    /// Create a pending future routing listener panics to `handler`.
    #[must_use]
    pub fn with_handler(handler: Arc<dyn ExceptionHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    state: State::Pending,
                    listeners: Vec::new(),
                    wakers: Vec::new(),
                }),
                done: Condvar::new(),
                interrupt: Arc::new(AtomicBool::new(false)),
                handler,
            }),
        }
    }

    /// Resolve with a value. Returns `false` if already terminal.
    pub fn complete(&self, value: T) -> bool {
        self.transition(State::Completed(value))
    }

    /// Resolve with a failure. Returns `false` if already terminal.
    pub fn fail(&self, cause: impl Into<TaskFailure>) -> bool {
        self.transition(State::Failed(cause.into()))
    }

    /// Attempt to cancel.
    ///
    /// Succeeds only while the work has not started. Once running, the
    /// attempt returns `false`; with `may_interrupt` it also raises the
    /// interrupt flag the running task can observe through
    /// [`current_task_interrupted`](crate::core::current_task_interrupted).
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        let slot = self.inner.slot.lock();
        if slot.state.is_terminal() {
            return false;
        }
        if may_interrupt {
            self.inner.interrupt.store(true, Ordering::Release);
        }
        if matches!(slot.state, State::Pending) {
            return self.finish(slot, State::Cancelled);
        }
        false
    }

    /// Whether the future reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.slot.lock().state.is_terminal()
    }

    /// Whether the future was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.slot.lock().state, State::Cancelled)
    }

    /// Register a callback for the terminal transition.
    ///
    /// Runs immediately on this thread if the future is already terminal.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.inner.slot.lock();
        if slot.state.is_terminal() {
            drop(slot);
            run_isolated(self.inner.handler.as_ref(), listener);
        } else {
            slot.listeners.push(Box::new(listener));
        }
    }

    /// Mark the work as started. Returns `false` if it was cancelled first.
    pub(crate) fn try_start(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if matches!(slot.state, State::Pending) {
            slot.state = State::Running;
            true
        } else {
            false
        }
    }

    pub(crate) fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.interrupt)
    }

    fn transition(&self, next: State<T>) -> bool {
        let slot = self.inner.slot.lock();
        if slot.state.is_terminal() {
            return false;
        }
        self.finish(slot, next)
    }

    /// Store the terminal state, then wake waiters and drain listeners
    /// outside the lock.
    fn finish(&self, mut slot: parking_lot::MutexGuard<'_, Slot<T>>, next: State<T>) -> bool {
        slot.state = next;
        let listeners = std::mem::take(&mut slot.listeners);
        let wakers = std::mem::take(&mut slot.wakers);
        drop(slot);

        self.inner.done.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for listener in listeners {
            run_isolated(self.inner.handler.as_ref(), listener);
        }
        true
    }
}

impl<T: Clone> ListenableFuture<T> {
    /// Block until terminal and return the outcome.
    ///
    /// # Errors
    ///
    /// `FutureError::Cancelled` or `FutureError::Failed` for non-value outcomes.
    pub fn get(&self) -> Result<T, FutureError> {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome() {
                return outcome;
            }
            self.inner.done.wait(&mut slot);
        }
    }

    /// Block up to `timeout` for the outcome.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus `FutureError::Timeout` if the wait elapsed.
    /// A timeout does not cancel the future. A timeout beyond the clock's
    /// range waits like [`get`](Self::get).
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get();
        };
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome() {
                return outcome;
            }
            if self.inner.done.wait_until(&mut slot, deadline).timed_out() {
                return slot.outcome().unwrap_or(Err(FutureError::Timeout));
            }
        }
    }

    /// Non-blocking snapshot of the outcome, if terminal.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<T, FutureError>> {
        self.inner.slot.lock().outcome()
    }
}

impl<T: Clone> std::future::Future for ListenableFuture<T> {
    type Output = Result<T, FutureError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.inner.slot.lock();
        if let Some(outcome) = slot.outcome() {
            return Poll::Ready(outcome);
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
