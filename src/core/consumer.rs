//! Dedicated thread draining a blocking source into a handler.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::error::SchedulerError;
use crate::core::exception::{default_handler, run_isolated, ExceptionHandler};
use crate::core::thread::{start_thread, ThreadFactory, START_TIMEOUT};

enum Lifecycle {
    Created,
    Starting,
    Running {
        stop_tx: Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Consumes items from a [`Receiver`] on its own thread.
///
/// Each received item is passed to the handler. A panicking handler is
/// reported to the exception handler and the loop moves on to the next item.
/// The consumer goes `Created -> Starting -> Running -> Stopped` and cannot
/// be restarted.
/// If every sender of the source is dropped the thread exits by itself;
/// the consumer still reports running until [`stop`](Self::stop).
pub struct BlockingQueueConsumer<T: Send + 'static> {
    thread_factory: Arc<dyn ThreadFactory>,
    source: Receiver<T>,
    handler: Handler<T>,
    exception_handler: Arc<dyn ExceptionHandler>,
    lifecycle: Mutex<Lifecycle>,
}

impl<T: Send + 'static> std::fmt::Debug for BlockingQueueConsumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueueConsumer")
            .field("running", &self.is_running())
            .field("pending", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> BlockingQueueConsumer<T> {
    /// Build a consumer. Without an `exception_handler` the process-wide
    /// [`default_handler`] is used.
    pub fn new<F>(
        thread_factory: Arc<dyn ThreadFactory>,
        source: Receiver<T>,
        handler: F,
        exception_handler: Option<Arc<dyn ExceptionHandler>>,
    ) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            thread_factory,
            source,
            handler: Arc::new(handler),
            exception_handler: exception_handler.unwrap_or_else(default_handler),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Start the consumer thread. A no-op if already running or starting.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::ThreadState` if the consumer was stopped, or the
    ///   factory returned without running the consumer body.
    /// - `SchedulerError::ThreadSpawn` if the factory failed to create a thread.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.start_if_not_started()? {
            return Ok(());
        }
        match *self.lifecycle.lock() {
            Lifecycle::Stopped => Err(SchedulerError::ThreadState(
                "consumer has already been stopped".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Start the consumer thread if it has never been started.
    ///
    /// Returns `true` if this call started it. The lifecycle lock is not held
    /// while waiting for the thread to come up, so `is_running` and `stop`
    /// stay responsive; a `stop` during startup wins and the new thread is
    /// shut down again.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start), except a stopped consumer yields
    /// `Ok(false)`. After a failed start the consumer may be started again.
    pub fn start_if_not_started(&self) -> Result<bool, SchedulerError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(*lifecycle, Lifecycle::Created) {
                return Ok(false);
            }
            *lifecycle = Lifecycle::Starting;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let source = self.source.clone();
        let handler = Arc::clone(&self.handler);
        let exception_handler = Arc::clone(&self.exception_handler);
        let started = start_thread(
            self.thread_factory.as_ref(),
            Box::new(move || {
                consume_loop(&source, &stop_rx, handler.as_ref(), exception_handler.as_ref());
            }),
            START_TIMEOUT,
        );

        let mut lifecycle = self.lifecycle.lock();
        let handle = match started {
            Ok(handle) => handle,
            Err(e) => {
                if matches!(*lifecycle, Lifecycle::Starting) {
                    *lifecycle = Lifecycle::Created;
                }
                return Err(e);
            }
        };
        if !matches!(*lifecycle, Lifecycle::Starting) {
            drop(lifecycle);
            debug!("Queue consumer stopped during startup");
            drop(stop_tx);
            if handle.join().is_err() {
                warn!("Queue consumer thread panicked");
            }
            return Ok(false);
        }

        debug!(thread = ?handle.thread().name(), "Queue consumer started");
        *lifecycle = Lifecycle::Running { stop_tx, handle };
        Ok(true)
    }

    /// Whether the consumer has been started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Stop the consumer thread and wait for it to exit. An item already
    /// taken from the source is handled before the thread exits.
    ///
    /// A no-op unless running. Called from the handler itself, the thread is
    /// signalled but not joined.
    pub fn stop(&self) {
        self.stop_if_running();
    }

    /// Stop the consumer if it is running or starting. Returns `true` if
    /// this call stopped it.
    pub fn stop_if_running(&self) -> bool {
        let previous = {
            let mut lifecycle = self.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Running { .. } => std::mem::replace(&mut *lifecycle, Lifecycle::Stopped),
                Lifecycle::Starting => {
                    // The starting call sees this and tears its thread down.
                    *lifecycle = Lifecycle::Stopped;
                    return true;
                }
                Lifecycle::Created | Lifecycle::Stopped => return false,
            }
        };
        let Lifecycle::Running { stop_tx, handle } = previous else {
            return false;
        };

        drop(stop_tx);
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            warn!("Queue consumer thread panicked");
        }
        debug!("Queue consumer stopped");
        true
    }
}

impl<T: Send + 'static> Drop for BlockingQueueConsumer<T> {
    fn drop(&mut self) {
        self.stop_if_running();
    }
}

fn consume_loop<T>(
    source: &Receiver<T>,
    stop: &Receiver<()>,
    handler: &(dyn Fn(T) + Send + Sync),
    exception_handler: &dyn ExceptionHandler,
) {
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(source) -> item => match item {
                Ok(item) => {
                    run_isolated(exception_handler, || handler(item));
                }
                Err(_) => {
                    debug!("Queue consumer source disconnected");
                    break;
                }
            },
        }
    }
}
