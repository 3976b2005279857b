//! Sequential composition of runnables.

use std::sync::Arc;

use crate::core::exception::{default_handler, run_isolated, ExceptionHandler};

type Runnable = Box<dyn Fn() + Send + Sync>;

/// Runs a fixed list of runnables, in order, on the calling thread.
///
/// With `exception_stops_chain` a panic ends the chain and propagates to the
/// caller (so a scheduler running the chain records it as a failed task).
/// Otherwise each panic goes to the exception handler and the chain carries on.
pub struct RunnableChain {
    exception_stops_chain: bool,
    runnables: Vec<Runnable>,
    exception_handler: Arc<dyn ExceptionHandler>,
}

impl std::fmt::Debug for RunnableChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableChain")
            .field("exception_stops_chain", &self.exception_stops_chain)
            .field("len", &self.runnables.len())
            .finish_non_exhaustive()
    }
}

impl RunnableChain {
    /// Empty chain.
    #[must_use]
    pub fn new(exception_stops_chain: bool) -> Self {
        Self {
            exception_stops_chain,
            runnables: Vec::new(),
            exception_handler: default_handler(),
        }
    }

    /// Chain over the given runnables.
    pub fn from_runnables<I>(exception_stops_chain: bool, runnables: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Fn() + Send + Sync>>,
    {
        Self {
            runnables: runnables.into_iter().collect(),
            ..Self::new(exception_stops_chain)
        }
    }

    /// Append a runnable.
    #[must_use]
    pub fn then<F>(mut self, runnable: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.runnables.push(Box::new(runnable));
        self
    }

    /// Sink for panics when the chain does not stop on them.
    #[must_use]
    pub fn with_exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = handler;
        self
    }

    /// Number of runnables in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    /// Whether the chain has no runnables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }

    /// Run every runnable in order.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic when `exception_stops_chain` is set.
    pub fn run(&self) {
        for runnable in &self.runnables {
            if self.exception_stops_chain {
                runnable();
            } else {
                run_isolated(self.exception_handler.as_ref(), runnable);
            }
        }
    }
}
