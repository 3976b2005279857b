//! Assemble a scheduler (optionally behind a limiter) from configuration.

use std::sync::Arc;

use crate::config::{LimiterConfig, SchedulerConfig};
use crate::core::{
    default_handler, ConfigurableThreadFactory, ExceptionHandler, PriorityTaskScheduler,
    SchedulerError, SchedulerLimiter, ThreadFactory,
};

/// Builds a [`PriorityTaskScheduler`] from a [`SchedulerConfig`] plus optional
/// collaborators.
///
/// ```rust
/// use priority_scheduler::builders::SchedulerBuilder;
/// use priority_scheduler::config::{LimiterConfig, SchedulerConfig};
/// use priority_scheduler::core::SubmitterExt;
///
/// let limiter = SchedulerBuilder::new(SchedulerConfig::new().with_pool_size(2, 4))
///     .build_limited(LimiterConfig::new(1))
///     .unwrap();
/// let answer = limiter.submit(|| 42).unwrap();
/// assert_eq!(answer.get().unwrap(), 42);
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    thread_factory: Option<Arc<dyn ThreadFactory>>,
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("custom_exception_handler", &self.exception_handler.is_some())
            .field("custom_thread_factory", &self.thread_factory.is_some())
            .finish()
    }
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            exception_handler: None,
            thread_factory: None,
        }
    }

    /// Sink for failures no future can carry.
    #[must_use]
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// Factory for worker threads. Replaces the config's name prefix and
    /// stack size.
    #[must_use]
    pub fn thread_factory(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.thread_factory = Some(factory);
        self
    }

    /// Build the scheduler.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if the configuration is invalid.
    pub fn build(self) -> Result<PriorityTaskScheduler, SchedulerError> {
        let handler = self.exception_handler.unwrap_or_else(default_handler);
        let factory = self.thread_factory.unwrap_or_else(|| {
            Arc::new(ConfigurableThreadFactory::new(
                self.config.thread_name_prefix.clone(),
                self.config.thread_stack_size,
            ))
        });
        PriorityTaskScheduler::with_parts(&self.config, handler, factory)
    }

    /// Build the scheduler wrapped in a [`SchedulerLimiter`].
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidArgument` if either configuration is invalid.
    pub fn build_limited(
        self,
        limiter: LimiterConfig,
    ) -> Result<SchedulerLimiter<Arc<PriorityTaskScheduler>>, SchedulerError> {
        limiter.validate().map_err(SchedulerError::InvalidArgument)?;
        SchedulerLimiter::with_config(Arc::new(self.build()?), limiter)
    }
}
