//! Scheduler and limiter configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::TaskPriority;

/// Worker pool configuration for a [`PriorityTaskScheduler`](crate::core::PriorityTaskScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Workers kept alive through idle periods.
    pub core_pool_size: usize,
    /// Upper bound on workers.
    pub max_pool_size: usize,
    /// Idle time after which a worker above the core size exits.
    pub keep_alive_ms: u64,
    /// Priority for submissions that do not name one.
    pub default_priority: TaskPriority,
    /// Longest a low priority task is passed over by high priority work.
    pub max_wait_for_low_priority_ms: u64,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Worker stack size in bytes; platform default when unset.
    pub thread_stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            core_pool_size: cpus,
            max_pool_size: cpus * 2,
            keep_alive_ms: 60_000,
            default_priority: TaskPriority::High,
            max_wait_for_low_priority_ms: 500,
            thread_name_prefix: "prio-worker".into(),
            thread_stack_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core and maximum pool sizes.
    #[must_use]
    pub fn with_pool_size(mut self, core_pool_size: usize, max_pool_size: usize) -> Self {
        self.core_pool_size = core_pool_size;
        self.max_pool_size = max_pool_size;
        self
    }

    /// Set the keep-alive time for workers above the core size.
    #[must_use]
    pub fn with_keep_alive_ms(mut self, keep_alive_ms: u64) -> Self {
        self.keep_alive_ms = keep_alive_ms;
        self
    }

    /// Set the default priority.
    #[must_use]
    pub fn with_default_priority(mut self, priority: TaskPriority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set the low priority starvation bound.
    #[must_use]
    pub fn with_max_wait_for_low_priority_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_for_low_priority_ms = max_wait_ms;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, stack_size: usize) -> Self {
        self.thread_stack_size = Some(stack_size);
        self
    }

    /// Keep-alive as a `Duration`.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Low priority starvation bound as a `Duration`.
    #[must_use]
    pub const fn max_wait_for_low_priority(&self) -> Duration {
        Duration::from_millis(self.max_wait_for_low_priority_ms)
    }

    /// Validate pool sizing.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.core_pool_size == 0 {
            return Err("core_pool_size must be greater than 0".into());
        }
        if self.max_pool_size < self.core_pool_size {
            return Err(format!(
                "max_pool_size ({}) must be at least core_pool_size ({})",
                self.max_pool_size, self.core_pool_size
            ));
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Admission limit for a [`SchedulerLimiter`](crate::core::SchedulerLimiter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Most tasks handed to the wrapped scheduler at once.
    pub max_concurrency: usize,
}

impl LimiterConfig {
    /// Create a limit of `max_concurrency` concurrent tasks.
    #[must_use]
    pub const fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency }
    }

    /// Validate the limit.
    ///
    /// # Errors
    ///
    /// Returns a message if `max_concurrency` is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".into());
        }
        Ok(())
    }
}
