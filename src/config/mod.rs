//! Configuration models for schedulers and limiters.

pub mod scheduler;

pub use scheduler::{LimiterConfig, SchedulerConfig};
