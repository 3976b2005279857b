//! Scheduler, limiter, futures and queue consumers.

pub mod chain;
pub mod consumer;
pub mod error;
pub mod exception;
pub mod future;
pub mod limiter;
pub(crate) mod queue;
pub mod scheduler;
pub mod task;
pub mod thread;
pub mod worker_pool;

pub use chain::RunnableChain;
pub use consumer::BlockingQueueConsumer;
pub use error::{AppResult, FutureError, SchedulerError, TaskFailure};
pub use exception::{default_handler, install_default_handler, ExceptionHandler, TracingExceptionHandler};
pub use future::ListenableFuture;
pub use limiter::SchedulerLimiter;
pub use scheduler::{PriorityScheduler, RecurringTask, SubmitterExt};
pub use task::{current_task_interrupted, Job, Recurrence, TaskControl, TaskPriority};
pub use thread::{ConfigurableThreadFactory, ThreadBody, ThreadFactory};
pub use worker_pool::{PoolStats, PriorityTaskScheduler};
