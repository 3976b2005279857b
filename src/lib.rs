//! # Priority Scheduler
//!
//! A priority-aware thread pool with admission limiting, listenable futures
//! and dedicated queue consumers.
//!
//! ## Components
//!
//! - **`PriorityTaskScheduler`**: an elastic pool of OS worker threads fed
//!   from a two-class ready queue. High priority work runs first; Low priority
//!   work that has waited longer than `max_wait_for_low_priority` jumps ahead
//!   so it is never starved. Supports delayed, fixed-rate and fixed-delay
//!   scheduling.
//! - **`SchedulerLimiter`**: wraps any [`PriorityScheduler`](core::PriorityScheduler)
//!   and caps how many submitted tasks run at once, parking the rest in the
//!   same priority order.
//! - **`ListenableFuture`**: completion handle with listeners, blocking and
//!   timed `get`, cancellation with optional interruption, and `.await`.
//! - **`BlockingQueueConsumer`**: a single thread draining a
//!   `crossbeam_channel::Receiver` into a handler, isolating handler panics.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use priority_scheduler::core::{PriorityTaskScheduler, SubmitterExt, TaskPriority};
//!
//! let scheduler = PriorityTaskScheduler::new(2, 4, Duration::from_secs(30)).unwrap();
//!
//! let urgent = scheduler
//!     .submit_with_priority(|| "urgent", TaskPriority::High)
//!     .unwrap();
//! let batch = scheduler
//!     .submit_with_priority(|| 2 + 2, TaskPriority::Low)
//!     .unwrap();
//!
//! assert_eq!(urgent.get().unwrap(), "urgent");
//! assert_eq!(batch.get().unwrap(), 4);
//!
//! scheduler.shutdown();
//! assert!(scheduler.await_termination(Duration::from_secs(5)));
//! ```
//!
//! Task code can poll [`core::current_task_interrupted`] to honour
//! `cancel(true)` and `shutdown_now()`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduler, limiter, futures and queue consumers.
pub mod core;
/// Configuration models for schedulers and limiters.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
