//! Shared utilities.

pub mod telemetry;

pub use telemetry::{init_tracing, init_tracing_with_default};
