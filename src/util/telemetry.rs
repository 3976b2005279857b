//! Tracing setup for binaries and tests embedding the scheduler.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, unless a global
/// subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_default("warn");
}

/// Like [`init_tracing`], falling back to `directive` when `RUST_LOG` is unset
/// or unparsable.
pub fn init_tracing_with_default(directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
