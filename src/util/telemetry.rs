//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Install a default fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (for example `"info"` or
/// `"prometheus_job_scheduler=debug"`) when `RUST_LOG` is unset or invalid.
/// Does nothing if a global subscriber is already installed, so embedding
/// applications keep control of their own subscriber.
pub fn init_tracing(default_directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
