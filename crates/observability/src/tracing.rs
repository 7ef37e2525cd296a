//! Subscriber initialization.
//!
//! Filtering follows `RUST_LOG`. Stock workflows log under the
//! `stockhub_infra` target, so `RUST_LOG=stockhub_infra=debug` narrows output
//! to ledger and lease activity.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON logs with timestamps.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(DEFAULT_FILTER))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Human-readable output routed through libtest's capture.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_test_writer()
        .try_init();
}
