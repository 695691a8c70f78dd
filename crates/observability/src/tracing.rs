//! Tracing/logging initialization.
//!
//! Operator actions and the scheduled sweeps both log through here; the
//! engine crates emit at debug, so the default filter opens them up while
//! keeping everything else at info.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,agencybill_billing=debug,agencybill_infra=debug";

/// Initialize tracing/logging with the billing defaults.
///
/// `RUST_LOG` overrides the defaults. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVES);
}

/// Initialize with caller-supplied default directives.
pub fn init_with_default(directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(false)
        .try_init();
}
