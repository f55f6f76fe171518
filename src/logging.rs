//! Process-wide log setup for the binaries.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to `main`. Logs go to stderr so they never interleave with RPC output on
//! stdout.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `smartmarks=debug`.
pub const LOG_ENV: &str = "SMARTMARKS_LOG";

const DEFAULT_FILTER: &str = "info";

/// Installs the stderr subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
