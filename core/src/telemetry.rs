// Logging setup for binaries embedding the dashboard

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info,shuffleboard_core=info";

/// Install a fmt subscriber honouring `RUST_LOG`, falling back to `default_filter`.
///
/// Returns false when a global subscriber was already installed (tests, embedding apps).
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
