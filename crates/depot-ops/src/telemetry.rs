//! # Tracing Setup

use tracing_subscriber::EnvFilter;

/// Used when neither `RUST_LOG` nor the config sets a filter.
pub const DEFAULT_LOG_FILTER: &str = "info,depot=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - everything at debug
/// - `RUST_LOG=depot_ops=trace` - trace for one crate
/// - otherwise `filter`, or [`DEFAULT_LOG_FILTER`]
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
