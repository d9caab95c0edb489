//! Bootstrap utilities for tidemark binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Filter used when `TIDEMARK_LOG` is unset or unparsable.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter from the TIDEMARK_LOG environment variable.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize tracing with TIDEMARK_LOG environment variable.
///
/// Defaults to "info" level if TIDEMARK_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
