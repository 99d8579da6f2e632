//! Logging setup
//!
//! Installs a global `tracing` subscriber with an `EnvFilter`. `RUST_LOG`
//! takes precedence over the default directive.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const DEFAULT_DIRECTIVE: &str = "imp_clusters=info";

/// Build the filter from `RUST_LOG`, falling back to `default_directive`
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize the global subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let directive = if verbose { "imp_clusters=debug" } else { DEFAULT_DIRECTIVE };

    let _ = Registry::default()
        .with(env_filter(directive))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
