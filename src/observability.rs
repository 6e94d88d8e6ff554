//! Tracing subscriber initialisation.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;

/// Initialize the global JSON-formatted tracing subscriber, gated by
/// an `EnvFilter` built from `config.server.log_level` and falling
/// back to `"info"` on a bad filter string.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().json().with_env_filter(filter).init();

    tracing::info!(endpoints = ?config.server.endpoints, "tracing initialized");
    Ok(())
}

/// Initialize a subscriber that writes to the test harness's captured
/// output, so log lines interleave correctly with `cargo test`.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
