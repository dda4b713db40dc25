//! Tracing subscriber setup
//!
//! Logs go to stderr so chat output on stdout stays clean. `RUST_LOG` wins over
//! the configured level; `--verbose` raises the configured level to `debug`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Pick the filter directive from config and the verbose flag
fn level_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

fn build_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = level_directive(config, verbose);
    EnvFilter::try_new(&directive).with_context(|| format!("Invalid log level: {directive}"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = build_filter(config, verbose)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;

    tracing::debug!(
        format = %config.format,
        level = %level_directive(config, verbose),
        "Logging initialised"
    );
    Ok(())
}
