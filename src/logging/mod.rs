// Logging module for structured logging using the tracing crate.
//
// Structured logger internals (sinks, exporters) are an external
// collaborator per the specification; this module only wires up the
// in-process `tracing` subscriber so every other module can log through
// `tracing::{info,warn,error,debug}!` with consistent formatting.

use std::error::Error;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber for structured logging.
///
/// Configured with:
/// - JSON formatting for easy parsing by log aggregation systems
/// - Filtering based on the configured level, falling back to `RUST_LOG`
/// - Output to stdout, matching the edge-worker deployment model
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber() -> Result<(), Box<dyn Error>> {
    init_subscriber_with_level("info")
}

/// Initialize the subscriber with an explicit default level, used when a
/// loaded `LoggingConfig` is available before `tracing` has been wired up.
pub fn init_subscriber_with_level(default_level: &str) -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| -> Box<dyn Error> { Box::new(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())) })
}

/// Returns true if the named component is enabled under the given
/// logging configuration: `enabledComponents` is an allowlist (if
/// non-empty), `disabledComponents` is always a denylist.
pub fn component_enabled(config: &LoggingConfig, component: &str) -> bool {
    if config.disabled_components.iter().any(|c| c == component) {
        return false;
    }
    if config.enabled_components.is_empty() {
        return true;
    }
    config.enabled_components.iter().any(|c| c == component)
}
