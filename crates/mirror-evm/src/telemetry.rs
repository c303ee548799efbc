//! # Telemetry
//!
//! Installs the process-wide `tracing` subscriber.

use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Subscriber setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed.
    #[error("subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Builds the log filter: `RUST_LOG` when set, else the configured level.
///
/// # Errors
///
/// `TelemetryError::Filter` when the configured level is not a valid
/// directive.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter(e.to_string()))
}

/// Installs a registry with an env filter and a pretty or JSON fmt layer.
///
/// # Errors
///
/// `TelemetryError::AlreadyInstalled` on a second call; the first
/// subscriber stays active.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    let result = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
}
