//! Logging setup for Parley Server.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and a console
//! fmt layer, either pretty (local development) or JSON (log shipping).
//!
//! # Configuration
//!
//! - `RUST_LOG`: log filter, overrides the configured one
//! - `[log] filter` / `PARLEY_LOG__FILTER`: fallback filter
//! - `[log] format` / `PARLEY_LOG__FORMAT`: `pretty` or `json`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info,parley_server=debug,parley_chat=debug";

/// Initialize the global subscriber.
pub fn init(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_filter(config.filter.as_deref())?;

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .pretty();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .json()
                .with_current_span(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::info!(format = %config.format, "Telemetry initialized");
    Ok(())
}

fn build_filter(
    configured: Option<&str>,
) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER))?)
}

/// Flush and log shutdown.
pub fn shutdown() {
    tracing::info!("Telemetry shutdown complete");
}
