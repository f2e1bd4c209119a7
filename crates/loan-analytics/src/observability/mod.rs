//! Observability module for tracing, metrics, and logging

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "metrics")]
pub use metrics::{init_metrics, render_metrics};
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;
use crate::{Error, Result};

/// Initialize observability stack
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_observability(config: &TelemetryConfig) -> Result<()> {
    #[cfg(feature = "metrics")]
    {
        init_metrics()?;
    }

    init_logging(config)
}

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(config: &TelemetryConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, fmt};

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))?;

    tracing::debug!(service = %config.service_name, "Logging initialized");
    Ok(())
}
