//! Logging and metrics exporter setup.

use crate::config::{LoggingConfig, MetricsConfig};
use crate::error::{ServerError, ServerResult};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> ServerResult<()> {
    let addr = config.socket_addr()?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    caption_jobs::register_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}
