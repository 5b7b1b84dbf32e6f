//! # Caption Server
//!
//! Hosts the caption job queue: loads configuration, installs logging and
//! the Prometheus exporter, starts the dispatcher and shuts it down within
//! the configured grace period on Ctrl+C or SIGTERM.

use caption_jobs::{provider, CaptionQueue, FacadeMetricsSink};
use caption_server::config::{AppConfig, ConfigLoader, LoggingConfig};
use caption_server::telemetry::{init_logging, init_metrics};
use caption_server::ServerResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ConfigLoader::from_default_location() {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    info!("Starting caption server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> ServerResult<()> {
    if config.metrics.enabled {
        init_metrics(&config.metrics)?;
    }

    let provider = provider::from_config(&config.provider)?;
    info!(provider = provider.name(), "Caption provider ready");

    let queue = CaptionQueue::new(config.queue.clone(), provider, Arc::new(FacadeMetricsSink))?;
    queue.start()?;

    let reporter = config
        .logging
        .status_interval()
        .map(|period| tokio::spawn(report_status(queue.clone(), period)));

    shutdown_signal().await;

    if let Some(reporter) = reporter {
        reporter.abort();
    }

    let report = queue.shutdown(config.queue.shutdown_grace()).await;
    info!(
        drained = report.drained,
        abandoned = report.abandoned.len(),
        discarded_waiting = report.discarded_waiting,
        "Server shutdown complete"
    );
    Ok(())
}

/// Periodically log the queue snapshot.
async fn report_status(queue: CaptionQueue, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let status = queue.status();
        info!(
            queue_length = status.queue_length,
            in_flight = status.in_flight_count,
            avg_wait_ms = status.avg_wait_ms,
            retry = status.lanes.retry,
            high = status.lanes.high,
            normal = status.lanes.normal,
            low = status.lanes.low,
            "Queue status"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
