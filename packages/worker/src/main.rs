//! Booking worker process.
//!
//! Starts the booking service from `BOOKING_*` environment variables, logs
//! queue events and drains the queue on SIGINT or SIGTERM.

use std::time::Duration;

use api::{BookingConfig, BookingService};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for the active job.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BookingConfig::from_env()?;
    tracing::info!("Connecting to {}", config.db.endpoint);
    let service = BookingService::start(config).await?;

    let mut events = service.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("{}", event.description()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown requested");

    service.shutdown(DRAIN_TIMEOUT).await?;
    logger.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
