mod agent_info;
mod bootstrap;
mod feedback;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use intune_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::feedback::TracingFeedbackSink;

fn init_logging(config: &AppConfig) {
    use intune_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(true).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(true).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(true).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let sink = Arc::new(TracingFeedbackSink::new(config.service.feedback_logger.clone()));
    let app = bootstrap::bootstrap_with_config(config, sink).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        service_name = %app.config.service.name,
        session_backend = app.session_backend,
        "intune-server listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, app.router).with_graceful_shutdown(async move {
        wait_for_shutdown().await;
        let _ = stop_tx.send(true);
    });

    tokio::select! {
        result = server => result.context("server terminated with an error")?,
        _ = async {
            let _ = stop_rx.changed().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not drain before the grace period ended"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "intune-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(
                event_name = "system.server.signal_error",
                error = %error,
                "failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(
                    event_name = "system.server.signal_error",
                    error = %error,
                    "failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!(
        event_name = "system.server.shutdown_requested",
        correlation_id = "shutdown",
        "shutdown signal received"
    );
}
