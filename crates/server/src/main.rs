mod auth;
mod bootstrap;
mod chat;
mod health;

use std::time::Duration;

use anyhow::Result;
use tailor_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

use crate::chat::ApiState;

fn init_logging(config: &AppConfig) {
    use tailor_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let api = chat::router(
        ApiState { runtime: app.runtime.clone(), store: app.store.clone() },
        app.verifier.clone(),
    );
    let router = health::router(app.db_pool.clone())
        .merge(api)
        .layer(chat::cors_layer(&app.config.server.cors_allowed_origins));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "tailor-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut drain_rx = shutdown_rx.clone();
    let mut server_rx = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_rx.changed().await;
        info!(
            event_name = "system.server.stopping",
            correlation_id = "shutdown",
            "shutdown signal received, draining in-flight requests"
        );
    });

    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "grace period elapsed before all requests drained"
            );
        }
    }

    info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "tailor-server stopped"
    );
    Ok(())
}
