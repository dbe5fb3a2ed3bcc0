mod bootstrap;
mod health;
#[cfg(test)]
mod test_support;
mod webhook;

use std::time::Duration;

use anyhow::Result;
use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use voicely_core::config::{AppConfig, LoadOptions};

use crate::bootstrap::AppState;

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use voicely_core::config::LogFormat::*;

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

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(webhook::router(state))
        .fallback(not_found)
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the config, so load it before anything else.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let bootstrap::Application { config, state } = bootstrap::bootstrap_with_config(config)?;

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "voicely-server listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app(state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = config.server.graceful_shutdown_secs,
        "voicely-server stopping"
    );
    let _ = shutdown_tx.send(());

    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
