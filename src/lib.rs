//! relaylab -- relay arbitrary HTTP requests, classify what came back, and
//! keep an append-only audit trail of every attempt.
//!
//! The pipeline is normalize → execute → classify → record; history queries
//! read the same store independently.

pub mod api;
pub mod audit;
pub mod config;
pub mod record;
pub mod relay;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;

/// Build the shared application state from configuration.
///
/// The store handle is created here and passed explicitly to everything that
/// needs it; dropping the state closes the pool.
pub fn build_state(config: &AppConfig) -> Result<api::state::AppState> {
    tracing::info!(path = %config.storage.path.display(), "Initializing database");
    let pool = storage::open_pool(&config.storage.path)?;
    let store = Arc::new(storage::SqliteStore::new(pool));

    let executor = relay::HttpExecutor::new(config.relay.timeout())
        .context("failed to build outbound HTTP client")?;

    Ok(api::state::AppState::new(
        store,
        Arc::new(executor),
        config.history.limit,
    ))
}

/// Start the relaylab daemon and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = build_state(config)?;

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let app = api::router(state);

    tracing::info!(%addr, timeout_ms = config.relay.timeout_ms, "relaylab listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("relaylab stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
