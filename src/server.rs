use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::routes::{create_router, AppState};
use crate::config::Settings;
use crate::monitoring::engine::AnalyticsEngine;
use crate::monitoring::prometheus::ServiceMetrics;
use crate::monitoring::store::MemorySampleStore;

/// Wires engine, store and metrics together and serves HTTP until ctrl-c.
pub async fn run_server(settings: Settings, port: u16) -> Result<()> {
    let engine = AnalyticsEngine::start(settings.analytics_config())
        .context("invalid analytics configuration")?;

    let store = MemorySampleStore::new(settings.retention());
    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = store.spawn_sweeper(settings.sweep_interval(), stop_rx);

    let state = AppState {
        engine: engine.clone(),
        store: Arc::new(store),
        metrics: Arc::new(ServiceMetrics::new()?),
    };
    let app = create_router(state, &settings.rate_limits);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.server.host, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    engine.shutdown().await;
    let _ = stop_tx.send(true);
    let _ = sweeper.await;
    info!("Server stopped");

    Ok(())
}
