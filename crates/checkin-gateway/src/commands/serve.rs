use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use checkin_core::config::CheckinConfig;
use checkin_scheduler::{Dispatcher, SqliteTriggerStore, Trigger, TriggerStore};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::app::{self, AppState};
use crate::delivery;
use crate::services::Services;

/// Fired triggers waiting for the delivery loop.
const FIRED_CHANNEL_CAPACITY: usize = 256;

pub async fn execute(config: CheckinConfig) -> anyhow::Result<()> {
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let store: Arc<dyn TriggerStore> = Arc::new(SqliteTriggerStore::open(&db_path)?);

    let services = Services::build(&config)?;
    let scheduler = services.scheduler(&config, store.clone());
    let executor = Arc::new(services.executor(&config)?);

    // Fired-trigger channel: Dispatcher → delivery loop
    let (fired_tx, fired_rx) = mpsc::channel::<Trigger>(FIRED_CHANNEL_CAPACITY);
    let dispatcher = Dispatcher::new(
        store.clone(),
        fired_tx,
        Duration::from_millis(config.scheduler.poll_interval_ms),
    );
    let delivery_task = tokio::spawn(delivery::run(fired_rx, store.clone(), executor));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    if config.gateway.auth_token.is_none() {
        tracing::warn!("gateway.auth_token is not set; the /v1 API is unauthenticated");
    }
    let state = Arc::new(AppState::new(config, scheduler));
    let router = app::build_router(state);

    info!("check-in gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stopping the dispatcher drops the fired channel's sender, which ends the
    // delivery loop once every running check-in has recorded its outcome.
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        tracing::error!("dispatcher task failed: {e}");
    }
    if let Err(e) = delivery_task.await {
        tracing::error!("delivery task failed: {e}");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
