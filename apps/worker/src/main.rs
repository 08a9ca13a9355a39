//! Timebank aggregate refresh worker.

#![forbid(unsafe_code)]

mod worker_config;

use std::sync::Arc;

use timebank_application::AggregateRefreshScheduler;
use timebank_core::AppError;
use timebank_infrastructure::{PostgresAggregateViewStore, connect_and_migrate};
use tracing::{info, warn};

use crate::worker_config::{WorkerConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_and_migrate(
        config.database_url.as_str(),
        config.database_max_connections,
    )
    .await?;

    let store = Arc::new(PostgresAggregateViewStore::new(pool));
    let mut scheduler = AggregateRefreshScheduler::new(store);
    if let Some(refresh_timeout) = config.refresh_timeout {
        scheduler = scheduler.with_refresh_timeout(refresh_timeout);
    }
    scheduler.register_views(config.views.clone())?;

    let scheduler = Arc::new(scheduler);
    let handle = scheduler.start(config.refresh_interval)?;

    info!(
        views = config.views.len(),
        refresh_interval_seconds = config.refresh_interval.as_secs(),
        refresh_timeout_seconds = config.refresh_timeout.map(|timeout| timeout.as_secs()),
        "timebank-worker started"
    );

    shutdown_signal().await;
    scheduler.stop(&handle).await;

    for status in scheduler.view_statuses() {
        info!(
            view = %status.name,
            state = ?status.state,
            last_refreshed_at = ?status.last_refreshed_at,
            "final aggregate view status"
        );
    }

    info!("timebank-worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
