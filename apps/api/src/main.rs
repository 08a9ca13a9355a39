//! Timebank API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use timebank_core::AppError;
use timebank_infrastructure::{
    InMemoryErrorTracker, PostgresCredentialVerifier, TracingAlertManager, connect_and_migrate,
};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = connect_and_migrate(
        config.database_url.as_str(),
        config.database_max_connections,
    )
    .await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let app_state = AppState::build(
        config.admission,
        config.health,
        config.telemetry,
        Arc::new(InMemoryErrorTracker::new()),
        Arc::new(TracingAlertManager::new()),
        Arc::new(PostgresCredentialVerifier::new(pool)),
    )?
    .with_trusted_forwarded_for(config.trust_forwarded_for);

    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(
        %address,
        max_login_failures = config.admission.brute_force.max_failures,
        max_connections_per_user = config.admission.connections.max_connections_per_key,
        max_requests_per_window = config.admission.request_rate.max_requests,
        trust_forwarded_for = config.trust_forwarded_for,
        "timebank-api listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|error| AppError::Internal(format!("api server failed: {error}")))?;

    info!("timebank-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
