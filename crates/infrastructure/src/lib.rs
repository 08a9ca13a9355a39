//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_verifier;
mod in_memory_error_tracker;
mod postgres_aggregate_view_store;
mod postgres_credential_verifier;
mod tracing_alert_manager;

pub use argon2_password_verifier::Argon2PasswordVerifier;
pub use in_memory_error_tracker::{ERROR_RATE_WINDOW, InMemoryErrorTracker, RECENT_ERROR_CAPACITY};
pub use postgres_aggregate_view_store::PostgresAggregateViewStore;
pub use postgres_credential_verifier::PostgresCredentialVerifier;
pub use tracing_alert_manager::{RECENT_ALERT_CAPACITY, TracingAlertManager};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use timebank_core::{AppError, AppResult};

/// Connects to PostgreSQL and applies pending migrations.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
