//! PostgreSQL materialized views as the aggregate view store.

use async_trait::async_trait;
use sqlx::PgPool;
use timebank_application::AggregateViewStore;
use timebank_core::{AppError, AppResult};
use timebank_domain::AggregateViewDefinition;
use tracing::debug;

/// Refreshes aggregate views with `REFRESH MATERIALIZED VIEW`.
///
/// The concurrent path requires a unique index on the view; PostgreSQL rejects
/// it otherwise and the scheduler falls back to the exclusive path.
#[derive(Clone)]
pub struct PostgresAggregateViewStore {
    pool: PgPool,
}

impl PostgresAggregateViewStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn refresh(&self, view: &AggregateViewDefinition, concurrently: bool) -> AppResult<()> {
        // Relations are validated identifiers, so interpolation is safe here.
        let statement = if concurrently {
            format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {}", view.relation())
        } else {
            format!("REFRESH MATERIALIZED VIEW {}", view.relation())
        };

        debug!(
            view = %view.name(),
            relation = %view.relation(),
            concurrently,
            "refreshing materialized view"
        );

        sqlx::query(statement.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to refresh materialized view '{}': {error}",
                    view.relation()
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl AggregateViewStore for PostgresAggregateViewStore {
    async fn refresh_concurrently(&self, view: &AggregateViewDefinition) -> AppResult<()> {
        self.refresh(view, true).await
    }

    async fn refresh_exclusively(&self, view: &AggregateViewDefinition) -> AppResult<()> {
        self.refresh(view, false).await
    }
}
