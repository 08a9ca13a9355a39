use async_trait::async_trait;
use timebank_core::AppResult;
use timebank_domain::AggregateViewDefinition;

/// Persistent store holding the precomputed aggregate views.
#[async_trait]
pub trait AggregateViewStore: Send + Sync {
    /// Recomputes the view while readers keep seeing the previous contents.
    ///
    /// Fails when the view lacks the uniqueness constraint this path needs.
    async fn refresh_concurrently(&self, view: &AggregateViewDefinition) -> AppResult<()>;

    /// Recomputes the view, blocking readers for the duration.
    async fn refresh_exclusively(&self, view: &AggregateViewDefinition) -> AppResult<()>;
}
