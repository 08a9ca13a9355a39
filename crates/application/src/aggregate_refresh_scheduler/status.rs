use chrono::{DateTime, Utc};
use thiserror::Error;

/// Lifecycle of one aggregate view within this process.
///
/// Every view starts `Stale`, meaning "not yet refreshed by this process", not
/// "empty". A `Failed` view keeps serving its last good contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateViewState {
    /// Not refreshed since startup.
    Stale,
    /// A refresh is in flight.
    Refreshing,
    /// The last refresh succeeded.
    Fresh,
    /// The last refresh failed.
    Failed,
}

impl AggregateViewState {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Fresh => "fresh",
            Self::Failed => "failed",
        }
    }
}

/// Refresh strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshMode {
    /// Non-blocking refresh, readers see prior contents meanwhile.
    Concurrent,
    /// Blocking refresh.
    Exclusive,
}

impl RefreshMode {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concurrent => "concurrent",
            Self::Exclusive => "exclusive",
        }
    }
}

/// A successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSuccess {
    /// Strategy that succeeded.
    pub mode: RefreshMode,
    /// Why the concurrent path was abandoned, when it was tried and failed.
    pub fallback_reason: Option<String>,
    /// When the refresh completed.
    pub refreshed_at: DateTime<Utc>,
}

/// A failed refresh. The view keeps its previous contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// Only the exclusive path was attempted.
    #[error("exclusive refresh failed: {exclusive_error}")]
    Exclusive {
        /// Error reported by the exclusive refresh.
        exclusive_error: String,
    },

    /// The concurrent path failed, then the exclusive fallback failed too.
    #[error(
        "concurrent refresh failed: {concurrent_error}; exclusive fallback failed: {exclusive_error}"
    )]
    ConcurrentThenExclusive {
        /// Error reported by the concurrent refresh.
        concurrent_error: String,
        /// Error reported by the exclusive fallback.
        exclusive_error: String,
    },
}

impl RefreshFailure {
    /// Returns the concurrent-path error, if that path was attempted.
    #[must_use]
    pub fn concurrent_error(&self) -> Option<&str> {
        match self {
            Self::Exclusive { .. } => None,
            Self::ConcurrentThenExclusive {
                concurrent_error, ..
            } => Some(concurrent_error.as_str()),
        }
    }
}

/// Result of refreshing one view during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRefreshOutcome {
    /// View name.
    pub view_name: String,
    /// Success or isolated failure.
    pub result: Result<RefreshSuccess, RefreshFailure>,
}

/// Introspection copy of one registered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateViewStatus {
    /// Unique view name.
    pub name: String,
    /// Storage relation refreshed for the view.
    pub relation: String,
    /// Whether the concurrent path is attempted first.
    pub concurrent_refresh_supported: bool,
    /// Current lifecycle state.
    pub state: AggregateViewState,
    /// Completion time of the last successful refresh.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Error of the last refresh, cleared on success.
    pub last_error: Option<String>,
    /// Why the last refresh fell back from the concurrent path.
    pub last_fallback_reason: Option<String>,
}
