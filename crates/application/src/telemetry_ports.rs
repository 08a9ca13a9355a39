//! Ports for the error tracker and alert manager collaborators.

use async_trait::async_trait;
use serde_json::Value;
use timebank_core::AppResult;
use timebank_domain::{AlertKind, AlertSeverity, ErrorReport};

/// Bounded view of recent failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummary {
    /// Errors recorded since start.
    pub total_errors: u64,
    /// Errors observed within the last minute.
    pub errors_per_minute: f64,
    /// Most recent errors, newest first.
    pub recent_errors: Vec<ErrorReport>,
}

/// Running error-rate source consulted by health probes and fed by the pipeline.
pub trait ErrorTracker: Send + Sync {
    /// Records one failed request.
    fn record_error(&self, report: ErrorReport);

    /// Returns the number of errors observed within the last minute.
    fn errors_per_minute(&self) -> f64;

    /// Returns totals plus at most `recent_limit` recent errors.
    fn summary(&self, recent_limit: usize) -> ErrorSummary;
}

/// Sink for operational alerts.
#[async_trait]
pub trait AlertManager: Send + Sync {
    /// Raises one alert.
    async fn create_alert(
        &self,
        kind: AlertKind,
        message: &str,
        severity: AlertSeverity,
        context: Value,
    ) -> AppResult<()>;
}
