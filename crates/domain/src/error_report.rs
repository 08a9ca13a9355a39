use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failed request as reported to the error tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Response status code.
    pub status_code: u16,
    /// Request method.
    pub method: String,
    /// Matched route or raw path.
    pub path: String,
    /// Short description of the failure.
    pub message: String,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    /// Creates a report stamped with the current time.
    #[must_use]
    pub fn new(
        status_code: u16,
        method: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            method: method.into(),
            path: path.into(),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Returns whether the report describes a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}
