use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use timebank_core::{AppError, AppResult, NonEmptyString};

/// Category of an operational alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A response reported a server-side failure.
    ServerError,
    /// A request exceeded the slow-request latency threshold.
    SlowRequest,
}

impl AlertKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerError => "server_error",
            Self::SlowRequest => "slow_request",
        }
    }
}

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Degraded experience worth a look.
    Medium,
    /// User-facing failure.
    High,
    /// Service-wide failure.
    Critical,
}

impl AlertSeverity {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(AppError::Validation(format!(
                "unknown alert severity '{other}'"
            ))),
        }
    }
}

/// One alert raised by the request pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    kind: AlertKind,
    message: NonEmptyString,
    severity: AlertSeverity,
    context: Value,
    created_at: DateTime<Utc>,
}

impl Alert {
    /// Creates an alert stamped with the current time.
    pub fn new(
        kind: AlertKind,
        message: impl Into<String>,
        severity: AlertSeverity,
        context: Value,
    ) -> AppResult<Self> {
        Ok(Self {
            kind,
            message: NonEmptyString::new(message)?,
            severity,
            context,
            created_at: Utc::now(),
        })
    }

    /// Returns the alert category.
    #[must_use]
    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the alert severity.
    #[must_use]
    pub fn severity(&self) -> AlertSeverity {
        self.severity
    }

    /// Returns structured context attached to the alert.
    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Returns when the alert was raised.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
