//! Alert manager that emits alerts as structured log events.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use timebank_application::AlertManager;
use timebank_core::{AppError, AppResult};
use timebank_domain::{Alert, AlertKind, AlertSeverity};
use tracing::{error, info, warn};

/// Number of alerts retained for inspection by default.
pub const RECENT_ALERT_CAPACITY: usize = 100;

/// Logs each alert at a level derived from its severity and keeps the most recent ones.
#[derive(Debug)]
pub struct TracingAlertManager {
    recent: Mutex<VecDeque<Alert>>,
    capacity: usize,
}

impl TracingAlertManager {
    /// Creates a manager retaining [`RECENT_ALERT_CAPACITY`] alerts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(RECENT_ALERT_CAPACITY)),
            capacity: RECENT_ALERT_CAPACITY,
        }
    }

    /// Creates a manager retaining at most `capacity` alerts.
    pub fn with_capacity(capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::Validation(
                "alert capacity must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    /// Returns retained alerts, newest first.
    #[must_use]
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.recent.lock().iter().rev().cloned().collect()
    }
}

impl Default for TracingAlertManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertManager for TracingAlertManager {
    async fn create_alert(
        &self,
        kind: AlertKind,
        message: &str,
        severity: AlertSeverity,
        context: Value,
    ) -> AppResult<()> {
        let alert = Alert::new(kind, message, severity, context)?;

        match alert.severity() {
            AlertSeverity::Low => info!(
                kind = alert.kind().as_str(),
                severity = alert.severity().as_str(),
                context = %alert.context(),
                "{}",
                alert.message()
            ),
            AlertSeverity::Medium => warn!(
                kind = alert.kind().as_str(),
                severity = alert.severity().as_str(),
                context = %alert.context(),
                "{}",
                alert.message()
            ),
            AlertSeverity::High | AlertSeverity::Critical => error!(
                kind = alert.kind().as_str(),
                severity = alert.severity().as_str(),
                context = %alert.context(),
                "{}",
                alert.message()
            ),
        }

        let mut recent = self.recent.lock();
        recent.push_back(alert);
        while recent.len() > self.capacity {
            recent.pop_front();
        }

        Ok(())
    }
}
