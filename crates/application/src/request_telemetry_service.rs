//! Per-request telemetry pipeline.
//!
//! Every completed request is recorded in [`RequestMetrics`]. Server errors are
//! also reported to the [`ErrorTracker`], and server errors or slow requests
//! raise an alert when their severity reaches the configured minimum. Alerts
//! are delivered on a background task so a slow alert sink never delays the
//! response being observed.


use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use timebank_core::{AppError, AppResult};
use timebank_domain::{AlertKind, AlertSeverity, ErrorReport};
use tokio::runtime::Handle;
use tracing::warn;

use crate::request_metrics::RequestMetrics;
use crate::telemetry_ports::{AlertManager, ErrorTracker};

/// Alerting thresholds for the telemetry pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPolicy {
    /// Latency at or above which a request counts as slow.
    pub slow_request_threshold: Duration,
    /// Alerts below this severity are not raised.
    pub alert_min_severity: AlertSeverity,
}

impl Default for TelemetryPolicy {
    fn default() -> Self {
        Self {
            slow_request_threshold: Duration::from_millis(1_000),
            alert_min_severity: AlertSeverity::Medium,
        }
    }
}

impl TelemetryPolicy {
    /// Validates threshold values.
    pub fn validate(&self) -> AppResult<()> {
        if self.slow_request_threshold.is_zero() {
            return Err(AppError::Validation(
                "slow request threshold must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

/// One completed request as seen by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestObservation {
    /// Request method.
    pub method: String,
    /// Matched route or raw path.
    pub path: String,
    /// Response status code.
    pub status_code: u16,
    /// Time from receipt to response.
    pub latency: Duration,
}

/// Side effects produced while observing one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationEffects {
    /// Whether an error report was recorded.
    pub error_reported: bool,
    /// Alerts handed off for background delivery.
    pub alerts_dispatched: Vec<AlertKind>,
}

/// Feeds request outcomes into metrics, error tracking and alerting.
#[derive(Clone)]
pub struct RequestTelemetryService {
    metrics: Arc<RequestMetrics>,
    error_tracker: Arc<dyn ErrorTracker>,
    alert_manager: Arc<dyn AlertManager>,
    policy: TelemetryPolicy,
}

impl RequestTelemetryService {
    /// Creates the pipeline after validating the policy.
    pub fn new(
        metrics: Arc<RequestMetrics>,
        error_tracker: Arc<dyn ErrorTracker>,
        alert_manager: Arc<dyn AlertManager>,
        policy: TelemetryPolicy,
    ) -> AppResult<Self> {
        policy.validate()?;

        Ok(Self {
            metrics,
            error_tracker,
            alert_manager,
            policy,
        })
    }

    /// Returns the shared metrics aggregator.
    #[must_use]
    pub fn metrics(&self) -> &Arc<RequestMetrics> {
        &self.metrics
    }

    /// Records one completed request.
    ///
    /// Metrics and error tracking are updated before returning. Alert delivery
    /// runs on a spawned task; its failures are logged and swallowed.
    pub fn observe(&self, observation: &RequestObservation) -> ObservationEffects {
        self.metrics.record(
            observation.method.as_str(),
            observation.status_code,
            observation.latency,
        );

        let mut effects = ObservationEffects::default();

        if (500..600).contains(&observation.status_code) {
            self.error_tracker.record_error(ErrorReport::new(
                observation.status_code,
                observation.method.as_str(),
                observation.path.as_str(),
                format!("request failed with status {}", observation.status_code),
            ));
            effects.error_reported = true;

            let message = format!(
                "{} {} returned {}",
                observation.method, observation.path, observation.status_code
            );
            if self.dispatch(AlertKind::ServerError, AlertSeverity::High, message, observation) {
                effects.alerts_dispatched.push(AlertKind::ServerError);
            }
        }

        if observation.latency >= self.policy.slow_request_threshold {
            let message = format!(
                "{} {} took {}ms",
                observation.method,
                observation.path,
                observation.latency.as_millis()
            );
            if self.dispatch(AlertKind::SlowRequest, AlertSeverity::Medium, message, observation) {
                effects.alerts_dispatched.push(AlertKind::SlowRequest);
            }
        }

        effects
    }

    fn dispatch(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        observation: &RequestObservation,
    ) -> bool {
        if severity < self.policy.alert_min_severity {
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(kind = kind.as_str(), "no async runtime available, alert dropped");
            return false;
        };

        let context = json!({
            "method": observation.method,
            "path": observation.path,
            "status_code": observation.status_code,
            "latency_ms": u64::try_from(observation.latency.as_millis()).unwrap_or(u64::MAX),
        });
        let alert_manager = Arc::clone(&self.alert_manager);

        runtime.spawn(async move {
            if let Err(error) = alert_manager
                .create_alert(kind, message.as_str(), severity, context)
                .await
            {
                warn!(kind = kind.as_str(), error = %error, "failed to raise alert");
            }
        });

        true
    }
}
