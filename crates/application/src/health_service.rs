//! Liveness, readiness and health verdicts.
//!
//! Verdicts are pure functions of the current request metrics and the error
//! tracker's running rate. Nothing is retained between calls, so a spike flips
//! readiness immediately and a recovery flips it back just as fast.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use timebank_core::{AppError, AppResult};

use crate::request_metrics::{RequestMetrics, RequestMetricsSnapshot};
use crate::telemetry_ports::ErrorTracker;

/// Error-rate limits for the readiness and health probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    /// Errors per minute at which the service stops accepting traffic.
    pub readiness_max_errors_per_minute: f64,
    /// Errors per minute at which the service reports itself unhealthy.
    pub health_max_errors_per_minute: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            readiness_max_errors_per_minute: 10.0,
            health_max_errors_per_minute: 50.0,
        }
    }
}

impl HealthThresholds {
    /// Rejects negative or non-finite thresholds.
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("readiness_max_errors_per_minute", self.readiness_max_errors_per_minute),
            ("health_max_errors_per_minute", self.health_max_errors_per_minute),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Liveness verdict. Reaching the evaluator at all means the process is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// The process is running.
    Alive,
}

/// Readiness verdict used for load-shedding decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessVerdict {
    /// Traffic may be routed here.
    Ready,
    /// Traffic should be routed elsewhere.
    NotReady {
        /// Why the service is not ready.
        reason: String,
    },
}

impl ReadinessVerdict {
    /// Returns whether the verdict is `Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// General health verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Error rate is under the health threshold.
    Healthy,
    /// Error rate reached the health threshold.
    Unhealthy {
        /// Why the service is unhealthy.
        reason: String,
    },
}

impl HealthVerdict {
    /// Returns whether the verdict is `Healthy`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// A verdict plus the signals it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport<V> {
    /// The verdict.
    pub verdict: V,
    /// Error rate observed when the verdict was taken.
    pub errors_per_minute: f64,
    /// Request metrics observed when the verdict was taken.
    pub metrics: RequestMetricsSnapshot,
}

/// Application service deriving probe verdicts.
#[derive(Clone)]
pub struct HealthService {
    metrics: Arc<RequestMetrics>,
    error_tracker: Arc<dyn ErrorTracker>,
    thresholds: HealthThresholds,
}

impl HealthService {
    /// Creates a health service over shared metrics and an error tracker.
    #[must_use]
    pub fn new(
        metrics: Arc<RequestMetrics>,
        error_tracker: Arc<dyn ErrorTracker>,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            metrics,
            error_tracker,
            thresholds,
        }
    }

    /// Returns the configured thresholds.
    #[must_use]
    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    /// Returns the liveness verdict. No dependency is consulted.
    #[must_use]
    pub fn liveness(&self) -> LivenessVerdict {
        LivenessVerdict::Alive
    }

    /// Not ready iff the error rate is at or above `max_errors_per_minute`.
    #[must_use]
    pub fn readiness(&self, max_errors_per_minute: f64) -> ProbeReport<ReadinessVerdict> {
        let errors_per_minute = self.error_tracker.errors_per_minute();
        let verdict = if exceeds(errors_per_minute, max_errors_per_minute) {
            ReadinessVerdict::NotReady {
                reason: rate_reason(errors_per_minute, max_errors_per_minute),
            }
        } else {
            ReadinessVerdict::Ready
        };

        ProbeReport {
            verdict,
            errors_per_minute,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Unhealthy iff the error rate is at or above `max_errors_per_minute`.
    #[must_use]
    pub fn health(&self, max_errors_per_minute: f64) -> ProbeReport<HealthVerdict> {
        let errors_per_minute = self.error_tracker.errors_per_minute();
        let verdict = if exceeds(errors_per_minute, max_errors_per_minute) {
            HealthVerdict::Unhealthy {
                reason: rate_reason(errors_per_minute, max_errors_per_minute),
            }
        } else {
            HealthVerdict::Healthy
        };

        ProbeReport {
            verdict,
            errors_per_minute,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Readiness against the configured readiness threshold.
    #[must_use]
    pub fn check_readiness(&self) -> ProbeReport<ReadinessVerdict> {
        self.readiness(self.thresholds.readiness_max_errors_per_minute)
    }

    /// Health against the configured health threshold.
    #[must_use]
    pub fn check_health(&self) -> ProbeReport<HealthVerdict> {
        self.health(self.thresholds.health_max_errors_per_minute)
    }
}

// Readiness and health must agree on the boundary.
fn exceeds(errors_per_minute: f64, max_errors_per_minute: f64) -> bool {
    errors_per_minute >= max_errors_per_minute
}

fn rate_reason(errors_per_minute: f64, max_errors_per_minute: f64) -> String {
    format!(
        "error rate {errors_per_minute:.2}/min reached threshold {max_errors_per_minute:.2}/min"
    )
}
