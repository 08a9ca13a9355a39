use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use timebank_domain::ErrorReport;

use crate::request_metrics::RequestMetrics;
use crate::telemetry_ports::{ErrorSummary, ErrorTracker};

use super::{HealthService, HealthThresholds, LivenessVerdict, ReadinessVerdict};

#[derive(Default)]
struct FakeErrorTracker {
    rate: Mutex<f64>,
}

impl FakeErrorTracker {
    fn set_rate(&self, rate: f64) {
        *self.rate.lock() = rate;
    }
}

impl ErrorTracker for FakeErrorTracker {
    fn record_error(&self, _report: ErrorReport) {}

    fn errors_per_minute(&self) -> f64 {
        *self.rate.lock()
    }

    fn summary(&self, _recent_limit: usize) -> ErrorSummary {
        ErrorSummary {
            total_errors: 0,
            errors_per_minute: self.errors_per_minute(),
            recent_errors: Vec::new(),
        }
    }
}

fn service(tracker: Arc<FakeErrorTracker>) -> (HealthService, Arc<RequestMetrics>) {
    let metrics = Arc::new(RequestMetrics::new());
    let service = HealthService::new(metrics.clone(), tracker, HealthThresholds::default());
    (service, metrics)
}

#[test]
fn liveness_is_unconditional() {
    let tracker = Arc::new(FakeErrorTracker::default());
    tracker.set_rate(10_000.0);
    let (service, _) = service(tracker);

    assert_eq!(service.liveness(), LivenessVerdict::Alive);
}

#[test]
fn readiness_boundary_is_inclusive() {
    let tracker = Arc::new(FakeErrorTracker::default());
    let (service, _) = service(tracker.clone());

    tracker.set_rate(4.99);
    assert!(service.readiness(5.0).verdict.is_ready());

    tracker.set_rate(5.0);
    assert!(!service.readiness(5.0).verdict.is_ready());
}

#[test]
fn health_uses_the_same_boundary_as_readiness() {
    let tracker = Arc::new(FakeErrorTracker::default());
    let (service, _) = service(tracker.clone());

    tracker.set_rate(5.0);
    assert!(!service.health(5.0).verdict.is_healthy());
    assert!(!service.readiness(5.0).verdict.is_ready());

    tracker.set_rate(4.0);
    assert!(service.health(5.0).verdict.is_healthy());
    assert!(service.readiness(5.0).verdict.is_ready());
}

#[test]
fn thresholds_are_independent() {
    let tracker = Arc::new(FakeErrorTracker::default());
    let (service, _) = service(tracker.clone());

    tracker.set_rate(20.0);
    let readiness = service.check_readiness();
    let health = service.check_health();

    assert!(matches!(readiness.verdict, ReadinessVerdict::NotReady { .. }));
    assert!(health.verdict.is_healthy());
}

#[test]
fn spike_and_recovery_flip_readiness_immediately() {
    let tracker = Arc::new(FakeErrorTracker::default());
    let (service, _) = service(tracker.clone());

    tracker.set_rate(100.0);
    assert!(!service.check_readiness().verdict.is_ready());

    tracker.set_rate(0.0);
    assert!(service.check_readiness().verdict.is_ready());
}

#[test]
fn reports_carry_metrics_and_rate() {
    let tracker = Arc::new(FakeErrorTracker::default());
    tracker.set_rate(60.0);
    let (service, metrics) = service(tracker);
    metrics.record("GET", 500, Duration::from_millis(12));

    let report = service.check_health();

    assert_eq!(report.metrics.total_requests, 1);
    assert!((report.errors_per_minute - 60.0).abs() < f64::EPSILON);
    match report.verdict {
        super::HealthVerdict::Unhealthy { reason } => assert!(reason.contains("60.00")),
        super::HealthVerdict::Healthy => panic!("expected unhealthy verdict"),
    }
}

#[test]
fn invalid_thresholds_are_rejected() {
    let thresholds = HealthThresholds {
        readiness_max_errors_per_minute: -1.0,
        health_max_errors_per_minute: 10.0,
    };
    assert!(thresholds.validate().is_err());

    let thresholds = HealthThresholds {
        readiness_max_errors_per_minute: 1.0,
        health_max_errors_per_minute: f64::NAN,
    };
    assert!(thresholds.validate().is_err());
    assert!(HealthThresholds::default().validate().is_ok());
}
