//! Application services and ports.

#![forbid(unsafe_code)]

mod admission_gate;
mod aggregate_refresh_scheduler;
mod health_service;
mod login_guard_service;
mod request_metrics;
mod request_telemetry_service;
mod telemetry_ports;

pub use admission_gate::{
    ADMISSION_DENIED_MESSAGE, AdmissionGate, AdmissionGateConfig, BruteForcePolicy,
    BruteForceStatus, ConnectionGrant, ConnectionPermit, ConnectionPolicy, LoginAttempt,
    MAX_POLICY_WINDOW, RequestRateDecision, RequestRatePolicy, SweepReport, TrackedKeys,
};
pub use aggregate_refresh_scheduler::{
    AggregateRefreshScheduler, AggregateViewState, AggregateViewStatus, AggregateViewStore,
    RefreshFailure, RefreshHandle, RefreshMode, RefreshSuccess, ViewRefreshOutcome,
};
pub use health_service::{
    HealthService, HealthThresholds, HealthVerdict, LivenessVerdict, ProbeReport,
    ReadinessVerdict,
};
pub use login_guard_service::{CredentialVerifier, LoginGuardService, LoginOutcome};
pub use request_metrics::{RequestMetrics, RequestMetricsSnapshot};
pub use request_telemetry_service::{
    ObservationEffects, RequestObservation, RequestTelemetryService, TelemetryPolicy,
};
pub use telemetry_ports::{AlertManager, ErrorSummary, ErrorTracker};
