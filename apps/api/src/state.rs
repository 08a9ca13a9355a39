use std::sync::Arc;

use timebank_application::{
    AdmissionGate, AdmissionGateConfig, AlertManager, CredentialVerifier, ErrorTracker,
    HealthService, HealthThresholds, LoginGuardService, RequestMetrics, RequestTelemetryService,
    TelemetryPolicy,
};
use timebank_core::AppResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub admission_gate: Arc<AdmissionGate>,
    pub health_service: HealthService,
    pub telemetry_service: RequestTelemetryService,
    pub error_tracker: Arc<dyn ErrorTracker>,
    pub login_guard_service: LoginGuardService,
    /// Whether the client address may be taken from `x-forwarded-for`.
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Wires the request-path components around shared metrics and error tracking.
    pub fn build(
        admission: AdmissionGateConfig,
        health: HealthThresholds,
        telemetry: TelemetryPolicy,
        error_tracker: Arc<dyn ErrorTracker>,
        alert_manager: Arc<dyn AlertManager>,
        credential_verifier: Arc<dyn CredentialVerifier>,
    ) -> AppResult<Self> {
        health.validate()?;

        let admission_gate = Arc::new(AdmissionGate::new(admission)?);
        let metrics = Arc::new(RequestMetrics::new());
        let health_service = HealthService::new(metrics.clone(), error_tracker.clone(), health);
        let telemetry_service = RequestTelemetryService::new(
            metrics,
            error_tracker.clone(),
            alert_manager,
            telemetry,
        )?;
        let login_guard_service = LoginGuardService::new(admission_gate.clone(), credential_verifier);

        Ok(Self {
            admission_gate,
            health_service,
            telemetry_service,
            error_tracker,
            login_guard_service,
            trust_forwarded_for: false,
        })
    }

    /// Keys request budgets on the address reported by a trusted reverse proxy.
    #[must_use]
    pub fn with_trusted_forwarded_for(mut self, trust_forwarded_for: bool) -> Self {
        self.trust_forwarded_for = trust_forwarded_for;
        self
    }
}
