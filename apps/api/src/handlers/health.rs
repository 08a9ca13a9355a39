use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use timebank_application::{HealthVerdict, LivenessVerdict, ReadinessVerdict};

use crate::dto::{LivenessResponse, ProbeResponse, RequestMetricsResponse};
use crate::state::AppState;

pub async fn liveness_handler(State(state): State<AppState>) -> Json<LivenessResponse> {
    let LivenessVerdict::Alive = state.health_service.liveness();
    Json(LivenessResponse { status: "alive" })
}

pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ProbeResponse>) {
    let report = state.health_service.check_readiness();
    let (ok, reason) = match report.verdict {
        ReadinessVerdict::Ready => (true, None),
        ReadinessVerdict::NotReady { reason } => (false, Some(reason)),
    };

    probe_response(
        ok,
        if ok { "ready" } else { "not_ready" },
        reason,
        report.errors_per_minute,
        state.health_service.thresholds().readiness_max_errors_per_minute,
        RequestMetricsResponse::from(&report.metrics),
    )
}

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    let report = state.health_service.check_health();
    let (ok, reason) = match report.verdict {
        HealthVerdict::Healthy => (true, None),
        HealthVerdict::Unhealthy { reason } => (false, Some(reason)),
    };

    probe_response(
        ok,
        if ok { "healthy" } else { "unhealthy" },
        reason,
        report.errors_per_minute,
        state.health_service.thresholds().health_max_errors_per_minute,
        RequestMetricsResponse::from(&report.metrics),
    )
}

fn probe_response(
    ok: bool,
    status: &'static str,
    reason: Option<String>,
    errors_per_minute: f64,
    max_errors_per_minute: f64,
    metrics: RequestMetricsResponse,
) -> (StatusCode, Json<ProbeResponse>) {
    let http_status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ProbeResponse {
            status,
            ok,
            reason,
            errors_per_minute,
            max_errors_per_minute,
            metrics,
        }),
    )
}
