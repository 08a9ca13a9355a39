use axum::Json;
use axum::extract::State;

use crate::dto::MetricsResponse;
use crate::state::AppState;

/// Recent errors included in the metrics payload.
const RECENT_ERRORS_IN_METRICS: usize = 20;

pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    let snapshot = state.telemetry_service.metrics().snapshot();
    let errors = state.error_tracker.summary(RECENT_ERRORS_IN_METRICS);

    Json(MetricsResponse::new(&snapshot, errors))
}
