use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

/// Builds the HTTP router.
///
/// Probe and metrics routes skip admission control so orchestrators and
/// scrapers are never throttled; every route is recorded in telemetry.
/// An authentication layer placed in front of this router may attach a
/// `UserIdentity` extension, which enables the per-user connection cap.
pub fn build_router(app_state: AppState) -> Router {
    let operational_routes = Router::new()
        .route("/health/live", get(handlers::health::liveness_handler))
        .route("/health/ready", get(handlers::health::readiness_handler))
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    let admitted_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login_handler))
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::limit_user_connections,
        ))
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::enforce_request_rate,
        ));

    Router::new()
        .merge(operational_routes)
        .merge(admitted_routes)
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::record_request_telemetry,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
