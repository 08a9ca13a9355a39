use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use timebank_application::{ADMISSION_DENIED_MESSAGE, RequestObservation};
use timebank_core::{AppError, UserIdentity};
use timebank_domain::AdmissionKey;
use tokio::time::Instant;

use crate::error::ApiResult;
use crate::state::AppState;

/// Records every response in metrics, error tracking and alerting.
pub async fn record_request_telemetry(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_owned();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let started_at = Instant::now();

    let response = next.run(request).await;

    state.telemetry_service.observe(&RequestObservation {
        method,
        path,
        status_code: response.status().as_u16(),
        latency: started_at.elapsed(),
    });

    response
}

/// Applies the per-address request-rate policy.
///
/// See `client_address` for how the address is resolved.
pub async fn enforce_request_rate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let key = client_key(&request, state.trust_forwarded_for);
    state
        .admission_gate
        .check_request_rate(&key)
        .into_result()?;

    Ok(next.run(request).await)
}

/// Caps concurrent in-flight requests per authenticated user.
///
/// Requests without a [`UserIdentity`] extension pass through untouched.
pub async fn limit_user_connections(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let Some(identity) = request.extensions().get::<UserIdentity>() else {
        return Ok(next.run(request).await);
    };

    let key = AdmissionKey::for_user(identity.subject())?;
    let _permit = state
        .admission_gate
        .try_acquire_connection(&key)
        .ok_or_else(|| AppError::AdmissionDenied(ADMISSION_DENIED_MESSAGE.to_owned()))?;

    Ok(next.run(request).await)
}

// Clients without a resolvable address share the unspecified-address budget.
fn client_key(request: &Request, trust_forwarded_for: bool) -> AdmissionKey {
    let address = client_address(request, trust_forwarded_for)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    AdmissionKey::for_address(address)
}

/// Resolves the address a request budget is charged to.
///
/// The peer address is used unless a trusted reverse proxy is configured. In
/// that case the last `x-forwarded-for` entry wins, since it is the one the
/// proxy appended; earlier entries are client supplied.
fn client_address(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());

    if !trust_forwarded_for {
        return peer;
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.rsplit(',').next())
        .map(str::trim)
        .and_then(|value| value.parse::<IpAddr>().ok())
        .or(peer)
}
