use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, header};
use axum::response::Response;
use timebank_application::{
    AdmissionGateConfig, CredentialVerifier, HealthThresholds, TelemetryPolicy,
};
use timebank_core::{AppError, AppResult, UserIdentity};
use timebank_infrastructure::{InMemoryErrorTracker, TracingAlertManager};

use crate::state::AppState;

pub const ACCOUNT_IDENTIFIER: &str = "ada@example.org";
pub const ACCOUNT_PASSWORD: &str = "correct horse battery";
pub const ACCOUNT_SUBJECT: &str = "user-ada";

/// One known account; identifier `broken@example.org` simulates a store outage.
pub struct SingleAccountVerifier;

#[async_trait]
impl CredentialVerifier for SingleAccountVerifier {
    async fn verify(&self, identifier: &str, secret: &str) -> AppResult<Option<UserIdentity>> {
        if identifier == "broken@example.org" {
            return Err(AppError::Internal("account store unavailable".to_owned()));
        }

        if identifier.eq_ignore_ascii_case(ACCOUNT_IDENTIFIER) && secret == ACCOUNT_PASSWORD {
            return Ok(Some(UserIdentity::new(ACCOUNT_SUBJECT, "Ada Lovelace")));
        }

        Ok(None)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub error_tracker: Arc<InMemoryErrorTracker>,
}

pub fn test_app(admission: AdmissionGateConfig, health: HealthThresholds) -> TestApp {
    let error_tracker = Arc::new(InMemoryErrorTracker::new());
    let state = AppState::build(
        admission,
        health,
        TelemetryPolicy::default(),
        error_tracker.clone(),
        Arc::new(TracingAlertManager::new()),
        Arc::new(SingleAccountVerifier),
    )
    .unwrap_or_else(|_| unreachable!());

    TestApp {
        state,
        error_tracker,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!())
}

/// Login request arriving directly from `peer`.
pub fn login_request(identifier: &str, password: &str, peer: &str) -> Request<Body> {
    let mut request = login_request_builder()
        .body(login_body(identifier, password))
        .unwrap_or_else(|_| unreachable!());
    request.extensions_mut().insert(connect_info(peer));
    request
}

/// Login request from `peer` carrying an `x-forwarded-for` header.
pub fn forwarded_login_request(
    identifier: &str,
    password: &str,
    peer: &str,
    forwarded_for: &str,
) -> Request<Body> {
    let mut request = login_request_builder()
        .header("x-forwarded-for", forwarded_for)
        .body(login_body(identifier, password))
        .unwrap_or_else(|_| unreachable!());
    request.extensions_mut().insert(connect_info(peer));
    request
}

fn login_request_builder() -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
}

fn login_body(identifier: &str, password: &str) -> Body {
    let payload = serde_json::json!({
        "identifier": identifier,
        "password": password,
    });
    Body::from(payload.to_string())
}

fn connect_info(peer: &str) -> ConnectInfo<SocketAddr> {
    let address = peer.parse::<IpAddr>().unwrap_or_else(|_| unreachable!());
    ConnectInfo(SocketAddr::new(address, 40_000))
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    serde_json::from_slice(&body).unwrap_or_default()
}
