use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use timebank_application::{ErrorSummary, RequestMetricsSnapshot};
use timebank_core::UserIdentity;
use timebank_domain::ErrorReport;
use ts_rs::TS;

/// Liveness probe payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/liveness-response.ts"
)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Readiness or health probe payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/probe-response.ts"
)]
pub struct ProbeResponse {
    pub status: &'static str,
    pub ok: bool,
    pub reason: Option<String>,
    pub errors_per_minute: f64,
    pub max_errors_per_minute: f64,
    pub metrics: RequestMetricsResponse,
}

/// Aggregated request counters.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/request-metrics-response.ts"
)]
pub struct RequestMetricsResponse {
    #[ts(type = "number")]
    pub total_requests: u64,
    #[ts(type = "Record<string, number>")]
    pub requests_by_method: BTreeMap<String, u64>,
    #[ts(type = "Record<string, number>")]
    pub requests_by_status: BTreeMap<String, u64>,
    pub average_latency_ms: f64,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: f64,
    #[ts(type = "number")]
    pub uptime_seconds: u64,
    pub captured_at: String,
}

impl From<&RequestMetricsSnapshot> for RequestMetricsResponse {
    fn from(snapshot: &RequestMetricsSnapshot) -> Self {
        Self {
            total_requests: snapshot.total_requests,
            requests_by_method: snapshot.requests_by_method.clone(),
            requests_by_status: snapshot
                .requests_by_status
                .iter()
                .map(|(status, count)| (status.to_string(), *count))
                .collect(),
            average_latency_ms: snapshot.average_latency_ms(),
            min_latency_ms: snapshot
                .min_latency
                .map(|latency| latency.as_secs_f64() * 1000.0),
            max_latency_ms: snapshot.max_latency.as_secs_f64() * 1000.0,
            uptime_seconds: snapshot.uptime.as_secs(),
            captured_at: snapshot.captured_at.to_rfc3339(),
        }
    }
}

/// One recent server error.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-report-response.ts"
)]
pub struct ErrorReportResponse {
    pub status_code: u16,
    pub method: String,
    pub path: String,
    pub message: String,
    pub occurred_at: String,
}

impl From<ErrorReport> for ErrorReportResponse {
    fn from(report: ErrorReport) -> Self {
        Self {
            status_code: report.status_code,
            method: report.method,
            path: report.path,
            message: report.message,
            occurred_at: report.occurred_at.to_rfc3339(),
        }
    }
}

/// Metrics endpoint payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/metrics-response.ts"
)]
pub struct MetricsResponse {
    pub requests: RequestMetricsResponse,
    pub errors_per_minute: f64,
    #[ts(type = "number")]
    pub total_errors: u64,
    pub recent_errors: Vec<ErrorReportResponse>,
}

impl MetricsResponse {
    pub fn new(snapshot: &RequestMetricsSnapshot, errors: ErrorSummary) -> Self {
        Self {
            requests: RequestMetricsResponse::from(snapshot),
            errors_per_minute: errors.errors_per_minute,
            total_errors: errors.total_errors,
            recent_errors: errors
                .recent_errors
                .into_iter()
                .map(ErrorReportResponse::from)
                .collect(),
        }
    }
}

/// Incoming payload for password login.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/login-request.ts"
)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-identity-response.ts"
)]
pub struct UserIdentityResponse {
    pub subject: String,
    pub display_name: String,
}

impl From<UserIdentity> for UserIdentityResponse {
    fn from(identity: UserIdentity) -> Self {
        Self {
            subject: identity.subject().to_owned(),
            display_name: identity.display_name().to_owned(),
        }
    }
}
