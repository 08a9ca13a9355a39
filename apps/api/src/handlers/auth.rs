use axum::Json;
use axum::extract::State;
use timebank_application::LoginOutcome;
use timebank_core::AppError;

use crate::dto::{LoginRequest, UserIdentityResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<UserIdentityResponse>> {
    let outcome = state
        .login_guard_service
        .login(payload.identifier.as_str(), payload.password.as_str())
        .await?;

    match outcome {
        LoginOutcome::Authenticated(identity) => Ok(Json(UserIdentityResponse::from(identity))),
        LoginOutcome::Failed => Err(AppError::Unauthorized("invalid credentials".to_owned()).into()),
    }
}
