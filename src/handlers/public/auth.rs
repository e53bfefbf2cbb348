// handlers/public/auth.rs - POST /auth/login

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/login - password grant against the identity provider.
///
/// The provider's session JSON (access token, refresh token, user) is passed
/// through unchanged inside the success envelope.
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> ApiResult<Value> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::validation_error("email and password are required"));
    }

    let session = state.identity.login(&email, &body.password).await?;
    info!("Login succeeded for {}", email);
    Ok(ApiResponse::success(session))
}
