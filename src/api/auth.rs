use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::errors::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /auth/login - exchange username/password for a one-hour bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = state
        .tokens
        .issue(state.credentials.as_ref(), &payload.username, &payload.password)
        .map_err(|e| {
            tracing::warn!(username = %payload.username, "login failed: {}", e);
            e
        })?;

    tracing::info!(username = %payload.username, "token issued");
    Ok(Json(LoginResponse { token }))
}
