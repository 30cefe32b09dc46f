use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures while authenticating or authorizing a caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing or non-`Bearer` authorization header.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Token has expired")]
    TokenExpired,

    /// Bad signature or a token that does not decode.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid IP address: {0}")]
    MalformedIp(String),

    #[error("{0}")]
    MissingField(&'static str),
}

/// Exclusion store failures. `StorageUnavailable` never renders its source,
/// which may carry connection details.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The IP {0} is already on exclusion list.")]
    DuplicateEntry(String),

    #[error("The IP {0} is not on the exclusion list.")]
    NotFound(String),

    #[error("storage unavailable")]
    StorageUnavailable(#[source] sqlx::Error),
}

/// Per-source fetch failure. Logged and skipped, never surfaced to callers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("source unreachable: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status)
        } else {
            FetchError::Unreachable(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Body extraction failed: 413 and 415 pass through, anything else is a 400.
    #[error("malformed request: {1}")]
    Rejected(StatusCode, String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            s @ (StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE) => s,
            _ => StatusCode::BAD_REQUEST,
        };
        AppError::Rejected(status, rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Auth(AuthError::Forbidden) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Auth(AuthError::Signing(e)) => {
                tracing::error!("token signing failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Store(StoreError::DuplicateEntry(_)) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Store(StoreError::StorageUnavailable(e)) => {
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Rejected(status, reason) => (*status, reason.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
