use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::middleware::auth::{require_admin, require_token};
use crate::middleware::headers::{request_id_middleware, security_headers_middleware};
use crate::AppState;

pub mod auth;
pub mod handlers;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// JSON body extractor whose rejections render as `{"error": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Build the full HTTP application.
pub fn router(state: Arc<AppState>) -> Router {
    // any authenticated caller
    let readers = Router::new()
        .route("/tor-ips", get(handlers::tor_ips).fallback(method_not_allowed))
        .route(
            "/filtered-tor-ips",
            get(handlers::filtered_tor_ips).fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let admin = Router::new()
        .route(
            "/excluded-ips",
            get(handlers::list_excluded_ips)
                .post(handlers::add_excluded_ips)
                .delete(handlers::remove_excluded_ip)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }).fallback(method_not_allowed))
        .route("/readyz", get(readiness_check).fallback(method_not_allowed))
        .route("/auth/login", post(auth::login).fallback(method_not_allowed))
        .nest("/api", readers.merge(admin))
        .fallback(fallback_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Known path, unsupported method.
async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "exclusion store unavailable")
        }
    }
}
