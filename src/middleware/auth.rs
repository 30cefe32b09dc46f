//! Route guards. Layered with `route_layer`, so they run before any handler
//! and only on routes that matched.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::jwt::bearer;
use crate::auth::{Claims, Role};
use crate::errors::{AppError, AuthError};
use crate::AppState;

/// Any valid token. Verified claims are stored in request extensions.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = check(&state, &req, None)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// A valid token whose role is `admin`.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = check(&state, &req, Some(Role::Admin))?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn check(state: &AppState, req: &Request, role: Option<Role>) -> Result<Claims, AuthError> {
    let result = bearer(req.headers()).and_then(|token| match role {
        Some(role) => state.tokens.authorize(token, role),
        None => state.tokens.verify(token),
    });

    if let Err(ref e) = result {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            required_role = role.map(|r| r.as_str()).unwrap_or("any"),
            "request rejected: {}",
            e
        );
    }
    result
}
