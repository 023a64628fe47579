//! Authentication middleware for the user and admin route groups.
//!
//! Extracts the Bearer token from the Authorization header, verifies it with
//! the group's key, and injects the claims into request extensions.

use crate::auth::{JwtKeys, Role};
use crate::errors::AssignmentError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Require a valid user-group token.
#[instrument(skip_all, name = "assignment.middleware.require_user")]
pub async fn require_user(
    State(keys): State<Arc<JwtKeys>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AssignmentError> {
    authenticate(&keys, Role::User, req, next).await
}

/// Require a valid admin-group token.
#[instrument(skip_all, name = "assignment.middleware.require_admin")]
pub async fn require_admin(
    State(keys): State<Arc<JwtKeys>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AssignmentError> {
    authenticate(&keys, Role::Admin, req, next).await
}

async fn authenticate(
    keys: &JwtKeys,
    role: Role,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AssignmentError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "assignment.middleware.auth", "Missing Authorization header");
            AssignmentError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "assignment.middleware.auth", "Invalid Authorization header format");
        AssignmentError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = keys.verify(token, role)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
