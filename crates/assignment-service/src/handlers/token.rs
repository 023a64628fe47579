//! Token endpoints.
//!
//! OAuth2 password-grant style: a form with `username` and `password`,
//! answered with `{"access_token": ..., "token_type": "bearer"}`.

use crate::auth::Role;
use crate::errors::AssignmentError;
use crate::models::{TokenRequest, TokenResponse};
use crate::routes::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::{Form, Json};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /user/token
#[instrument(skip_all, name = "assignment.handlers.user_token")]
pub async fn user_token(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Json<TokenResponse>, AssignmentError> {
    let Form(request) = form?;
    issue_token(state, Role::User, request).await
}

/// Handler for POST /admin/token
#[instrument(skip_all, name = "assignment.handlers.admin_token")]
pub async fn admin_token(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Json<TokenResponse>, AssignmentError> {
    let Form(request) = form?;
    issue_token(state, Role::Admin, request).await
}

async fn issue_token(
    state: Arc<AppState>,
    role: Role,
    request: TokenRequest,
) -> Result<Json<TokenResponse>, AssignmentError> {
    let credentials = Arc::clone(&state.credentials);
    let username = request.username.clone();

    // bcrypt is CPU-bound
    tokio::task::spawn_blocking(move || {
        credentials.verify(role, &username, request.password.expose_secret())
    })
    .await
    .map_err(|e| {
        tracing::error!(target: "assignment.handlers.token", error = %e, "Credential check task failed");
        AssignmentError::Internal
    })??;

    let access_token = state.keys.issue(&request.username, role)?;

    tracing::info!(target: "assignment.handlers.token", role = %role, "Access token issued");

    Ok(Json(TokenResponse::bearer(access_token)))
}
