//! Assignment handlers.
//!
//! Thin translation between HTTP and [`AssignmentRepository`] calls. Path
//! identifiers are parsed here; a non-integer id never reaches the
//! repository.
//!
//! [`AssignmentRepository`]: crate::repositories::AssignmentRepository

use crate::errors::AssignmentError;
use crate::models::{Assignment, ListQuery, NewAssignment};
use crate::routes::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::jwt::AccessClaims;
use std::sync::Arc;
use tracing::instrument;

/// Parse an `{id}` path segment.
fn parse_assignment_id(raw: &str) -> Result<i64, AssignmentError> {
    raw.parse::<i64>().map_err(|_| {
        tracing::debug!(target: "assignment.handlers.assignments", "Rejected non-integer assignment id");
        AssignmentError::BadRequest(format!("Invalid assignment id: {raw}"))
    })
}

/// Handler for POST /user/assignments
///
/// Returns 201 with the stored assignment. Any `assignment_id` in the body
/// is replaced by an allocated one. Malformed bodies get the usual error
/// envelope.
#[instrument(skip_all, name = "assignment.handlers.create")]
pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewAssignment>, JsonRejection>,
) -> Result<(StatusCode, Json<Assignment>), AssignmentError> {
    let Json(candidate) = payload?;
    let assignment = state.repository.create(candidate).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Handler for GET /user/assignments
///
/// Assignments owned by the authenticated user.
#[instrument(skip_all, name = "assignment.handlers.list_mine")]
pub async fn list_my_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<Json<Vec<Assignment>>, AssignmentError> {
    let assignments = state.repository.list_by_owner(&claims.sub).await?;
    Ok(Json(assignments))
}

/// Handler for GET /user/assignments/:id and GET /admin/assignments/:id
#[instrument(skip_all, name = "assignment.handlers.get")]
pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Assignment>, AssignmentError> {
    let id = parse_assignment_id(&raw_id)?;
    let assignment = state.repository.get(id).await?;
    Ok(Json(assignment))
}

/// Handler for GET /user/user_assignments/:owner
#[instrument(skip_all, name = "assignment.handlers.list_for_owner")]
pub async fn list_assignments_for_owner(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<Assignment>>, AssignmentError> {
    let assignments = state.repository.list_by_owner(&owner).await?;
    Ok(Json(assignments))
}

/// Handler for GET /admin/assignments?limit=N
///
/// Up to `limit` assignments (default 5).
#[instrument(skip_all, name = "assignment.handlers.list")]
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Assignment>>, AssignmentError> {
    let Query(query) = query?;
    let assignments = state.repository.list(query.limit).await?;
    Ok(Json(assignments))
}

/// Handler for DELETE /admin/assignments/:id
///
/// Responds with the deleted id as a bare JSON integer.
#[instrument(skip_all, name = "assignment.handlers.delete")]
pub async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<i64>, AssignmentError> {
    let id = parse_assignment_id(&raw_id)?;
    state.repository.delete(id).await?;
    Ok(Json(id))
}
