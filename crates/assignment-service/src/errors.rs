//! Assignment service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Store and
//! allocation failures return a generic message to clients; the underlying
//! detail is logged server-side.

use crate::store::StoreError;
use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Assignment service error type.
///
/// Maps to HTTP status codes:
/// - NotFound: 404 Not Found
/// - Validation: 422 Unprocessable Entity
/// - Store, Allocation, Internal: 500 Internal Server Error
/// - InvalidToken, InvalidCredentials: 401 Unauthorized
/// - BadRequest: 400 Bad Request
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl AssignmentError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AssignmentError::NotFound(_) => 404,
            AssignmentError::Validation(_) => 422,
            AssignmentError::Store(_)
            | AssignmentError::Allocation(_)
            | AssignmentError::Internal => 500,
            AssignmentError::InvalidToken(_) | AssignmentError::InvalidCredentials => 401,
            AssignmentError::BadRequest(_) => 400,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AssignmentError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AssignmentError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            AssignmentError::Validation(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                reason.clone(),
            ),
            AssignmentError::Store(err) => {
                tracing::error!(target: "assignment.store", error = %err, "Store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
            AssignmentError::Allocation(reason) => {
                tracing::error!(target: "assignment.allocator", error = %reason, "Identifier allocation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ALLOCATION_ERROR",
                    "Failed to allocate an assignment identifier".to_string(),
                )
            }
            AssignmentError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AssignmentError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Incorrect username or password".to_string(),
            ),
            AssignmentError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            AssignmentError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Body rejections keep the error envelope. A well-formed body with wrong
/// field types is a validation failure; anything else is a bad request.
impl From<JsonRejection> for AssignmentError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(target: "assignment.errors", error = %rejection, "Rejected JSON body");
        match rejection {
            JsonRejection::JsonDataError(e) => AssignmentError::Validation(e.body_text()),
            other => AssignmentError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AssignmentError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(target: "assignment.errors", error = %rejection, "Rejected query string");
        AssignmentError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AssignmentError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!(target: "assignment.errors", error = %rejection, "Rejected form body");
        AssignmentError::BadRequest(rejection.body_text())
    }
}
