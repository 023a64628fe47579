//! Root and health check handlers.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /
pub async fn root() -> Json<Value> {
    Json(json!({"Hello": "World"}))
}

/// Health check handler.
///
/// Pings the document store. Always 200 so monitors can read the body:
///
/// ```json
/// { "status": "healthy", "store": "connected" }
/// ```
#[instrument(skip_all, name = "assignment.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let response = match state.store.ping().await {
        Ok(()) => HealthResponse {
            status: "healthy".to_string(),
            store: "connected".to_string(),
        },
        Err(e) => {
            tracing::warn!(target: "assignment.health", error = %e, "Store ping failed");
            HealthResponse {
                status: "unhealthy".to_string(),
                store: "unavailable".to_string(),
            }
        }
    };

    Json(response)
}
