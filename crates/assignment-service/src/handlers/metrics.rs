//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! Unauthenticated so Prometheus can scrape it. Labels carry no usernames,
//! tokens or document contents.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE assignment_http_requests_total counter
/// assignment_http_requests_total{method="GET",endpoint="/health",status_code="200"} 42
/// ```
#[tracing::instrument(skip_all, name = "assignment.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
