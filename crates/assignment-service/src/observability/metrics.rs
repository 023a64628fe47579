//! Metrics definitions for the assignment service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `assignment_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: route templates, unknown paths collapse to `/other`
//! - `status`: success, error, timeout
//! - `operation`: store operation names fixed in code
//! - `strategy`: `max_scan` or `counter`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("assignment_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("assignment_store_operation".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set store operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `assignment_http_requests_total`, `assignment_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Includes framework-level rejections (404, 405, 415, form/JSON parse errors).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("assignment_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("assignment_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto its route template.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/metrics" | "/user/token" | "/admin/token" | "/user/assignments"
        | "/admin/assignments" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // "/user/assignments/7" splits into ["", "user", "assignments", "7"]
    if let ["", group @ ("user" | "admin"), collection, _] = parts.as_slice() {
        match (*group, *collection) {
            ("user", "assignments") => return "/user/assignments/{id}".to_string(),
            ("user", "user_assignments") => {
                return "/user/user_assignments/{owner}".to_string()
            }
            ("admin", "assignments") => return "/admin/assignments/{id}".to_string(),
            _ => {}
        }
    }

    "/other".to_string()
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record a document store operation.
///
/// Metric: `assignment_store_operation_duration_seconds`, `assignment_store_operations_total`
/// Labels: `operation`, `status`
pub fn record_store_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("assignment_store_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("assignment_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Allocation Metrics
// ============================================================================

/// Record an identifier allocation attempt.
///
/// Metric: `assignment_ids_allocated_total`
/// Labels: `strategy`, `status`
pub fn record_id_allocation(strategy: &str, status: &str) {
    counter!("assignment_ids_allocated_total",
        "strategy" => strategy.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
