//! Middleware for the assignment service.
//!
//! # Components
//!
//! - `auth` - Bearer token checks for the user and admin route groups
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_admin, require_user};
pub use http_metrics::http_metrics_middleware;
