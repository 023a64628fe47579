//! Observability for the assignment service.
//!
//! Metrics definitions and recording helpers. Logging is plain `tracing`
//! with per-layer targets (`assignment.handlers`, `assignment.store`, ...).

pub mod metrics;
