//! Assignment Service Library
//!
//! A small HTTP service that stores user assignments in a document
//! collection and hands out auto-incrementing assignment identifiers.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> repositories/*.rs -> store/*.rs
//!                                        |
//!                                   allocator.rs
//! ```
//!
//! # Modules
//!
//! - `allocator` - Identifier allocation strategies
//! - `auth` - Token keys and login credentials per role group
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `repositories` - Typed assignment access
//! - `routes` - Axum router setup
//! - `store` - Document store trait and backends

pub mod allocator;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod store;
