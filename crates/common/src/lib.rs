//! Common utilities shared across the assignment service crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for HS256 access token signing and verification
pub mod jwt;
