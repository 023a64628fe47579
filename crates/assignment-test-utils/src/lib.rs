//! # Assignment Test Utilities
//!
//! Shared test utilities for the assignment service.
//!
//! This crate provides:
//! - Server test harness (`TestAssignmentServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assignment_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestAssignmentServer::spawn().await?;
//!     let token = server.user_token("user1").await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/user/assignments", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
