//! Assignment service models.
//!
//! Wire and storage types. An [`Assignment`] is serialized the same way to
//! HTTP clients and into the document store.

use common::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Default page size for the admin listing.
pub const DEFAULT_LIST_LIMIT: usize = 5;

/// A stored assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Allocated identifier.
    pub assignment_id: i64,

    pub name: String,

    /// User the assignment belongs to.
    pub owner: String,

    #[serde(default)]
    pub description: String,

    /// Administering user, possibly empty.
    #[serde(default)]
    pub admin_owner: String,
}

/// Candidate assignment accepted by `create`.
///
/// Every field defaults when absent so that a missing `name` or `owner`
/// surfaces as a validation error rather than a body rejection. Any
/// `assignment_id` supplied here is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAssignment {
    pub assignment_id: Option<i64>,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub admin_owner: String,
}

impl NewAssignment {
    /// Check required fields.
    ///
    /// `name` and `owner` must be non-empty after trimming whitespace.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty");
        }
        if self.owner.trim().is_empty() {
            return Err("owner must not be empty");
        }
        Ok(())
    }

    /// Materialize with the allocated identifier.
    pub fn into_assignment(self, assignment_id: i64) -> Assignment {
        Assignment {
            assignment_id,
            name: self.name,
            owner: self.owner,
            description: self.description,
            admin_owner: self.admin_owner,
        }
    }
}

/// OAuth2 password-grant form for the token endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: SecretString,
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Always `bearer`.
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Health check response.
///
/// Returned by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy".
    pub status: String,

    /// Store connectivity ("connected" or "unavailable").
    pub store: String,
}

/// Query string of the admin listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}
