//! Authentication for the assignment service.
//!
//! Two role groups, `user` and `admin`, each with its own HS256 signing key
//! and its own credential directory. A token issued for one group fails
//! signature verification for the other.

pub mod credentials;
pub mod tokens;

pub use credentials::CredentialDirectory;
pub use tokens::JwtKeys;

use std::fmt;

/// Role group a token or login belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
