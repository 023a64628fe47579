//! Login credential directory.
//!
//! Passwords from configuration are bcrypt-hashed once at startup; the
//! plaintext is dropped afterwards. Verification always runs bcrypt, against
//! a fixed dummy hash for unknown usernames, so response timing does not
//! reveal which usernames exist.

use super::Role;
use crate::config::{Config, Credential};
use crate::errors::AssignmentError;
use common::secret::ExposeSecret;
use std::collections::HashMap;
use tracing::instrument;

/// Hash verified against when the username is unknown.
const DUMMY_BCRYPT_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Bcrypt password hashes per role group and username.
#[derive(Clone, Default)]
pub struct CredentialDirectory {
    hashes: HashMap<(Role, String), String>,
}

impl std::fmt::Debug for CredentialDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialDirectory")
            .field("entries", &self.hashes.len())
            .finish()
    }
}

impl CredentialDirectory {
    /// Hash every configured login with `cost`.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::Internal` if bcrypt fails.
    pub fn from_config(config: &Config) -> Result<Self, AssignmentError> {
        let mut directory = Self::default();
        for credential in &config.user_credentials {
            directory.add(Role::User, credential, config.bcrypt_cost)?;
        }
        for credential in &config.admin_credentials {
            directory.add(Role::Admin, credential, config.bcrypt_cost)?;
        }
        Ok(directory)
    }

    /// Register one login.
    pub fn add(
        &mut self,
        role: Role,
        credential: &Credential,
        cost: u32,
    ) -> Result<(), AssignmentError> {
        let hash = bcrypt::hash(credential.password.expose_secret(), cost).map_err(|e| {
            tracing::error!(target: "assignment.auth", error = %e, "Password hashing failed");
            AssignmentError::Internal
        })?;
        self.hashes
            .insert((role, credential.username.clone()), hash);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Check a username and password against `role`'s group.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown username or a wrong password.
    #[instrument(skip_all, fields(role = %role))]
    pub fn verify(&self, role: Role, username: &str, password: &str) -> Result<(), AssignmentError> {
        let stored = self.hashes.get(&(role, username.to_string()));
        let hash = stored.map_or(DUMMY_BCRYPT_HASH, String::as_str);

        let is_valid = bcrypt::verify(password, hash).map_err(|e| {
            tracing::error!(target: "assignment.auth", error = %e, "Password verification failed");
            AssignmentError::Internal
        })?;

        if stored.is_none() || !is_valid {
            tracing::debug!(target: "assignment.auth", "Login rejected");
            return Err(AssignmentError::InvalidCredentials);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;

    const TEST_COST: u32 = 4;

    fn credential(username: &str, password: &str) -> Credential {
        Credential {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    fn directory() -> CredentialDirectory {
        let mut directory = CredentialDirectory::default();
        directory
            .add(Role::User, &credential("user1", "password1"), TEST_COST)
            .unwrap();
        directory
            .add(Role::Admin, &credential("admin1", "adminpass"), TEST_COST)
            .unwrap();
        directory
    }

    #[test]
    fn test_valid_login() {
        let directory = directory();
        assert!(directory.verify(Role::User, "user1", "password1").is_ok());
        assert!(directory.verify(Role::Admin, "admin1", "adminpass").is_ok());
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_wrong_password() {
        let result = directory().verify(Role::User, "user1", "nope");
        assert!(matches!(result, Err(AssignmentError::InvalidCredentials)));
    }

    #[test]
    fn test_unknown_user() {
        let result = directory().verify(Role::User, "ghost", "password1");
        assert!(matches!(result, Err(AssignmentError::InvalidCredentials)));
    }

    #[test]
    fn test_groups_are_separate() {
        let directory = directory();

        let result = directory.verify(Role::Admin, "user1", "password1");
        assert!(matches!(result, Err(AssignmentError::InvalidCredentials)));

        let result = directory.verify(Role::User, "admin1", "adminpass");
        assert!(matches!(result, Err(AssignmentError::InvalidCredentials)));
    }

    #[test]
    fn test_debug_hides_hashes() {
        let debug = format!("{:?}", directory());
        assert!(!debug.contains("$2b$"));
        assert!(!debug.contains("user1"));
    }

    #[test]
    fn test_empty_directory_rejects_everything() {
        let directory = CredentialDirectory::default();
        assert!(directory.is_empty());
        assert!(matches!(
            directory.verify(Role::User, "user1", "password1"),
            Err(AssignmentError::InvalidCredentials)
        ));
    }
}
