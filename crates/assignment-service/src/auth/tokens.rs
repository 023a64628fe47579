//! Access token issuing and verification.
//!
//! Keys are loaded once from [`Config`] at startup and shared through
//! application state. Every verification failure is an
//! `AssignmentError::InvalidToken`; there is no path where a token that
//! failed to verify is treated as valid.

use super::Role;
use crate::config::Config;
use crate::errors::AssignmentError;
use common::jwt::{sign_hs256, verify_hs256, AccessClaims, JwtError};
use common::secret::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::instrument;

/// Signing keys and token lifetimes for both role groups.
#[derive(Clone)]
pub struct JwtKeys {
    user_secret: SecretString,
    admin_secret: SecretString,
    ttl_seconds: i64,
    clock_skew: Duration,
}

impl JwtKeys {
    pub fn new(
        user_secret: SecretString,
        admin_secret: SecretString,
        ttl_minutes: i64,
        clock_skew: Duration,
    ) -> Self {
        Self {
            user_secret,
            admin_secret,
            ttl_seconds: ttl_minutes.saturating_mul(60),
            clock_skew,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.secret_key_user.clone(),
            config.secret_key_admin.clone(),
            config.access_token_expire_minutes,
            Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs()),
        )
    }

    fn secret(&self, role: Role) -> &[u8] {
        match role {
            Role::User => self.user_secret.expose_secret().as_bytes(),
            Role::Admin => self.admin_secret.expose_secret().as_bytes(),
        }
    }

    /// Issue a token for `username` in `role`'s group.
    #[instrument(skip_all, fields(role = %role))]
    pub fn issue(&self, username: &str, role: Role) -> Result<String, AssignmentError> {
        self.issue_at(username, role, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub(crate) fn issue_at(
        &self,
        username: &str,
        role: Role,
        issued_at: i64,
    ) -> Result<String, AssignmentError> {
        let claims = AccessClaims {
            sub: username.to_string(),
            exp: issued_at.saturating_add(self.ttl_seconds),
            iat: issued_at,
            role: role.as_str().to_string(),
        };

        sign_hs256(&claims, self.secret(role)).map_err(|e| {
            tracing::error!(target: "assignment.auth", error = %e, "Token signing failed");
            AssignmentError::Internal
        })
    }

    /// Verify a token against `role`'s key.
    ///
    /// The signature, `exp`, `iat` and the `role` claim must all check out.
    #[instrument(skip_all, fields(role = %role))]
    pub fn verify(&self, token: &str, role: Role) -> Result<AccessClaims, AssignmentError> {
        let claims = verify_hs256(token, self.secret(role), self.clock_skew).map_err(|e| {
            tracing::debug!(target: "assignment.auth", error = ?e, "Token rejected");
            invalid_token(&e)
        })?;

        if claims.role != role.as_str() {
            tracing::debug!(
                target: "assignment.auth",
                token_role = %claims.role,
                "Token rejected: role mismatch"
            );
            return Err(invalid_token(&JwtError::InvalidToken));
        }

        Ok(claims)
    }
}

fn invalid_token(err: &JwtError) -> AssignmentError {
    AssignmentError::InvalidToken(err.to_string())
}
