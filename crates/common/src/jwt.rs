//! HS256 access token utilities.
//!
//! Access tokens are signed with a shared secret per role group. This module
//! holds the parts that do not depend on which group is signing:
//!
//! - Size limit checked before any parsing
//! - Clock skew constants and `iat` validation
//! - The [`AccessClaims`] payload
//! - [`sign_hs256`] / [`verify_hs256`]
//!
//! Verification never degrades to success: every failure path returns a
//! [`JwtError`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{sign_hs256, verify_hs256, AccessClaims, DEFAULT_CLOCK_SKEW};
//!
//! let token = sign_hs256(&claims, secret.as_bytes())?;
//! let claims = verify_hs256(&token, secret.as_bytes(), DEFAULT_CLOCK_SKEW)?;
//! ```

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size in bytes (8KB).
///
/// Tokens issued by this service are a few hundred bytes. Anything larger is
/// rejected before base64 decoding or signature checks.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while signing or verifying access tokens.
///
/// Verification variants share one generic message so that clients cannot
/// distinguish failure causes. The cause is logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Signature, structure or `exp` check failed.
    #[error("The access token is invalid or expired")]
    InvalidToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,

    /// Token could not be signed.
    #[error("Failed to sign access token: {0}")]
    Signing(String),
}

// =============================================================================
// Claims
// =============================================================================

/// Claims carried by an access token.
///
/// `sub` is the username. It is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (username).
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Role group the token was issued for (`user` or `admin`).
    pub role: String,
}

impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("role", &self.role)
            .finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Sign claims as an HS256 JWT.
///
/// # Errors
///
/// Returns `JwtError::Signing` if serialization or signing fails.
pub fn sign_hs256(claims: &AccessClaims, secret: &[u8]) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Signing(e.to_string()))
}

/// Verify an HS256 JWT and return its claims.
///
/// Checks, in order: size, signature and structure, `exp` (with `clock_skew`
/// leeway), then `iat` (not more than `clock_skew` in the future).
///
/// # Errors
///
/// Returns `TokenTooLarge`, `InvalidToken` or `IatTooFarInFuture`.
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    clock_skew: Duration,
) -> Result<AccessClaims, JwtError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtError::TokenTooLarge);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = clock_skew.as_secs();

    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
            JwtError::InvalidToken
        })?;

    validate_iat(data.claims.iat, clock_skew)?;

    Ok(data.claims)
}

/// Validate the `iat` claim against the current time.
///
/// # Errors
///
/// Returns `JwtError::IatTooFarInFuture` if `iat` is more than `clock_skew`
/// ahead of now.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now`.
pub(crate) fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtError::IatTooFarInFuture);
    }

    Ok(())
}
