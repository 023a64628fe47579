//! Assignment service configuration.
//!
//! Configuration is loaded from environment variables. Secrets and
//! credentials are redacted in Debug output.

use crate::allocator::{AllocatorKind, DEFAULT_ID_START};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3333";

/// Default collection holding assignments.
pub const DEFAULT_COLLECTION: &str = "UserAssignments";

/// Default access token lifetime in minutes.
pub const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 15;

/// Upper bound for the access token lifetime (one day).
pub const MAX_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 1440;

/// Minimum signing key length in bytes.
pub const MIN_SECRET_KEY_BYTES: usize = 16;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost accepted by the bcrypt crate.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Maximum bcrypt cost accepted by the bcrypt crate.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Where assignment documents are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}' (expected postgres or memory)")),
        }
    }
}

/// A configured login.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Assignment service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Required for the postgres backend.
    pub database_url: Option<String>,

    pub store_backend: StoreBackend,

    /// Server bind address (default: "0.0.0.0:3333").
    pub bind_address: String,

    /// Collection holding assignment documents.
    pub assignment_collection: String,

    pub id_allocator: AllocatorKind,

    /// First identifier handed out for an empty collection.
    pub assignment_id_start: i64,

    /// HS256 key for user-group tokens.
    pub secret_key_user: SecretString,

    /// HS256 key for admin-group tokens.
    pub secret_key_admin: SecretString,

    pub access_token_expire_minutes: i64,

    /// JWT clock skew tolerance in seconds for token validation.
    pub jwt_clock_skew_seconds: i64,

    pub user_credentials: Vec<Credential>,

    pub admin_credentials: Vec<Credential>,

    /// Cost factor used when hashing configured passwords at startup.
    pub bcrypt_cost: u32,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let usernames = |creds: &[Credential]| -> Vec<String> {
            creds.iter().map(|c| c.username.clone()).collect()
        };

        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("store_backend", &self.store_backend)
            .field("bind_address", &self.bind_address)
            .field("assignment_collection", &self.assignment_collection)
            .field("id_allocator", &self.id_allocator)
            .field("assignment_id_start", &self.assignment_id_start)
            .field("secret_key_user", &"[REDACTED]")
            .field("secret_key_admin", &"[REDACTED]")
            .field(
                "access_token_expire_minutes",
                &self.access_token_expire_minutes,
            )
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("user_credentials", &usernames(&self.user_credentials))
            .field("admin_credentials", &usernames(&self.admin_credentials))
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid store backend configuration: {0}")]
    InvalidStoreBackend(String),

    #[error("Invalid identifier allocator configuration: {0}")]
    InvalidIdAllocator(String),

    #[error("Invalid identifier start configuration: {0}")]
    InvalidIdStart(String),

    #[error("Invalid secret key configuration: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid token expiry configuration: {0}")]
    InvalidTokenExpiry(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid credentials configuration: {0}")]
    InvalidCredentials(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let store_backend = match vars.get("STORE_BACKEND") {
            Some(value) => value
                .parse::<StoreBackend>()
                .map_err(ConfigError::InvalidStoreBackend)?,
            None => StoreBackend::default(),
        };

        let database_url = vars.get("DATABASE_URL").cloned();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let assignment_collection = match vars.get("ASSIGNMENT_COLLECTION") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::MissingEnvVar(
                    "ASSIGNMENT_COLLECTION".to_string(),
                ))
            }
            Some(value) => value.clone(),
            None => DEFAULT_COLLECTION.to_string(),
        };

        let id_allocator = match vars.get("ID_ALLOCATOR") {
            Some(value) => value
                .parse::<AllocatorKind>()
                .map_err(ConfigError::InvalidIdAllocator)?,
            None => AllocatorKind::default(),
        };

        let assignment_id_start = if let Some(value_str) = vars.get("ASSIGNMENT_ID_START") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidIdStart(format!(
                    "ASSIGNMENT_ID_START must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            if value < 1 {
                return Err(ConfigError::InvalidIdStart(format!(
                    "ASSIGNMENT_ID_START must be at least 1, got {value}"
                )));
            }

            value
        } else {
            DEFAULT_ID_START
        };

        let secret_key_user = parse_secret_key(vars, "SECRET_KEY_USER")?;
        let secret_key_admin = parse_secret_key(vars, "SECRET_KEY_ADMIN")?;

        let access_token_expire_minutes =
            if let Some(value_str) = vars.get("ACCESS_TOKEN_EXPIRE_MINUTES") {
                let value: i64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidTokenExpiry(format!(
                        "ACCESS_TOKEN_EXPIRE_MINUTES must be a valid integer, got '{value_str}': {e}"
                    ))
                })?;

                if !(1..=MAX_ACCESS_TOKEN_EXPIRE_MINUTES).contains(&value) {
                    return Err(ConfigError::InvalidTokenExpiry(format!(
                        "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {MAX_ACCESS_TOKEN_EXPIRE_MINUTES}, got {value}"
                    )));
                }

                value
            } else {
                DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES
            };

        // Parse JWT clock skew tolerance with validation
        #[allow(clippy::cast_possible_wrap)]
        let max_skew = MAX_CLOCK_SKEW.as_secs() as i64;
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {value}"
                )));
            }

            if value > max_skew {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {max_skew} seconds, got {value}"
                )));
            }

            value
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let default_skew = DEFAULT_CLOCK_SKEW.as_secs() as i64;
            default_skew
        };

        let user_credentials = parse_credentials(vars, "USER_CREDENTIALS")?;
        let admin_credentials = parse_credentials(vars, "ADMIN_CREDENTIALS")?;

        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}, got {value}"
                )));
            }

            value
        } else {
            DEFAULT_BCRYPT_COST
        };

        Ok(Config {
            database_url,
            store_backend,
            bind_address,
            assignment_collection,
            id_allocator,
            assignment_id_start,
            secret_key_user,
            secret_key_admin,
            access_token_expire_minutes,
            jwt_clock_skew_seconds,
            user_credentials,
            admin_credentials,
            bcrypt_cost,
        })
    }
}

fn parse_secret_key(vars: &HashMap<String, String>, name: &str) -> Result<SecretString, ConfigError> {
    let value = vars
        .get(name)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;

    let secret = SecretString::from(value.clone());
    if secret.expose_secret().len() < MIN_SECRET_KEY_BYTES {
        return Err(ConfigError::InvalidSecretKey(format!(
            "{name} must be at least {MIN_SECRET_KEY_BYTES} bytes"
        )));
    }

    Ok(secret)
}

/// Parse `name:password,name:password`. Empty or absent means no logins.
fn parse_credentials(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Vec<Credential>, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(Vec::new());
    };

    let mut credentials: Vec<Credential> = Vec::new();
    for (index, entry) in raw.split(',').map(str::trim).enumerate() {
        if entry.is_empty() {
            continue;
        }

        let (username, password) = entry.split_once(':').ok_or_else(|| {
            ConfigError::InvalidCredentials(format!(
                "{name} entry {index} must have the form username:password"
            ))
        })?;
        let username = username.trim();

        if username.is_empty() || password.is_empty() {
            return Err(ConfigError::InvalidCredentials(format!(
                "{name} entry {index} has an empty username or password"
            )));
        }

        if credentials.iter().any(|c| c.username == username) {
            return Err(ConfigError::InvalidCredentials(format!(
                "{name} lists '{username}' more than once"
            )));
        }

        credentials.push(Credential {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        });
    }

    Ok(credentials)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/assignments_test".to_string(),
            ),
            (
                "SECRET_KEY_USER".to_string(),
                "user-secret-key-0123456789".to_string(),
            ),
            (
                "SECRET_KEY_ADMIN".to_string(),
                "admin-secret-key-0123456789".to_string(),
            ),
        ])
    }

    fn with(mut vars: HashMap<String, String>, key: &str, value: &str) -> HashMap<String, String> {
        vars.insert(key.to_string(), value.to_string());
        vars
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgresql://localhost/assignments_test")
        );
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.bind_address, "0.0.0.0:3333");
        assert_eq!(config.assignment_collection, "UserAssignments");
        assert_eq!(config.id_allocator, AllocatorKind::Counter);
        assert_eq!(config.assignment_id_start, 1);
        assert_eq!(config.access_token_expire_minutes, 15);
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert!(config.user_credentials.is_empty());
        assert!(config.admin_credentials.is_empty());
        assert_eq!(config.bcrypt_cost, 12);
    }

    #[test]
    fn test_from_vars_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("ASSIGNMENT_COLLECTION".to_string(), "Homework".to_string());
        vars.insert("ID_ALLOCATOR".to_string(), "max_scan".to_string());
        vars.insert("ASSIGNMENT_ID_START".to_string(), "1000".to_string());
        vars.insert("ACCESS_TOKEN_EXPIRE_MINUTES".to_string(), "60".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "30".to_string());
        vars.insert("BCRYPT_COST".to_string(), "4".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.assignment_collection, "Homework");
        assert_eq!(config.id_allocator, AllocatorKind::MaxScan);
        assert_eq!(config.assignment_id_start, 1000);
        assert_eq!(config.access_token_expire_minutes, 60);
        assert_eq!(config.jwt_clock_skew_seconds, 30);
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn test_missing_database_url_for_postgres() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "DATABASE_URL")
        );
    }

    #[test]
    fn test_memory_backend_without_database_url() {
        let mut vars = with(base_vars(), "STORE_BACKEND", "memory");
        vars.remove("DATABASE_URL");

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_store_backend() {
        let vars = with(base_vars(), "STORE_BACKEND", "mongodb");
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidStoreBackend(_))));
    }

    #[test]
    fn test_invalid_id_allocator() {
        let vars = with(base_vars(), "ID_ALLOCATOR", "uuid");
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidIdAllocator(_))));
    }

    #[test]
    fn test_empty_collection_name_rejected() {
        let vars = with(base_vars(), "ASSIGNMENT_COLLECTION", "  ");
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_id_start_must_be_positive() {
        for bad in ["0", "-5", "abc"] {
            let vars = with(base_vars(), "ASSIGNMENT_ID_START", bad);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidIdStart(_))),
                "value {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_secret_keys_required() {
        for key in ["SECRET_KEY_USER", "SECRET_KEY_ADMIN"] {
            let mut vars = base_vars();
            vars.remove(key);
            let result = Config::from_vars(&vars);
            assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == key));
        }
    }

    #[test]
    fn test_short_secret_key_rejected() {
        let vars = with(base_vars(), "SECRET_KEY_ADMIN", "short");
        let result = Config::from_vars(&vars);

        match result {
            Err(ConfigError::InvalidSecretKey(msg)) => {
                assert!(msg.contains("SECRET_KEY_ADMIN"));
                assert!(!msg.contains("short"));
            }
            other => panic!("expected InvalidSecretKey, got {other:?}"),
        }
    }

    #[test]
    fn test_token_expiry_bounds() {
        for bad in ["0", "1441", "-1", "soon"] {
            let vars = with(base_vars(), "ACCESS_TOKEN_EXPIRE_MINUTES", bad);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidTokenExpiry(_))),
                "value {bad} should be rejected"
            );
        }

        let vars = with(base_vars(), "ACCESS_TOKEN_EXPIRE_MINUTES", "1440");
        assert_eq!(
            Config::from_vars(&vars).unwrap().access_token_expire_minutes,
            1440
        );
    }

    #[test]
    fn test_jwt_clock_skew_bounds() {
        for bad in ["0", "-10", "601", "abc"] {
            let vars = with(base_vars(), "JWT_CLOCK_SKEW_SECONDS", bad);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidJwtClockSkew(_))),
                "value {bad} should be rejected"
            );
        }

        let vars = with(base_vars(), "JWT_CLOCK_SKEW_SECONDS", "600");
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        for bad in ["3", "32", "twelve"] {
            let vars = with(base_vars(), "BCRYPT_COST", bad);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidBcryptCost(_))),
                "value {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_credentials_parsing() {
        let vars = with(
            base_vars(),
            "USER_CREDENTIALS",
            "user1:password1, user2:pass:with:colons ,",
        );
        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.user_credentials.len(), 2);
        assert_eq!(config.user_credentials[0].username, "user1");
        assert_eq!(
            config.user_credentials[0].password.expose_secret(),
            "password1"
        );
        assert_eq!(config.user_credentials[1].username, "user2");
        assert_eq!(
            config.user_credentials[1].password.expose_secret(),
            "pass:with:colons"
        );
    }

    #[test]
    fn test_credentials_malformed() {
        for bad in ["user1", "user1:", ":password", "user1:a,user1:b"] {
            let vars = with(base_vars(), "ADMIN_CREDENTIALS", bad);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidCredentials(_))),
                "value {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let vars = with(base_vars(), "ADMIN_CREDENTIALS", "admin1:hunter2-password");
        let config = Config::from_vars(&vars).unwrap();

        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("postgresql://"));
        assert!(!debug.contains("user-secret-key"));
        assert!(!debug.contains("admin-secret-key"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("admin1"));
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = Credential {
            username: "user1".to_string(),
            password: SecretString::from("password1".to_string()),
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("user1"));
        assert!(!debug.contains("password1"));
    }
}
