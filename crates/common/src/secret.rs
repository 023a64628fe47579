//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Signing keys, passwords and bearer tokens
//! are held as [`SecretString`] so that any `Debug` output of a struct that
//! contains them shows `[REDACTED]` instead of the value.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginForm {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let form = LoginForm {
//!     username: "user1".to_string(),
//!     password: SecretString::from("password1"),
//! };
//!
//! assert!(!format!("{form:?}").contains("password1"));
//! assert_eq!(form.password.expose_secret(), "password1");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
