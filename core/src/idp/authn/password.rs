//! Password encoding for the in-memory login module.
//!
//! # Feature Flags
//! - `argon2`: Enables `Argon2PasswordEncoder` (default)

#[cfg(feature = "argon2")]
use argon2::password_hash::rand_core::OsRng;
#[cfg(feature = "argon2")]
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
#[cfg(feature = "argon2")]
use argon2::Argon2;

use crate::idp::error::ConfigError;

/// Encodes and verifies stored passwords.
pub trait PasswordEncoder: Send + Sync {
    /// Encode a raw password for storage.
    fn encode(&self, raw_password: &str) -> Result<String, ConfigError>;

    /// Verify a raw password against a stored encoding.
    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool;
}

/// Stores passwords as given. Only for tests and demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPasswordEncoder;

impl NoOpPasswordEncoder {
    pub fn new() -> Self {
        NoOpPasswordEncoder
    }
}

impl PasswordEncoder for NoOpPasswordEncoder {
    fn encode(&self, raw_password: &str) -> Result<String, ConfigError> {
        Ok(raw_password.to_string())
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        raw_password == encoded_password
    }
}

/// Argon2 password encoder.
///
/// # Example
/// ```
/// use idp_authn_core::idp::authn::password::{Argon2PasswordEncoder, PasswordEncoder};
///
/// let encoder = Argon2PasswordEncoder::new();
/// let hash = encoder.encode("changeit").unwrap();
/// assert!(encoder.matches("changeit", &hash));
/// assert!(!encoder.matches("bar", &hash));
/// ```
#[cfg(feature = "argon2")]
#[derive(Clone, Default)]
pub struct Argon2PasswordEncoder {
    argon2: Argon2<'static>,
}

#[cfg(feature = "argon2")]
impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "argon2")]
impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw_password: &str) -> Result<String, ConfigError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(raw_password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::Invalid {
                name: "password".into(),
                message: e.to_string(),
            })
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        match PasswordHash::new(encoded_password) {
            Ok(parsed_hash) => self
                .argon2
                .verify_password(raw_password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        }
    }
}
