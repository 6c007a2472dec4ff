//! Password storage
//!
//! Stored credentials are Argon2id PHC strings (`$argon2id$v=19$...`).
//! Rosters written before hashing keep plaintext values; those still verify
//! and are replaced the next time the member sets a password.

use crate::error::AuthError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};

const PHC_PREFIX: &str = "$argon2";

/// Rules for new passwords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPolicy {
    /// Minimum length in characters
    pub min_length: usize,
    /// Store Argon2 hashes instead of the raw password
    pub hash_credentials: bool,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_length: 4,
            hash_credentials: true,
        }
    }
}

impl CredentialPolicy {
    /// Create policy with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With minimum length
    #[inline]
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// With hashing switched on or off
    #[inline]
    #[must_use]
    pub fn with_hashing(mut self, hash: bool) -> Self {
        self.hash_credentials = hash;
        self
    }

    /// Check a new password and its confirmation
    ///
    /// # Errors
    /// `AuthError::PasswordTooShort` or `AuthError::PasswordMismatch`.
    pub fn check(&self, password: &str, confirmation: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::PasswordTooShort {
                min: self.min_length,
            });
        }
        if password != confirmation {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(())
    }

    /// Value to store for `password`
    ///
    /// # Errors
    /// `AuthError::Hashing` if the hasher rejects its input.
    pub fn seal(&self, password: &str) -> Result<String, AuthError> {
        if self.hash_credentials {
            hash_password(password)
        } else {
            Ok(password.to_string())
        }
    }
}

/// Argon2id hash of `password` with a fresh random salt, in PHC format
///
/// # Errors
/// `AuthError::Hashing` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check `supplied` against a stored credential (hashed or legacy plaintext)
#[must_use]
pub fn verify_password(stored: &str, supplied: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(supplied.as_bytes(), &parsed)
            .is_ok(),
        // written before hashing was introduced
        Err(_) => constant_time_eq(stored.as_bytes(), supplied.as_bytes()),
    }
}

/// Check if a stored credential is an Argon2 hash rather than plaintext
#[inline]
#[must_use]
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with(PHC_PREFIX)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
