//! Password hashing and verification.
//!
//! Stored hashes are PHC strings produced by Argon2id with a per-call random
//! salt, so hashing the same password twice never yields the same string.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hash a plaintext password into a PHC string.
///
/// # Errors
///
/// Returns an error if the Argon2 hashing primitive fails.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

/// Verify a plaintext password against a stored PHC string.
///
/// A malformed or corrupt stored hash counts as a mismatch; callers only ever
/// see `true` or `false`. The digest comparison inside the argon2 crate is
/// constant-time.
#[must_use]
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() -> Result<(), PasswordError> {
        let hash = hash_password("cat in the hat")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("cat in the hat", &hash));
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_password() -> Result<(), PasswordError> {
        let hash = hash_password("cat in the hat")?;
        assert!(!verify_password("dog in the hat", &hash));
        Ok(())
    }

    #[test]
    fn salts_are_random_per_call() -> Result<(), PasswordError> {
        let first = hash_password("same input")?;
        let second = hash_password("same input")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn corrupt_stored_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }
}
