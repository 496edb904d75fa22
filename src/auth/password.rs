//! Argon2 hashing for passwords and stored refresh tokens.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_password(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash any secret with a fresh random salt.
pub fn hash_secret(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("argon2 hash: {e}")))?
        .to_string();
    Ok(hash)
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    validate_password(plain)?;
    hash_secret(plain)
}

pub fn verify_secret(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("bad password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Abc123!").unwrap();
        assert!(verify_secret("Abc123!", &hash).unwrap());
        assert!(!verify_secret("abc123!", &hash).unwrap());
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let a = hash_password("Abc123!").unwrap();
        let b = hash_password("Abc123!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(hash_password("abc"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_malformed_hash_is_internal_error() {
        assert!(matches!(verify_secret("x", "not-a-phc-string"), Err(AppError::Internal(_))));
    }
}
