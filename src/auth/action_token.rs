//! Self-expiring action tokens for password reset and account verification.
//!
//! The signing secret mixes the server's token secret with mutable user state
//! (the password hash, plus the verification flag for verify tokens). Once that
//! state changes every token issued before the change fails signature checks.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPurpose {
    ResetPassword,
    VerifyAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionClaims {
    /// Account email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub purpose: ActionPurpose,
}

pub fn reset_secret(base: &str, password_hash: &str) -> String {
    format!("{base}{password_hash}")
}

pub fn verify_secret(base: &str, password_hash: &str, is_verified: bool) -> String {
    format!("{base}{password_hash}{is_verified}")
}

pub fn issue(purpose: ActionPurpose, email: &str, secret: &str, ttl_seconds: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = ActionClaims {
        sub: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        purpose,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("failed to encode action token: {e}")))
}

/// Read the email out of a token without checking its signature.
///
/// Only used to find which user's state the secret must be derived from; the
/// result is never trusted until [`verify`] succeeds.
pub fn peek_email(token: &str, purpose: ActionPurpose) -> Result<String, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let data = decode::<ActionClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    if data.claims.purpose != purpose {
        return Err(AppError::InvalidToken);
    }
    Ok(data.claims.sub)
}

pub fn verify(token: &str, purpose: ActionPurpose, secret: &str) -> Result<ActionClaims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<ActionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    if data.claims.purpose != purpose {
        return Err(AppError::InvalidToken);
    }
    Ok(data.claims)
}
