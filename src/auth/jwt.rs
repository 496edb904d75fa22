//! JWT Token Service
//!
//! Issues and validates the access/refresh credential pair. Access and refresh
//! tokens are signed with separate secrets so neither can stand in for the other.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AuthConfig, MAX_TTL_SECONDS};
use crate::error::AppError;

pub const ISSUER: &str = "rentacar-server";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure containing user information and token metadata
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User unique identifier
    pub sub: Uuid,
    /// User email
    pub email: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
    /// Unique per token so two tokens minted in the same second still differ
    pub jti: Uuid,
    pub kind: TokenKind,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// JWT Service for token operations
#[derive(Clone)]
pub struct JwtService {
    access: Arc<KeyPair>,
    refresh: Arc<KeyPair>,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        Self {
            access: Arc::new(KeyPair::from_secret(&config.access_secret)),
            refresh: Arc::new(KeyPair::from_secret(&config.refresh_secret)),
            validation,
            access_ttl: Duration::seconds(config.access_ttl_seconds.min(MAX_TTL_SECONDS)),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds.min(MAX_TTL_SECONDS)),
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn create_token(&self, kind: TokenKind, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4(),
            kind,
        };

        encode(&Header::default(), &claims, &self.keys(kind).encoding)
            .map_err(|e| AppError::Internal(format!("failed to encode JWT: {e}")))
    }

    fn validate_token(&self, kind: TokenKind, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)?;
        if data.claims.kind != kind {
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }

    pub fn create_access_token(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        self.create_token(TokenKind::Access, user_id, email)
    }

    pub fn create_refresh_token(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        self.create_token(TokenKind::Refresh, user_id, email)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.validate_token(TokenKind::Access, token)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AppError> {
        self.validate_token(TokenKind::Refresh, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&AuthConfig::with_secrets("access_secret", "refresh_secret"))
    }

    #[test]
    fn test_jwt_roundtrip() {
        let jwt_service = service();
        let user_id = Uuid::new_v4();

        let token = jwt_service.create_access_token(user_id, "test@example.com").unwrap();
        let claims = jwt_service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let jwt_service = service();
        let user_id = Uuid::new_v4();

        let access = jwt_service.create_access_token(user_id, "a@b.c").unwrap();
        let refresh = jwt_service.create_refresh_token(user_id, "a@b.c").unwrap();

        assert!(jwt_service.validate_refresh_token(&access).is_err());
        assert!(jwt_service.validate_access_token(&refresh).is_err());
        assert!(jwt_service.validate_refresh_token(&refresh).is_ok());
        assert_ne!(access, jwt_service.create_access_token(user_id, "a@b.c").unwrap());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = AuthConfig::with_secrets("access_secret", "refresh_secret");
        config.access_ttl_seconds = -10;
        let jwt_service = JwtService::new(&config);

        let token = jwt_service.create_access_token(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(matches!(
            jwt_service.validate_access_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let mut config = AuthConfig::with_secrets("access_secret", "refresh_secret");
        config.refresh_ttl_seconds = i64::MAX;
        let jwt_service = JwtService::new(&config);

        assert_eq!(jwt_service.refresh_ttl(), Duration::seconds(MAX_TTL_SECONDS));
        assert!(jwt_service.create_refresh_token(Uuid::new_v4(), "a@b.c").is_ok());
    }
}
