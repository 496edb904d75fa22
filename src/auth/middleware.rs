//! Authentication Middleware
//!
//! Axum middleware that validates the bearer access token and injects the
//! resolved user into the request extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::server::AppState;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that validates JWT tokens and injects user info
pub struct AuthMiddleware;

impl AuthMiddleware {
    pub async fn validate_token(
        State(state): State<AppState>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, AppError> {
        let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
            tracing::debug!("[AuthMiddleware] missing bearer token for {} {}", req.method(), req.uri());
            return Err(AppError::Unauthorized);
        };

        let auth_user = match state.auth.authenticate(&token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!("[AuthMiddleware] rejected token for {}: {}", req.uri(), e);
                return Err(e);
            }
        };

        req.extensions_mut().insert(auth_user);
        Ok(next.run(req).await)
    }
}
