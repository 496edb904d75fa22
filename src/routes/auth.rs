//! Auth routes: registration, login, token refresh, password and
//! verification flows.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::auth::{
    middleware::{bearer_token, AuthMiddleware},
    models::{
        AuthUser, ChangePasswordRequest, EmailRequest, LoginRequest, LoginResponse,
        MessageResponse, RefreshRequest, RefreshResponse, RegisterRequest, ResetPasswordRequest,
        UserResponse, VerifyAccountRequest,
    },
};
use crate::error::AppError;
use crate::routes::JsonBody;
use crate::server::AppState;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(state.auth.login(payload).await?))
}

/// The refresh token may arrive as a bearer credential or as
/// `{"refreshToken": "..."}` in the body; the header wins.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RefreshResponse>, AppError> {
    let presented = match bearer_token(&headers) {
        Some(token) => token.to_string(),
        None if body.is_empty() => return Err(AppError::InvalidToken),
        None => {
            serde_json::from_slice::<RefreshRequest>(&body)
                .map_err(|e| AppError::Validation(format!("invalid body: {e}")))?
                .refresh_token
        }
    };

    Ok(Json(state.auth.refresh(&presented).await?))
}

pub async fn me(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse { user })
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> StatusCode {
    state.auth.logout(user.id);
    StatusCode::NO_CONTENT
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.change_password(user.id, payload).await?;
    Ok(Json(MessageResponse::new("password changed")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::new("reset link sent")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.reset_password(payload).await?;
    Ok(Json(MessageResponse::new("password reset")))
}

pub async fn send_verification_email(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.send_verification_email(&payload.email).await?;
    Ok(Json(MessageResponse::new("verification link sent")))
}

pub async fn verify_account(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VerifyAccountRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.verify_account(&payload.token).await?;
    Ok(Json(MessageResponse::new("account verified")))
}

pub fn create_auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route_layer(middleware::from_fn_with_state(state, AuthMiddleware::validate_token));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/email/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/email/verify-account", post(send_verification_email))
        .route("/auth/verify-account", post(verify_account))
        .merge(protected)
}
