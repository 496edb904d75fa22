//! Credential lifecycle: registration, login, refresh, password and
//! verification flows.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{
        action_token::{self, ActionPurpose},
        jwt::JwtService,
        models::{
            AuthUser, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshResponse,
            RegisterRequest, ResetPasswordRequest,
        },
        password::{hash_password, hash_secret, verify_secret},
        refresh_store::RefreshTokenStore,
    },
    config::{AuthConfig, MailConfig},
    database::{models::NewUser, User, UserRepository},
    error::AppError,
    mail::{Mailer, OutgoingMail},
};

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".into()));
    }
    Ok(email)
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtService,
    refresh_tokens: Arc<RefreshTokenStore>,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
    mail_config: MailConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        config: AuthConfig,
        mail_config: MailConfig,
    ) -> Self {
        Self {
            users,
            jwt: JwtService::new(&config),
            refresh_tokens: Arc::new(RefreshTokenStore::new()),
            mailer,
            config,
            mail_config,
        }
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    async fn user_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthUser, AppError> {
        let email = normalize_email(&req.email)?;
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("email already registered".into()));
        }

        let password_hash = hash_password(&req.password)?;
        let user = self
            .users
            .insert(NewUser { email, name, password_hash })
            .await?;

        tracing::info!(user_id = %user.id, "registered new account");
        // the account exists either way; the resend endpoint recovers a lost mail
        if let Err(e) = self.send_verification_for(&user).await {
            tracing::warn!(user_id = %user.id, "failed to send verification mail: {}", e);
        }

        Ok(user.into())
    }

    /// Issue a credential pair. Any previously issued refresh token for the
    /// user stops validating.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&req.email).map_err(|_| AppError::Credentials)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Credentials)?;

        if !verify_secret(&req.password, &user.password_hash)? || !user.is_verified {
            tracing::warn!(user_id = %user.id, "rejected login");
            return Err(AppError::Credentials);
        }

        let access_token = self.jwt.create_access_token(user.id, &user.email)?;
        let refresh_token = self.jwt.create_refresh_token(user.id, &user.email)?;

        let ttl = self
            .jwt
            .refresh_ttl()
            .to_std()
            .map_err(|e| AppError::Internal(format!("invalid refresh ttl: {e}")))?;
        self.refresh_tokens.put(user.id, hash_secret(&refresh_token)?, ttl);

        tracing::info!(user_id = %user.id, "issued credential pair");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Exchange a refresh token for a new access token. The refresh token is
    /// not rotated.
    pub async fn refresh(&self, presented: &str) -> Result<RefreshResponse, AppError> {
        let claims = self.jwt.validate_refresh_token(presented)?;

        let stored = self
            .refresh_tokens
            .get(&claims.sub)
            .ok_or(AppError::InvalidToken)?;

        if !verify_secret(presented, &stored)? {
            tracing::warn!(user_id = %claims.sub, "refresh token does not match stored hash");
            return Err(AppError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let access_token = self.jwt.create_access_token(user.id, &user.email)?;
        tracing::debug!(user_id = %user.id, "refreshed access token");
        Ok(RefreshResponse { access_token })
    }

    /// Resolve the principal behind an access token.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let claims = self
            .jwt
            .validate_access_token(access_token)
            .map_err(|_| AppError::Unauthorized)?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if user.email != claims.email {
            return Err(AppError::Unauthorized);
        }
        Ok(user.into())
    }

    pub async fn me(&self, user_id: Uuid) -> Result<AuthUser, AppError> {
        Ok(self.user_by_id(user_id).await?.into())
    }

    pub fn logout(&self, user_id: Uuid) {
        if self.refresh_tokens.remove(&user_id) {
            tracing::info!(user_id = %user_id, "revoked refresh token");
        }
    }

    pub async fn change_password(&self, user_id: Uuid, req: ChangePasswordRequest) -> Result<(), AppError> {
        let user = self.user_by_id(user_id).await?;
        if !verify_secret(&req.old_password, &user.password_hash)? {
            return Err(AppError::Validation("old password doesn't match".into()));
        }

        let password_hash = hash_password(&req.new_password)?;
        if !self
            .users
            .replace_password_hash(user.id, &user.password_hash, &password_hash)
            .await?
        {
            return Err(AppError::Validation("old password doesn't match".into()));
        }
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let user = self.user_by_email(email).await?;

        let secret = action_token::reset_secret(&self.config.token_secret, &user.password_hash);
        let token = action_token::issue(
            ActionPurpose::ResetPassword,
            &user.email,
            &secret,
            self.config.reset_ttl_seconds,
        )?;

        self.mailer
            .send(OutgoingMail::reset_password(&self.mail_config, &user.email, token))
            .await
    }

    /// Set a new password from a reset token. The token is signed against the
    /// current password hash, so it stops verifying once this succeeds.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AppError> {
        let email = action_token::peek_email(&req.token, ActionPurpose::ResetPassword)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let secret = action_token::reset_secret(&self.config.token_secret, &user.password_hash);
        action_token::verify(&req.token, ActionPurpose::ResetPassword, &secret)?;

        // a concurrent reset with the same token loses the swap
        let password_hash = hash_password(&req.new_password)?;
        if !self
            .users
            .replace_password_hash(user.id, &user.password_hash, &password_hash)
            .await?
        {
            return Err(AppError::InvalidToken);
        }
        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    async fn send_verification_for(&self, user: &User) -> Result<(), AppError> {
        let secret = action_token::verify_secret(
            &self.config.token_secret,
            &user.password_hash,
            user.is_verified,
        );
        let token = action_token::issue(
            ActionPurpose::VerifyAccount,
            &user.email,
            &secret,
            self.config.verify_ttl_seconds,
        )?;

        self.mailer
            .send(OutgoingMail::verify_account(&self.mail_config, &user.email, token))
            .await
    }

    pub async fn send_verification_email(&self, email: &str) -> Result<(), AppError> {
        let user = self.user_by_email(email).await?;
        if user.is_verified {
            return Err(AppError::Conflict("account already verified".into()));
        }
        self.send_verification_for(&user).await
    }

    pub async fn verify_account(&self, token: &str) -> Result<(), AppError> {
        let email = action_token::peek_email(token, ActionPurpose::VerifyAccount)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let secret = action_token::verify_secret(
            &self.config.token_secret,
            &user.password_hash,
            user.is_verified,
        );
        action_token::verify(token, ActionPurpose::VerifyAccount, &secret)?;

        if !self.users.mark_verified(user.id).await? {
            return Err(AppError::InvalidToken);
        }
        tracing::info!(user_id = %user.id, "account verified");
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::database::users::memory::InMemoryUsers;
    use crate::mail::{
        recording::{FailingMailer, RecordingMailer},
        MailKind,
    };

    pub const EMAIL: &str = "u@test.com";
    pub const PASSWORD: &str = "Abc123!";

    pub fn service_with(config: AuthConfig) -> (AuthService, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let service = AuthService::new(
            Arc::new(InMemoryUsers::default()),
            mailer.clone(),
            config,
            MailConfig::default(),
        );
        (service, mailer)
    }

    pub fn service() -> (AuthService, Arc<RecordingMailer>) {
        service_with(AuthConfig::with_secrets("access-secret", "refresh-secret"))
    }

    /// Register and verify the default account.
    pub async fn verified_account(service: &AuthService, mailer: &RecordingMailer) -> AuthUser {
        let user = service
            .register(RegisterRequest {
                email: EMAIL.into(),
                name: "Test User".into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();
        let token = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();
        service.verify_account(&token).await.unwrap();
        user
    }

    fn login_req(password: &str) -> LoginRequest {
        LoginRequest {
            email: EMAIL.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_login_and_refresh() {
        let (service, mailer) = service();
        let user = verified_account(&service, &mailer).await;

        let pair = service.login(login_req(PASSWORD)).await.unwrap();
        assert_eq!(pair.user.id, user.id);
        assert!(pair.user.is_verified);

        let refreshed = service.refresh(&pair.refresh_token).await.unwrap();
        let principal = service.authenticate(&refreshed.access_token).await.unwrap();
        assert_eq!(principal.id, user.id);
        assert_ne!(refreshed.access_token, pair.access_token);
    }

    #[tokio::test]
    async fn test_login_failures_are_generic() {
        let (service, mailer) = service();
        service
            .register(RegisterRequest {
                email: EMAIL.into(),
                name: "Test User".into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();

        // unverified account with the right password
        assert!(matches!(service.login(login_req(PASSWORD)).await, Err(AppError::Credentials)));

        let token = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();
        service.verify_account(&token).await.unwrap();

        assert!(matches!(service.login(login_req("wrong-pass")).await, Err(AppError::Credentials)));
        let unknown = LoginRequest { email: "nobody@test.com".into(), password: PASSWORD.into() };
        assert!(matches!(service.login(unknown).await, Err(AppError::Credentials)));
        assert!(service.login(login_req(PASSWORD)).await.is_ok());
    }

    #[tokio::test]
    async fn test_new_login_revokes_previous_refresh_token() {
        let (service, mailer) = service();
        verified_account(&service, &mailer).await;

        let first = service.login(login_req(PASSWORD)).await.unwrap();
        let second = service.login(login_req(PASSWORD)).await.unwrap();

        assert_eq!(service.refresh_tokens().len(), 1);
        assert!(matches!(service.refresh(&first.refresh_token).await, Err(AppError::InvalidToken)));
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_missing_entry() {
        let (service, mailer) = service();
        let user = verified_account(&service, &mailer).await;
        let pair = service.login(login_req(PASSWORD)).await.unwrap();

        assert!(service.refresh(&pair.access_token).await.is_err());

        service.logout(user.id);
        assert!(matches!(service.refresh(&pair.refresh_token).await, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let (service, mailer) = service();
        verified_account(&service, &mailer).await;

        service.forgot_password(EMAIL).await.unwrap();
        let token = mailer.last_token(MailKind::ResetPassword, EMAIL).unwrap();

        service
            .reset_password(ResetPasswordRequest { token: token.clone(), new_password: "N3wPass!".into() })
            .await
            .unwrap();

        let replay = service
            .reset_password(ResetPasswordRequest { token, new_password: "Other99!".into() })
            .await;
        assert!(matches!(replay, Err(AppError::InvalidToken)));

        assert!(matches!(service.login(login_req(PASSWORD)).await, Err(AppError::Credentials)));
        assert!(service.login(login_req("N3wPass!")).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_token_dies_after_password_change() {
        let (service, mailer) = service();
        let user = verified_account(&service, &mailer).await;

        service.forgot_password(EMAIL).await.unwrap();
        let token = mailer.last_token(MailKind::ResetPassword, EMAIL).unwrap();

        service
            .change_password(user.id, ChangePasswordRequest {
                old_password: PASSWORD.into(),
                new_password: "Changed1!".into(),
            })
            .await
            .unwrap();

        let result = service
            .reset_password(ResetPasswordRequest { token, new_password: "N3wPass!".into() })
            .await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_verify_token_rejected_after_verification() {
        let (service, mailer) = service();
        service
            .register(RegisterRequest {
                email: EMAIL.into(),
                name: "Test User".into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();
        let from_register = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();

        service.send_verification_email(EMAIL).await.unwrap();
        let resent = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();

        service.verify_account(&resent).await.unwrap();
        assert!(matches!(service.verify_account(&from_register).await, Err(AppError::InvalidToken)));

        assert!(matches!(
            service.send_verification_email(EMAIL).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, mailer) = service();
        verified_account(&service, &mailer).await;

        let duplicate = service
            .register(RegisterRequest {
                email: " U@Test.com ".into(),
                name: "Again".into(),
                password: PASSWORD.into(),
            })
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let bad_email = service
            .register(RegisterRequest { email: "nope".into(), name: "X".into(), password: PASSWORD.into() })
            .await;
        assert!(matches!(bad_email, Err(AppError::Validation(_))));

        let short = service
            .register(RegisterRequest { email: "x@test.com".into(), name: "X".into(), password: "abc".into() })
            .await;
        assert!(matches!(short, Err(AppError::Validation(_))));
        assert_eq!(mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let (service, mailer) = service();
        let user = verified_account(&service, &mailer).await;

        let result = service
            .change_password(user.id, ChangePasswordRequest {
                old_password: "not-it".into(),
                new_password: "Changed1!".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let (service, _) = service();
        assert!(matches!(service.forgot_password("ghost@test.com").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_resets_with_one_token_succeed_once() {
        let (service, mailer) = service();
        verified_account(&service, &mailer).await;
        service.forgot_password(EMAIL).await.unwrap();
        let token = mailer.last_token(MailKind::ResetPassword, EMAIL).unwrap();

        let attempts = ["First1!", "Second2!"].map(|password| {
            let service = service.clone();
            let req = ResetPasswordRequest { token: token.clone(), new_password: password.into() };
            tokio::spawn(async move { service.reset_password(req).await })
        });

        let mut succeeded = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(e) => assert!(matches!(e, AppError::InvalidToken)),
            }
        }
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn test_register_survives_mail_failure() {
        let service = AuthService::new(
            Arc::new(InMemoryUsers::default()),
            Arc::new(FailingMailer),
            AuthConfig::with_secrets("access-secret", "refresh-secret"),
            MailConfig::default(),
        );
        let register = || RegisterRequest {
            email: EMAIL.into(),
            name: "Test User".into(),
            password: PASSWORD.into(),
        };

        let user = service.register(register()).await.unwrap();
        assert!(!user.is_verified);
        assert!(matches!(service.register(register()).await, Err(AppError::Conflict(_))));
    }
}
