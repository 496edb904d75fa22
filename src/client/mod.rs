//! # API Client
//!
//! Rust client for the `/auth` API and any bearer-protected endpoint, with
//! persisted tokens and transparent refresh of expired access tokens.

pub mod api;
pub mod coordinator;
pub mod error;
pub mod token_store;

pub use api::{ApiClient, ApiRequest};
pub use coordinator::RefreshCoordinator;
pub use error::{ClientError, RefreshError};
pub use token_store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::config::AuthConfig;
    use crate::mail::MailKind;
    use crate::server::{build_router, AppState};
    use crate::services::auth_service::tests::{service_with, EMAIL, PASSWORD};

    /// Serve the real router on an ephemeral port.
    async fn spawn_server(config: AuthConfig) -> (String, Arc<crate::mail::recording::RecordingMailer>) {
        let (auth, mailer) = service_with(config);
        let app = build_router(AppState::new(auth), &[]);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), mailer)
    }

    #[tokio::test]
    async fn test_expired_access_token_is_replaced_transparently() {
        let mut config = AuthConfig::with_secrets("access-secret", "refresh-secret");
        config.access_ttl_seconds = 1;
        let (base_url, mailer) = spawn_server(config).await;

        let store = Arc::new(MemoryTokenStore::new());
        let api = ApiClient::new(&base_url, store.clone()).unwrap();

        api.register(EMAIL, "Test User", PASSWORD).await.unwrap();
        let token = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();
        api.verify_account(&token).await.unwrap();

        let user = api.login(EMAIL, PASSWORD).await.unwrap();
        let a1 = store.access_token().unwrap();
        let r1 = store.refresh_token().unwrap();
        assert_eq!(api.me().await.unwrap().id, user.id);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        // A1 has expired; the call succeeds through one refresh
        assert_eq!(api.me().await.unwrap().email, EMAIL);
        let a2 = store.access_token().unwrap();
        assert_ne!(a1, a2);
        assert_eq!(store.refresh_token().unwrap(), r1);

        // A1 keeps failing on its own
        let stale = ApiClient::new(&base_url, Arc::new(MemoryTokenStore::with_tokens(&a1, "none"))).unwrap();
        assert!(matches!(stale.me().await, Err(ClientError::SessionExpired(_))));

        api.logout().await.unwrap();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_forces_login() {
        let mut config = AuthConfig::with_secrets("access-secret", "refresh-secret");
        config.access_ttl_seconds = 1;
        let (base_url, mailer) = spawn_server(config).await;

        let first_store = Arc::new(MemoryTokenStore::new());
        let first = ApiClient::new(&base_url, first_store.clone()).unwrap();
        first.register(EMAIL, "Test User", PASSWORD).await.unwrap();
        let token = mailer.last_token(MailKind::VerifyAccount, EMAIL).unwrap();
        first.verify_account(&token).await.unwrap();
        first.login(EMAIL, PASSWORD).await.unwrap();

        // a second login overwrites the stored refresh hash
        let second = ApiClient::new(&base_url, Arc::new(MemoryTokenStore::new())).unwrap();
        second.login(EMAIL, PASSWORD).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;

        let result = first.me().await;
        assert!(matches!(
            result,
            Err(ClientError::SessionExpired(RefreshError::Rejected { .. }))
        ));
        assert!(result.unwrap_err().requires_login());
        assert!(first_store.refresh_token().is_none());
        assert!(second.me().await.is_ok());
    }
}
