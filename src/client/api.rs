//! Typed client for the rentacar API.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the stored
//! access token, translates error responses and, on a 401, refreshes the
//! access token once and retries the original request once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::coordinator::{RefreshCoordinator, RefreshOutcome};
use super::error::{ClientError, RefreshError};
use super::token_store::TokenStore;
use crate::auth::models::{
    AuthUser, ChangePasswordRequest, EmailRequest, LoginRequest, LoginResponse, MessageResponse,
    RefreshResponse, RegisterRequest, ResetPasswordRequest, UserResponse, VerifyAccountRequest,
};

const REFRESH_PATH: &str = "auth/refresh-token";

/// One logical API call. Kept by value so it can be re-sent after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    query: Vec<(String, String)>,
    authenticated: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: &impl Serialize) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::Decode(format!("failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Send without credentials and without refresh-on-401.
    pub fn public(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Pull a human-readable message out of an error response.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
    match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

async fn request_access_token(http: &Client, url: Url, tokens: &dyn TokenStore) -> RefreshOutcome {
    let refresh_token = tokens
        .refresh_token()
        .ok_or(RefreshError::MissingRefreshToken)?;

    let response = http
        .post(url)
        .bearer_auth(&refresh_token)
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(RefreshError::Rejected { status, message });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;
    let body: RefreshResponse =
        serde_json::from_slice(&bytes).map_err(|e| RefreshError::Decode(e.to_string()))?;
    Ok(body.access_token)
}

/// The shared refresh future: store the new access token, or clear both
/// tokens on any failure.
async fn refresh_and_store(http: Client, url: Url, tokens: Arc<dyn TokenStore>) -> RefreshOutcome {
    let outcome = request_access_token(&http, url, tokens.as_ref()).await;
    match &outcome {
        Ok(access_token) => {
            if let Err(e) = tokens.set_access_token(access_token) {
                tracing::warn!("failed to persist refreshed access token: {}", e);
            }
        }
        Err(e) => {
            tracing::warn!("access token refresh failed, clearing stored tokens: {}", e);
            if let Err(e) = tokens.clear() {
                tracing::warn!("failed to clear stored tokens: {}", e);
            }
        }
    }
    outcome
}

pub struct ApiClient {
    http: Client,
    base_url: Url,
    refresh_url: Url,
    tokens: Arc<dyn TokenStore>,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(base_url, tokens, http)
    }

    pub fn with_http_client(
        base_url: &str,
        tokens: Arc<dyn TokenStore>,
        http: Client,
    ) -> Result<Self, ClientError> {
        // a trailing slash makes `join` append instead of replacing the last segment
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        let refresh_url = base_url.join(REFRESH_PATH)?;

        Ok(Self {
            http,
            base_url,
            refresh_url,
            tokens,
            refresh: RefreshCoordinator::new(),
        })
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn send_once(&self, request: &ApiRequest, access_token: Option<&str>) -> Result<Response, ClientError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder.send().await?)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::Api { status, message });
        }

        let bytes = response.bytes().await?;
        // empty bodies (204) decode as `null` so `()` and `Option<_>` work
        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn refresh_access_token(&self) -> RefreshOutcome {
        let http = self.http.clone();
        let url = self.refresh_url.clone();
        let tokens = self.tokens.clone();
        self.refresh
            .run(move || refresh_and_store(http, url, tokens))
            .await
    }

    /// Send `request` and decode the response body.
    ///
    /// A 401 on an authenticated request triggers at most one refresh and one
    /// retry. A 401 on the retry is returned as [`ClientError::Unauthorized`].
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let sent_token = if request.authenticated {
            self.tokens.access_token()
        } else {
            None
        };

        let response = self.send_once(&request, sent_token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !request.authenticated {
            return Self::decode(response).await;
        }

        let retry_token = match self.tokens.access_token() {
            // someone else refreshed while this request was in flight
            Some(current) if sent_token.as_ref() != Some(&current) => current,
            _ => self
                .refresh_access_token()
                .await
                .map_err(ClientError::SessionExpired)?,
        };

        let response = self.send_once(&request, Some(&retry_token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("{} {} still unauthorized after refresh", request.method, request.path);
            return Err(ClientError::Unauthorized);
        }
        Self::decode(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ClientError> {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<AuthUser, ClientError> {
        let body = RegisterRequest {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        };
        let response: UserResponse = self
            .execute(ApiRequest::post("auth/register").json(&body)?.public())
            .await?;
        Ok(response.user)
    }

    /// Log in and store the returned credential pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .execute(ApiRequest::post("auth/login").json(&body)?.public())
            .await?;
        self.tokens
            .set_tokens(&response.access_token, &response.refresh_token)?;
        Ok(response.user)
    }

    /// Revoke the server-side refresh token when possible and clear local
    /// tokens regardless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.tokens.access_token().is_some() {
            if let Err(e) = self.execute::<()>(ApiRequest::post("auth/logout")).await {
                tracing::debug!("server logout failed: {}", e);
            }
        }
        self.tokens.clear()
    }

    pub async fn me(&self) -> Result<AuthUser, ClientError> {
        let response: UserResponse = self.get("auth/me").await?;
        Ok(response.user)
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<MessageResponse, ClientError> {
        let body = ChangePasswordRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.post("auth/change-password", &body).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest { email: email.to_string() };
        self.execute(ApiRequest::post("auth/email/forgot-password").json(&body)?.public())
            .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse, ClientError> {
        let body = ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        self.execute(ApiRequest::post("auth/reset-password").json(&body)?.public())
            .await
    }

    pub async fn send_verification_email(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest { email: email.to_string() };
        self.execute(ApiRequest::post("auth/email/verify-account").json(&body)?.public())
            .await
    }

    pub async fn verify_account(&self, token: &str) -> Result<MessageResponse, ClientError> {
        let body = VerifyAccountRequest { token: token.to_string() };
        self.execute(ApiRequest::post("auth/verify-account").json(&body)?.public())
            .await
    }
}
