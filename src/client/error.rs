//! API client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a refresh attempt failed. Cloneable so every caller joined on the same
/// in-flight refresh receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token in storage; no request was made.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The server refused the refresh token.
    #[error("refresh token rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("invalid refresh response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Refresh failed and the stored tokens were cleared; the user has to log
    /// in again.
    #[error("session expired, please log in again: {0}")]
    SessionExpired(#[source] RefreshError),

    /// The request was still unauthorized after its one retry.
    #[error("request unauthorized")]
    Unauthorized,

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("token storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Whether the caller should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_) | ClientError::Unauthorized)
    }
}
