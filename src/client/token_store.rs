//! Persisted access/refresh token storage for the API client.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::ClientError;

/// The two persisted values, as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn set_access_token(&self, token: &str) -> Result<(), ClientError>;

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError>;

    /// Remove both tokens.
    fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        Self {
            tokens: RwLock::new(StoredTokens {
                access_token: Some(access_token.to_string()),
                refresh_token: Some(refresh_token.to_string()),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.tokens.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens.read().refresh_token.clone()
    }

    fn set_access_token(&self, token: &str) -> Result<(), ClientError> {
        self.tokens.write().access_token = Some(token.to_string());
        Ok(())
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        *self.tokens.write() = StoredTokens {
            access_token: Some(access_token.to_string()),
            refresh_token: Some(refresh_token.to_string()),
        };
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.tokens.write() = StoredTokens::default();
        Ok(())
    }
}

/// Tokens kept in a JSON file, surviving process restarts.
///
/// Processes sharing one file do not coordinate; the last write wins.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<StoredTokens>,
}

impl FileTokenStore {
    /// Open `path`, loading any tokens already stored there.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let cached = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::Storage(format!("corrupt token file {}: {e}", path.display())))?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoredTokens::default(),
            Err(e) => return Err(ClientError::Storage(format!("failed to read {}: {e}", path.display()))),
        };

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    fn persist(&self, tokens: &StoredTokens) -> Result<(), ClientError> {
        if tokens.access_token.is_none() && tokens.refresh_token.is_none() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ClientError::Storage(format!("failed to remove {}: {e}", self.path.display()))),
            };
        }

        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClientError::Storage(format!("failed to write {}: {e}", self.path.display())))
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) -> Result<(), ClientError> {
        let mut cached = self.cached.write();
        let mut next = cached.clone();
        f(&mut next);
        self.persist(&next)?;
        *cached = next;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.cached.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.cached.read().refresh_token.clone()
    }

    fn set_access_token(&self, token: &str) -> Result<(), ClientError> {
        self.update(|t| t.access_token = Some(token.to_string()))
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        self.update(|t| {
            t.access_token = Some(access_token.to_string());
            t.refresh_token = Some(refresh_token.to_string());
        })
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.update(|t| *t = StoredTokens::default())
    }
}
