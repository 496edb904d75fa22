//! Server-side cache of refresh token hashes.
//!
//! One slot per user id. Writing a slot replaces whatever was there, which
//! revokes the previous refresh token. Entries expire with the token lifetime.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredHash {
    hash: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct RefreshTokenStore {
    entries: DashMap<Uuid, StoredHash>,
    last_cleanup: Mutex<Instant>,
    cleanup_interval: Duration,
}

impl Default for RefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTokenStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_cleanup: Mutex::new(Instant::now()),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Store the hash for `user_id`, overwriting any previous entry.
    pub fn put(&self, user_id: Uuid, hash: String, ttl: Duration) {
        self.maybe_cleanup();
        self.entries.insert(
            user_id,
            StoredHash {
                hash,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Current hash for `user_id`, if present and not expired.
    pub fn get(&self, user_id: &Uuid) -> Option<String> {
        let now = Instant::now();
        let entry = self.entries.get(user_id)?;
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove_if(user_id, |_, stored| stored.expires_at <= now);
            return None;
        }
        Some(entry.hash.clone())
    }

    pub fn remove(&self, user_id: &Uuid) -> bool {
        self.entries.remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!("purged {} expired refresh token hashes", purged);
        }
        purged
    }

    fn maybe_cleanup(&self) {
        let mut last = self.last_cleanup.lock();
        if last.elapsed() >= self.cleanup_interval {
            *last = Instant::now();
            drop(last);
            self.purge_expired();
        }
    }
}
