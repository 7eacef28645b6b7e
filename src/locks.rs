//! The advisory lock registry.
//!
//! Locks are keyed by the fully qualified request URI (scheme, host and
//! path), so the same filesystem resource exposed through two virtual
//! hosts carries two independent locks. One cache entry per URI; the
//! entry value is the JSON-encoded lock record. Acquisition goes through
//! the cache's set-if-absent primitive, which decides the race between
//! two concurrent LOCK requests.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::DavCache;
use crate::errors::DavError;
use crate::DavResult;

/// Default lock validity when the client sends no usable `Timeout`.
pub const DEFAULT_LOCK_TIMEOUT: u64 = 3600;
/// Upper bound on client-requested lock validity.
pub const MAX_LOCK_TIMEOUT: u64 = 86400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockDepth {
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "infinity")]
    Infinity,
}

impl LockDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockDepth::Zero => "0",
            LockDepth::Infinity => "infinity",
        }
    }
}

/// A granted lock, as persisted in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DavLock {
    pub uri: String,
    pub token: String,
    pub owner: Option<String>,
    pub depth: LockDepth,
    /// Validity in seconds from `created_at`.
    pub timeout: u64,
    /// Unix timestamp of the grant or last refresh.
    pub created_at: u64,
}

impl DavLock {
    fn expired(&self) -> bool {
        unix_now() >= self.created_at + self.timeout
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Clamp a client-requested timeout into the grantable range.
pub fn effective_timeout(requested: Option<Duration>) -> u64 {
    match requested {
        Some(d) => d.as_secs().clamp(1, MAX_LOCK_TIMEOUT),
        None => DEFAULT_LOCK_TIMEOUT,
    }
}

#[derive(Clone)]
pub struct LockManager {
    cache: Arc<dyn DavCache>,
}

impl LockManager {
    pub fn new(cache: Arc<dyn DavCache>) -> LockManager {
        LockManager { cache }
    }

    // raw cache read, no expiry check.
    async fn load(&self, uri: &str) -> Option<DavLock> {
        let raw = self.cache.get(uri).await?;
        match serde_json::from_slice(&raw) {
            Ok(lock) => Some(lock),
            Err(e) => {
                error!("lock registry: undecodable entry for {uri:?}: {e}");
                None
            }
        }
    }

    /// Current unexpired lock on `uri`, if any. The cache TTL normally
    /// enforces expiry; the record timestamp is double-checked in case a
    /// backend rounds TTLs up.
    pub async fn find(&self, uri: &str) -> Option<DavLock> {
        self.load(uri).await.filter(|lock| !lock.expired())
    }

    /// Grant a new lock. Fails with `Locked` if an unexpired lock with a
    /// different token is already held.
    pub async fn acquire(
        &self,
        uri: &str,
        owner: Option<String>,
        depth: LockDepth,
        timeout: u64,
    ) -> DavResult<DavLock> {
        match self.load(uri).await {
            Some(lock) if !lock.expired() => return Err(DavError::Locked),
            // reap a stale record so set_if_absent can take the slot.
            Some(_) => {
                self.cache.delete(uri).await;
            }
            None => {}
        }
        let lock = DavLock {
            uri: uri.to_string(),
            token: format!("opaquelocktoken:{}", Uuid::new_v4().hyphenated()),
            owner,
            depth,
            timeout,
            created_at: unix_now(),
        };
        let raw = Bytes::from(serde_json::to_vec(&lock).map_err(|_| DavError::Forbidden)?);
        if !self.cache.set_if_absent(uri, raw, timeout).await {
            // lost the race against a concurrent LOCK.
            return Err(DavError::Locked);
        }
        debug!("lock {} granted on {uri}", lock.token);
        Ok(lock)
    }

    /// Extend a held lock. `NotFound` if no lock with this token exists.
    pub async fn refresh(&self, uri: &str, token: &str, timeout: u64) -> DavResult<DavLock> {
        let mut lock = self.validate(uri, token).await?;
        lock.timeout = timeout;
        lock.created_at = unix_now();
        let raw = Bytes::from(serde_json::to_vec(&lock).map_err(|_| DavError::Forbidden)?);
        self.cache.set(uri, raw, timeout).await;
        debug!("lock {} refreshed on {uri}", lock.token);
        Ok(lock)
    }

    /// Check that `token` currently holds the lock on `uri`.
    pub async fn validate(&self, uri: &str, token: &str) -> DavResult<DavLock> {
        match self.find(uri).await {
            Some(lock) if lock.token == token => Ok(lock),
            _ => Err(DavError::NotFound),
        }
    }

    /// Release a held lock. `NotFound` if the token does not match.
    pub async fn release(&self, uri: &str, token: &str) -> DavResult<()> {
        self.validate(uri, token).await?;
        self.cache.delete(uri).await;
        debug!("lock {token} released on {uri}");
        Ok(())
    }

    /// Does any submitted token unlock `uri`? True when no lock is held.
    pub async fn allows(&self, uri: &str, submitted: &[String]) -> bool {
        match self.find(uri).await {
            Some(lock) => submitted.iter().any(|t| *t == lock.token),
            None => true,
        }
    }
}
