//! The shared cache that backs the lock registry.
//!
//! The trait mirrors what a distributed cache offers: get / set /
//! set-if-absent / delete with a TTL in seconds. `set_if_absent` must be
//! atomic; the lock manager relies on it to decide races between
//! concurrent LOCK requests. An in-process implementation is provided
//! for single-host deployments and tests; multi-worker deployments plug
//! in their own backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

pub type CacheFuture<'a, T> = BoxFuture<'a, T>;

pub trait DavCache: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>>;
    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: u64) -> CacheFuture<'a, ()>;
    /// Atomically store `value` unless an unexpired entry exists.
    /// Returns whether the value was stored.
    fn set_if_absent<'a>(&'a self, key: &'a str, value: Bytes, ttl: u64)
        -> CacheFuture<'a, bool>;
    /// Returns whether an entry was removed.
    fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;
}

struct Entry {
    value: Bytes,
    expires: Instant,
}

/// In-process cache backend.
#[derive(Default)]
pub struct MemCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemCache {
    pub fn new() -> MemCache {
        MemCache::default()
    }
}

fn deadline(ttl: u64) -> Instant {
    Instant::now() + Duration::from_secs(ttl)
}

impl DavCache for MemCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
        let mut entries = self.entries.lock();
        let value = match entries.get(key) {
            Some(entry) if entry.expires > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        future::ready(value).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: u64) -> CacheFuture<'a, ()> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires: deadline(ttl),
            },
        );
        future::ready(()).boxed()
    }

    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: Bytes,
        ttl: u64,
    ) -> CacheFuture<'a, bool> {
        let mut entries = self.entries.lock();
        let occupied = match entries.get(key) {
            Some(entry) => entry.expires > Instant::now(),
            None => false,
        };
        if !occupied {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires: deadline(ttl),
                },
            );
        }
        future::ready(!occupied).boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
        let removed = self.entries.lock().remove(key).is_some();
        future::ready(removed).boxed()
    }
}
