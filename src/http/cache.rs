//! Response cache
//!
//! In-memory TTL cache for GET responses. Expired entries are removed
//! lazily when looked up, and a background sweeper bounds memory held by
//! entries that are never queried again.

use crate::types::{Envelope, Method, Params};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A cached value and its lifetime
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Expired once strictly more than `ttl` has elapsed
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// TTL cache keyed by request signature
pub struct ResponseCache<T = Envelope> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    default_ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    /// Create a cache whose entries default to `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// TTL applied when a caller gives none
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cache key for a request: `api_cache_<METHOD>_<url>_<params-json>`
    pub fn key(method: Method, url: &str, params: &Params) -> String {
        let params = serde_json::to_string(params).unwrap_or_else(|_| "{}".to_string());
        format!("api_cache_{method}_{url}_{params}")
    }

    /// Store a value
    pub fn set(&self, key: &str, data: T, ttl: Duration) {
        trace!(key, ttl_ms = ttl.as_millis() as u64, "Caching response");
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store a value with the default TTL
    pub fn set_default(&self, key: &str, data: T) {
        self.set(key, data, self.default_ttl);
    }

    /// Live value for `key`; an expired entry is deleted and reported absent
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock();
        if entries.get(key)?.is_expired(Instant::now()) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Whether a live entry exists; expired entries are deleted
    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => return false,
        };
        if expired {
            entries.remove(key);
        }
        !expired
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T: Clone + Send + 'static> ResponseCache<T> {
    /// Run [`cleanup`](Self::cleanup) every `interval` until the cache is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.cleanup();
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.lock().len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
