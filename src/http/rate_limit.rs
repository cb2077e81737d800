//! Rate limiting implementation
//!
//! Fixed-window counter per endpoint. Each endpoint's window lives in the
//! persistent [`Storage`] under `rate_limit_<endpoint>` as
//! `{"count": n, "resetAt": epoch_ms}`, so limits survive restarts.

use crate::error::{ApiError, Result};
use crate::storage::Storage;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{trace, warn};

/// Prefix of every persisted rate limit record
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit_";

/// Configuration for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_millis(60_000),
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limiter config
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Persisted window state of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub count: u32,
    /// Epoch milliseconds after which the window restarts
    pub reset_at: i64,
}

/// Outcome of a limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Fixed-window rate limiter keyed by endpoint
pub struct RateLimiter {
    storage: Arc<dyn Storage>,
    config: RwLock<RateLimitConfig>,
    // serializes read-modify-write of records across storage awaits
    update: Mutex<()>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(storage: Arc<dyn Storage>, config: RateLimitConfig) -> Self {
        Self {
            storage,
            config: RwLock::new(config),
            update: Mutex::new(()),
        }
    }

    /// Current configuration
    pub fn config(&self) -> RateLimitConfig {
        *self.config.read()
    }

    /// Override part of the configuration
    pub fn set_config(&self, max_requests: Option<u32>, window: Option<Duration>) {
        let mut config = self.config.write();
        if let Some(max) = max_requests {
            config.max_requests = max;
        }
        if let Some(window) = window {
            config.window = window;
        }
    }

    /// Storage key for an endpoint
    pub fn key(endpoint: &str) -> String {
        format!("{RATE_LIMIT_KEY_PREFIX}{endpoint}")
    }

    /// Count a request against `endpoint`, failing when the window is used up
    ///
    /// Returns the remaining budget for the current window.
    pub async fn check_limit(&self, endpoint: &str) -> Result<u32> {
        self.check_limit_at(endpoint, Utc::now().timestamp_millis())
            .await
    }

    /// [`check_limit`](Self::check_limit) with an explicit clock
    pub async fn check_limit_at(&self, endpoint: &str, now_ms: i64) -> Result<u32> {
        let decision = self.evaluate(endpoint, now_ms).await?;
        if decision.allowed {
            trace!(endpoint, remaining = decision.remaining, "Rate limit check passed");
            Ok(decision.remaining)
        } else {
            warn!(endpoint, "Client-side rate limit exceeded");
            Err(ApiError::rate_limited().into())
        }
    }

    /// Apply the fixed-window algorithm and persist the new record
    pub async fn evaluate(&self, endpoint: &str, now_ms: i64) -> Result<RateLimitDecision> {
        let config = self.config();
        let key = Self::key(endpoint);
        let _guard = self.update.lock().await;

        let record = self.load(&key).await?;
        match record {
            Some(mut record) if now_ms <= record.reset_at => {
                if record.count >= config.max_requests {
                    return Ok(RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                    });
                }
                record.count += 1;
                self.store(&key, &record).await?;
                Ok(RateLimitDecision {
                    allowed: true,
                    remaining: config.max_requests - record.count,
                })
            }
            _ => {
                let record = RateLimitRecord {
                    count: 1,
                    reset_at: now_ms + config.window.as_millis() as i64,
                };
                self.store(&key, &record).await?;
                Ok(RateLimitDecision {
                    allowed: true,
                    remaining: config.max_requests.saturating_sub(1),
                })
            }
        }
    }

    /// Persisted record for an endpoint
    pub async fn record(&self, endpoint: &str) -> Result<Option<RateLimitRecord>> {
        self.load(&Self::key(endpoint)).await
    }

    /// Forget the window of one endpoint
    pub async fn reset(&self, endpoint: &str) -> Result<()> {
        self.storage.remove(&Self::key(endpoint)).await
    }

    async fn load(&self, key: &str) -> Result<Option<RateLimitRecord>> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };
        // A corrupt record starts a fresh window
        Ok(serde_json::from_str(&raw).ok())
    }

    async fn store(&self, key: &str, record: &RateLimitRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.storage.set(key, &raw).await
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}
