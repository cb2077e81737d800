//! HTTP client module
//!
//! Provides the dashboard HTTP client and the pieces of its request pipeline.
//!
//! # Features
//!
//! - **Token Refresh**: A 401 triggers one shared refresh and a single replay
//! - **Deduplication**: Identical in-flight requests share one transport call
//! - **Rate Limiting**: Persisted fixed-window counter per endpoint
//! - **Caching**: TTL cache for GET responses with a background sweeper

mod cache;
mod client;
mod dedup;
mod rate_limit;
mod refresh;

pub use cache::{CacheEntry, ResponseCache};
pub use client::{ClientBuilder, HttpClient, CSRF_HEADER, REQUESTED_WITH_HEADER};
pub use dedup::Deduplicator;
pub use rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitRecord, RateLimiter, RATE_LIMIT_KEY_PREFIX,
};
pub use refresh::RefreshCoordinator;
