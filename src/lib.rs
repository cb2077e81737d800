//! # Dashboard Client
//!
//! HTTP access layer for the admin dashboard. Every call goes through one
//! pipeline that handles authentication, CSRF, rate limiting, caching,
//! request deduplication and token refresh, and hands back either a uniform
//! success envelope or a normalized error.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dashboard_client::{ClientConfig, HttpClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> dashboard_client::Result<()> {
//!     let client = HttpClient::with_config(ClientConfig::from_env()?).await?;
//!
//!     let options = RequestOptions::new().param("page", "1");
//!     let items = client.get::<Vec<serde_json::Value>>("/list/items", options).await?;
//!     println!("{} items", items.data.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │              HttpClient: get / post / put / patch / delete     │
//! └───────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────┬───┴─────────┬────────────┬──────────┐
//! │ RateLimiter│ ResponseCache│ Deduplicator│  Refresh   │  Tokens  │
//! ├────────────┼─────────────┼─────────────┼────────────┼──────────┤
//! │ per path   │ GET only    │ shared      │ single     │ access   │
//! │ fixed      │ TTL + sweep │ in-flight   │ flight on  │ refresh  │
//! │ window     │             │ futures     │ 401        │ CSRF     │
//! └────────────┴─────────────┴─────────────┴────────────┴──────────┘
//!                                │
//!                    Storage (memory or JSON file)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and the normalized API error
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// Persistent key/value storage
pub mod storage;

/// Tokens, session notifications and auth endpoints
pub mod auth;

/// HTTP client and its request pipeline
pub mod http;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{ApiError, ApiResult, Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{AuthService, SessionObserver, TokenStore};
pub use config::ClientConfig;
pub use http::{HttpClient, RateLimitConfig};
pub use storage::{FileStorage, MemoryStorage, Storage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
