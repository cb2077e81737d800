//! Persistent client storage
//!
//! The token store and the rate limiter write through a [`Storage`]
//! implementation so that tokens and rate-limit windows survive restarts.
//!
//! # Overview
//!
//! - `Storage` - string key/value contract
//! - `FileStorage` - JSON document on disk, rewritten atomically
//! - `MemoryStorage` - process-local map, for tests and ephemeral sessions

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use async_trait::async_trait;

/// String key/value store that outlives the client instance
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// All stored keys
    async fn keys(&self) -> Result<Vec<String>>;
}
