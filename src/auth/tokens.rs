//! Token store
//!
//! Persists the access/refresh token pair and the CSRF token through a
//! [`Storage`] backend.

use crate::error::Result;
use crate::storage::Storage;
use rand::Rng;
use std::sync::Arc;

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key of the CSRF token
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Reads and writes the session tokens
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    /// Create a token store on top of a storage backend
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.storage.get(ACCESS_TOKEN_KEY).await
    }

    /// Current refresh token, if any
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.storage.get(REFRESH_TOKEN_KEY).await
    }

    /// Persist a new token pair
    pub async fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.storage.set(ACCESS_TOKEN_KEY, access_token).await?;
        self.storage.set(REFRESH_TOKEN_KEY, refresh_token).await
    }

    /// Remove both auth tokens. The CSRF token is kept.
    pub async fn clear(&self) -> Result<()> {
        self.storage.remove(ACCESS_TOKEN_KEY).await?;
        self.storage.remove(REFRESH_TOKEN_KEY).await
    }

    /// The persisted CSRF token, generated on first use
    pub async fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.storage.get(CSRF_TOKEN_KEY).await? {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        let token = generate_csrf_token();
        self.storage.set(CSRF_TOKEN_KEY, &token).await?;
        Ok(token)
    }

    /// Backing storage
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

/// 32 random bytes, hex encoded
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}
