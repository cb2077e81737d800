//! Common types used throughout the dashboard client
//!
//! This module contains the wire shapes shared by the client, the auth
//! service and the CLI: the success envelope, per-call request options, and
//! the token refresh payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Query parameters, ordered so that cache and dedup keys are deterministic
pub type Params = BTreeMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Uniform success shape returned by every verb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = JsonValue> {
    /// Response payload
    pub data: T,
    /// Optional server message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status reported by the server (falls back to the HTTP status)
    #[serde(default)]
    pub status: u16,
}

impl<T> Envelope<T> {
    /// Create an envelope
    pub fn new(data: T, status: u16) -> Self {
        Self {
            data,
            message: None,
            status,
        }
    }

    /// Set the message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Transform the payload, keeping message and status
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            data: f(self.data),
            message: self.message,
            status: self.status,
        }
    }
}

// ============================================================================
// Request Options
// ============================================================================

/// Per-call options recognized by the client pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Do not attach the bearer token
    pub skip_auth: bool,
    /// Neither read nor write the response cache (GET only)
    pub skip_cache: bool,
    /// Always perform a fresh transport call
    pub skip_deduplication: bool,
    /// Cache lifetime for this response (GET only)
    pub ttl: Option<Duration>,
    /// Override the transport timeout for this call
    pub timeout: Option<Duration>,
    /// Query parameters
    pub params: Params,
}

impl RequestOptions {
    /// Create default request options
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the bearer token
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Skip the response cache
    #[must_use]
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    /// Skip request deduplication
    #[must_use]
    pub fn skip_deduplication(mut self) -> Self {
        self.skip_deduplication = true;
        self
    }

    /// Set the cache TTL
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Token Refresh
// ============================================================================

/// Body sent to the refresh endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

/// Body returned by the refresh endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_display() {
        assert_eq!(Method::GET.to_string(), "GET");
        assert_eq!(Method::PATCH.as_str(), "PATCH");
        assert_eq!(reqwest::Method::from(Method::DELETE), reqwest::Method::DELETE);
    }

    #[test]
    fn test_envelope_decodes_without_optional_fields() {
        let env: Envelope = serde_json::from_value(json!({"data": [1, 2]})).unwrap();
        assert_eq!(env.data, json!([1, 2]));
        assert_eq!(env.message, None);
        assert_eq!(env.status, 0);
    }

    #[test]
    fn test_envelope_map_keeps_metadata() {
        let env = Envelope::new(2, 200).with_message("ok").map(|n| n * 21);
        assert_eq!(env.data, 42);
        assert_eq!(env.message.as_deref(), Some("ok"));
        assert_eq!(env.status, 200);
    }

    #[test]
    fn test_request_options_builder() {
        let opts = RequestOptions::new()
            .skip_auth()
            .skip_cache()
            .skip_deduplication()
            .ttl(Duration::from_secs(30))
            .timeout(Duration::from_secs(5))
            .param("page", "1");

        assert!(opts.skip_auth);
        assert!(opts.skip_cache);
        assert!(opts.skip_deduplication);
        assert_eq!(opts.ttl, Some(Duration::from_secs(30)));
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.params.get("page"), Some(&"1".to_string()));
    }

    #[test]
    fn test_refresh_payload_casing() {
        let req = TokenRefreshRequest {
            refresh_token: "r1".into(),
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"refreshToken": "r1"}));

        let resp: TokenRefreshResponse = serde_json::from_value(json!({
            "accessToken": "a2",
            "refreshToken": "r2",
            "expiresIn": 3600
        }))
        .unwrap();
        assert_eq!(resp.access_token, "a2");
        assert_eq!(resp.expires_in, 3600);
    }
}
