//! Error types for the dashboard client
//!
//! Two layers live here:
//!
//! - [`Error`] covers crate-internal failures (configuration, storage,
//!   transport). Internal APIs return `Result<T, Error>`.
//! - [`ApiError`] is the uniform failure shape handed to callers of the
//!   verb methods. Every [`Error`] normalizes into it at the client boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Message used when neither the server nor the transport said anything useful
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Message returned when the local rate limiter rejects a call
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// The main error type for the dashboard client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Storage error: {message}")]
    Storage { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Api(#[from] ApiError),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Result type alias for the dashboard client
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by the client's verb methods
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Classification of a normalized [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    /// Rejected locally by the rate limiter; no request was sent
    RateLimitExceeded,
    /// 401 that could not be recovered by a token refresh
    AuthExpired,
    /// Network failure, timeout, or a failure before a response arrived
    Transport,
    /// Server rejected the payload with field-level errors
    Validation,
    /// Any other non-success response
    #[default]
    Server,
    /// Success response whose body could not be decoded
    Decode,
}

/// Uniform failure shape returned to callers
///
/// Serializes as `{ "message", "status", "errors"? }`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (status {status})")]
pub struct ApiError {
    /// Human readable message
    pub message: String,
    /// HTTP status, 500 when no server status was available
    pub status: u16,
    /// Field-level validation errors, passed through from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    /// Error classification (not part of the wire shape)
    #[serde(skip)]
    pub kind: ErrorKind,
}

/// Subset of a server error body this layer understands
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

impl ApiError {
    /// Create an error with an explicit kind
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            errors: None,
            kind,
        }
    }

    /// Local rate limiter rejection
    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimitExceeded, 429, RATE_LIMIT_MESSAGE)
    }

    /// Failure that happened before any server status was available
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        Self::new(ErrorKind::Transport, 500, message)
    }

    /// Success body that could not be decoded into the expected shape
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Decode,
            500,
            format!("Failed to decode response: {}", message.into()),
        )
    }

    /// Normalize a non-success HTTP response
    ///
    /// The message comes from the body's `message` field when present, else
    /// from the status line. Field-level `errors` pass through unchanged.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();

        let message = parsed
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Request failed with status code {status}"));

        let errors: Option<BTreeMap<String, Vec<String>>> = parsed
            .errors
            .and_then(|v| serde_json::from_value(v).ok());

        let kind = match status {
            401 => ErrorKind::AuthExpired,
            _ if errors.is_some() => ErrorKind::Validation,
            _ => ErrorKind::Server,
        };

        Self {
            message,
            status,
            errors,
            kind,
        }
    }

    /// Attach field-level errors
    #[must_use]
    pub fn with_errors(mut self, errors: BTreeMap<String, Vec<String>>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Whether this is a 401 from the server
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401 && self.kind == ErrorKind::AuthExpired
    }

    /// Whether the local rate limiter produced this error
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimitExceeded
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map_or(500, |s| s.as_u16());
        let kind = if e.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Transport
        };
        let message = e.to_string();
        Self::new(
            kind,
            status,
            if message.is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                message
            },
        )
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Api(api) => api,
            Error::Http(e) => e.into(),
            Error::JsonParse(e) => ApiError::decode(e.to_string()),
            other => ApiError::transport(other.to_string()),
        }
    }
}
