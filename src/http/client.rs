//! Dashboard HTTP client
//!
//! Every verb runs the same pipeline:
//!
//! ```text
//! rate limit ─► cache lookup (GET) ─► dedup ─► transport ─► [401 ─► refresh ─► replay]
//!                                                         └─► cache store (GET) ─► envelope
//! ```
//!
//! - The rate limiter always runs first, so cached reads still use budget
//! - GET, POST, PUT and PATCH are deduplicated unless the call opts out;
//!   DELETE always goes straight to the transport
//! - A 401 triggers at most one shared token refresh and one replay
//! - Every failure is normalized into [`ApiError`]

use super::cache::ResponseCache;
use super::dedup::Deduplicator;
use super::rate_limit::RateLimiter;
use super::refresh::RefreshCoordinator;
use crate::auth::{LogSessionObserver, SessionObserver, TokenStore};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, ErrorKind, Result};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{
    Envelope, JsonValue, Method, Params, RequestOptions, TokenRefreshRequest,
    TokenRefreshResponse,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Header carrying the CSRF token
pub const CSRF_HEADER: &str = "X-CSRF-Token";
/// Header marking requests as XHR-style, same-origin calls
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";

/// A request as it goes to the transport, replayable after a refresh
#[derive(Debug, Clone)]
struct PreparedRequest {
    method: Method,
    url: String,
    params: Params,
    body: Option<JsonValue>,
    skip_auth: bool,
    timeout: Option<Duration>,
}

/// Builder for [`HttpClient`]
///
/// Every collaborator is optional; missing ones are created from the config.
pub struct ClientBuilder {
    config: ClientConfig,
    storage: Option<Arc<dyn Storage>>,
    cache: Option<Arc<ResponseCache>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    deduplicator: Option<Arc<Deduplicator>>,
    observer: Option<Arc<dyn SessionObserver>>,
    http: Option<Client>,
}

impl ClientBuilder {
    /// Start from a config
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            storage: None,
            cache: None,
            rate_limiter: None,
            deduplicator: None,
            observer: None,
            http: None,
        }
    }

    /// Persistent storage for tokens and rate limit windows
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Response cache
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Rate limiter
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Deduplicator
    pub fn deduplicator(mut self, deduplicator: Arc<Deduplicator>) -> Self {
        self.deduplicator = Some(deduplicator);
        self
    }

    /// Observer told when the session ends
    pub fn session_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Underlying reqwest client
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Build the client
    ///
    /// Starts the cache sweeper when called inside a tokio runtime.
    pub async fn build(self) -> Result<HttpClient> {
        let config = self.config;
        config.validate()?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let tokens = TokenStore::new(Arc::clone(&storage));
        let csrf_token = tokens.csrf_token().await?;

        let http = match self.http {
            Some(client) => client,
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                Client::builder()
                    .timeout(config.timeout)
                    .user_agent(&config.user_agent)
                    .default_headers(headers)
                    .build()?
            }
        };

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(storage, config.rate_limit)));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResponseCache::new(config.default_cache_ttl)));
        let deduplicator = self
            .deduplicator
            .unwrap_or_else(|| Arc::new(Deduplicator::new(config.dedup_window)));
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(LogSessionObserver));

        let sweeper = if tokio::runtime::Handle::try_current().is_ok() {
            Some(cache.spawn_sweeper(config.cache_sweep_interval))
        } else {
            debug!("No tokio runtime, cache sweeper not started");
            None
        };

        Ok(HttpClient {
            inner: Arc::new(ClientInner {
                http,
                config,
                tokens,
                csrf_token,
                rate_limiter,
                cache,
                deduplicator,
                refresh: RefreshCoordinator::new(),
                observer,
                sweeper,
            }),
        })
    }
}

struct ClientInner {
    http: Client,
    config: ClientConfig,
    tokens: TokenStore,
    csrf_token: String,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    deduplicator: Arc<Deduplicator>,
    refresh: RefreshCoordinator,
    observer: Arc<dyn SessionObserver>,
    sweeper: Option<JoinHandle<()>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// HTTP client with auth refresh, dedup, rate limiting and caching
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    /// Create a builder
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Create a client with in-memory storage and default collaborators
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build().await
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> ApiResult<Envelope<T>> {
        decode_envelope(self.get_raw(url, options).await?)
    }

    /// Make a POST request
    pub async fn post<B, T>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<Envelope<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        decode_envelope(self.mutate(Method::POST, url, body, options).await?)
    }

    /// Make a PUT request
    pub async fn put<B, T>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<Envelope<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        decode_envelope(self.mutate(Method::PUT, url, body, options).await?)
    }

    /// Make a PATCH request
    pub async fn patch<B, T>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<Envelope<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        decode_envelope(self.mutate(Method::PATCH, url, body, options).await?)
    }

    /// Make a DELETE request
    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> ApiResult<Envelope<T>> {
        decode_envelope(self.request(Method::DELETE, url, None, options).await?)
    }

    /// Make a generic request with an untyped payload
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<JsonValue>,
        options: RequestOptions,
    ) -> ApiResult<Envelope> {
        match method {
            Method::GET => self.get_raw(url, options).await,
            Method::DELETE => {
                self.inner.rate_limiter.check_limit(url).await?;
                self.execute(self.prepare(method, url, body, &options)).await
            }
            _ => self.mutate(method, url, body, options).await,
        }
    }

    async fn get_raw(&self, url: &str, options: RequestOptions) -> ApiResult<Envelope> {
        self.inner.rate_limiter.check_limit(url).await?;

        let cache_key = ResponseCache::<Envelope>::key(Method::GET, url, &options.params);
        if !options.skip_cache {
            if let Some(hit) = self.inner.cache.get(&cache_key) {
                debug!(url, "Cache hit");
                return Ok(hit);
            }
        }

        let envelope = self.dispatch(Method::GET, url, None, &options).await?;

        if !options.skip_cache {
            let ttl = options.ttl.unwrap_or(self.inner.cache.default_ttl());
            self.inner.cache.set(&cache_key, envelope.clone(), ttl);
        }

        Ok(envelope)
    }

    async fn mutate(
        &self,
        method: Method,
        url: &str,
        body: Option<JsonValue>,
        options: RequestOptions,
    ) -> ApiResult<Envelope> {
        self.inner.rate_limiter.check_limit(url).await?;
        self.dispatch(method, url, body, &options).await
    }

    /// Send through the deduplicator unless the call opts out
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<JsonValue>,
        options: &RequestOptions,
    ) -> ApiResult<Envelope> {
        let request = self.prepare(method, url, body, options);

        if options.skip_deduplication || method == Method::DELETE {
            return self.execute(request).await;
        }

        let key = if method == Method::GET {
            let params = (!request.params.is_empty()).then_some(&request.params);
            Deduplicator::<Envelope>::key(method, url, params)
        } else {
            Deduplicator::<Envelope>::key(method, url, request.body.as_ref())
        };

        let client = self.clone();
        self.inner
            .deduplicator
            .deduplicate(&key, move || async move { client.execute(request).await })
            .await
    }

    fn prepare(
        &self,
        method: Method,
        url: &str,
        body: Option<JsonValue>,
        options: &RequestOptions,
    ) -> PreparedRequest {
        PreparedRequest {
            method,
            url: url.to_string(),
            params: options.params.clone(),
            body,
            skip_auth: options.skip_auth,
            timeout: options.timeout,
        }
    }

    /// Transport call with one refresh-and-replay on 401
    async fn execute(&self, request: PreparedRequest) -> ApiResult<Envelope> {
        let token = if request.skip_auth {
            None
        } else {
            self.inner.tokens.access_token().await?
        };

        match self.send(&request, token.as_deref()).await {
            Err(err) if err.is_unauthorized() && !request.skip_auth => {
                debug!(url = %request.url, "Got 401, refreshing access token");
                let token = self.recover_session(token.as_deref()).await?;
                self.send(&request, Some(&token)).await
            }
            other => other,
        }
    }

    /// A usable access token after a 401, refreshing if nobody else has
    async fn recover_session(&self, used_token: Option<&str>) -> ApiResult<String> {
        if let Some(current) = self.inner.tokens.access_token().await? {
            if used_token != Some(current.as_str()) {
                debug!("Access token already replaced, replaying");
                return Ok(current);
            }
        }

        let client = self.clone();
        self.inner
            .refresh
            .refresh(move || async move { client.refresh_tokens().await })
            .await
    }

    /// Rotate the token pair. Any failure ends the session as `AuthExpired`.
    async fn refresh_tokens(&self) -> ApiResult<String> {
        let outcome = self.rotate_tokens().await.map_err(|mut err| {
            err.kind = ErrorKind::AuthExpired;
            err
        });

        match &outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(err) => {
                warn!(error = %err, status = err.status, "Token refresh failed, ending session");
                self.end_session().await;
            }
        }
        outcome
    }

    async fn rotate_tokens(&self) -> ApiResult<String> {
        let tokens = self.request_new_tokens().await?;
        self.inner
            .tokens
            .set_tokens(&tokens.access_token, &tokens.refresh_token)
            .await?;
        Ok(tokens.access_token)
    }

    async fn request_new_tokens(&self) -> ApiResult<TokenRefreshResponse> {
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .await?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::new(ErrorKind::AuthExpired, 401, "No refresh token available")
            })?;

        let url = self.build_url(&self.inner.config.refresh_path);
        let response = self
            .inner
            .http
            .post(&url)
            .header(CSRF_HEADER, &self.inner.csrf_token)
            .header(REQUESTED_WITH_HEADER, "XMLHttpRequest")
            .json(&TokenRefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &bytes));
        }

        let body: RefreshBody =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(e.to_string()))?;
        Ok(body.into_inner())
    }

    /// Clear tokens and notify the observer after a failed refresh
    async fn end_session(&self) {
        if let Err(e) = self.inner.tokens.clear().await {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        self.inner
            .observer
            .session_expired(&self.inner.config.login_route);
    }

    async fn send(&self, request: &PreparedRequest, token: Option<&str>) -> ApiResult<Envelope> {
        let url = self.build_url(&request.url);

        let mut req = self
            .inner
            .http
            .request(request.method.into(), &url)
            .header(CSRF_HEADER, &self.inner.csrf_token)
            .header(REQUESTED_WITH_HEADER, "XMLHttpRequest");

        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if !request.params.is_empty() {
            req = req.query(&request.params);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        debug!(method = %request.method, url = %url, "Sending request");
        let response = req.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &bytes);
            debug!(status = status.as_u16(), message = %err.message, "Request failed");
            return Err(err);
        }

        parse_envelope(status.as_u16(), &bytes)
    }

    /// Drop the local session: tokens, cached responses and dedup entries
    pub async fn clear_session(&self) -> Result<()> {
        self.inner.tokens.clear().await?;
        self.inner.cache.clear();
        self.inner.deduplicator.clear();
        info!("Local session cleared");
        Ok(())
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Token store
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// CSRF token sent with every request
    pub fn csrf_token(&self) -> &str {
        &self.inner.csrf_token
    }

    /// Response cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.inner.cache
    }

    /// Rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.rate_limiter
    }

    /// Deduplicator
    pub fn deduplicator(&self) -> &Arc<Deduplicator> {
        &self.inner.deduplicator
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.inner.config.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .field("deduplicator", &self.inner.deduplicator)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

/// Refresh responses may come bare or wrapped in an envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshBody {
    Bare(TokenRefreshResponse),
    Wrapped { data: TokenRefreshResponse },
}

impl RefreshBody {
    fn into_inner(self) -> TokenRefreshResponse {
        match self {
            RefreshBody::Bare(tokens) | RefreshBody::Wrapped { data: tokens } => tokens,
        }
    }
}

/// Decode a success body into an envelope
///
/// Empty bodies become `data: null`; bodies without a `data` field are
/// wrapped whole. A missing `status` falls back to the HTTP status.
fn parse_envelope(status: u16, bytes: &[u8]) -> ApiResult<Envelope> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Envelope::new(JsonValue::Null, status));
    }

    let value: JsonValue =
        serde_json::from_slice(bytes).map_err(|e| ApiError::decode(e.to_string()))?;

    match value {
        JsonValue::Object(mut map) if map.contains_key("data") => {
            let data = map.remove("data").unwrap_or(JsonValue::Null);
            let message = map
                .get("message")
                .and_then(JsonValue::as_str)
                .map(ToString::to_string);
            let status = map
                .get("status")
                .and_then(JsonValue::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(status);
            Ok(Envelope {
                data,
                message,
                status,
            })
        }
        other => Ok(Envelope::new(other, status)),
    }
}

fn decode_envelope<T: DeserializeOwned>(envelope: Envelope) -> ApiResult<Envelope<T>> {
    let Envelope {
        data,
        message,
        status,
    } = envelope;
    let data = serde_json::from_value(data).map_err(|e| ApiError::decode(e.to_string()))?;
    Ok(Envelope {
        data,
        message,
        status,
    })
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<Option<JsonValue>> {
    let value = serde_json::to_value(body).map_err(|e| {
        ApiError::new(
            ErrorKind::Transport,
            500,
            format!("Failed to encode request body: {e}"),
        )
    })?;
    Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod envelope_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope_shapes() {
        let env = parse_envelope(200, br#"{"data": {"id": 1}, "message": "ok", "status": 201}"#)
            .unwrap();
        assert_eq!(env.data, json!({"id": 1}));
        assert_eq!(env.message.as_deref(), Some("ok"));
        assert_eq!(env.status, 201);

        let env = parse_envelope(200, br#"{"data": null}"#).unwrap();
        assert_eq!(env.data, JsonValue::Null);
        assert_eq!(env.status, 200);

        let env = parse_envelope(200, br#"[1, 2, 3]"#).unwrap();
        assert_eq!(env.data, json!([1, 2, 3]));

        let env = parse_envelope(204, b"").unwrap();
        assert_eq!(env.data, JsonValue::Null);
        assert_eq!(env.status, 204);
    }

    #[test]
    fn test_parse_envelope_rejects_invalid_json() {
        let err = parse_envelope(200, b"<html>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.status, 500);
    }

    #[test]
    fn test_decode_envelope_type_mismatch() {
        let env = Envelope::new(json!("not a number"), 200);
        let err = decode_envelope::<u32>(env).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[test]
    fn test_encode_body_null_is_absent() {
        assert_eq!(encode_body(&()).unwrap(), None);
        assert_eq!(encode_body(&json!({"a": 1})).unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_refresh_body_forms() {
        let bare: RefreshBody = serde_json::from_value(json!({
            "accessToken": "a", "refreshToken": "r", "expiresIn": 60
        }))
        .unwrap();
        assert_eq!(bare.into_inner().access_token, "a");

        let wrapped: RefreshBody = serde_json::from_value(json!({
            "data": {"accessToken": "b", "refreshToken": "r"}
        }))
        .unwrap();
        assert_eq!(wrapped.into_inner().access_token, "b");
    }
}
