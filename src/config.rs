//! Client configuration
//!
//! [`ClientConfig`] can be built in code, read from the environment, or
//! loaded from a YAML file whose durations are given in milliseconds:
//!
//! ```yaml
//! api_url: https://admin.example.com/api
//! timeout_ms: 30000
//! cache_ttl_ms: 300000
//! rate_limit:
//!   max_requests: 100
//!   window_ms: 60000
//! ```

use crate::error::{Error, Result};
use crate::http::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Environment variables consulted for the API URL, first match wins
pub const API_URL_ENV: [&str; 2] = ["DASHBOARD_API_URL", "VITE_API_URL"];

/// Environment variables consulted for the application mode
pub const APP_MODE_ENV: [&str; 2] = ["DASHBOARD_APP_MODE", "VITE_APP_MODE"];

/// Deployment mode of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for AppMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(AppMode::Development),
            "staging" => Ok(AppMode::Staging),
            "production" | "prod" => Ok(AppMode::Production),
            other => Err(Error::invalid_value(
                "app_mode",
                format!("unknown mode '{other}'"),
            )),
        }
    }
}

/// Configuration for the dashboard HTTP client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL every relative path is resolved against
    pub api_url: String,
    /// Transport timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// TTL for cached GET responses when the call gives none
    pub default_cache_ttl: Duration,
    /// How often expired cache entries are swept
    pub cache_sweep_interval: Duration,
    /// Window during which identical requests collapse into one
    pub dedup_window: Duration,
    /// Client-side rate limit
    pub rate_limit: RateLimitConfig,
    /// Token refresh endpoint, relative to `api_url`
    pub refresh_path: String,
    /// Route the session observer is sent to when the session ends
    pub login_route: String,
    /// Deployment mode
    pub app_mode: AppMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("dashboard-client/{}", env!("CARGO_PKG_VERSION")),
            default_cache_ttl: Duration::from_millis(300_000),
            cache_sweep_interval: Duration::from_millis(60_000),
            dedup_window: Duration::from_millis(1000),
            rate_limit: RateLimitConfig::default(),
            refresh_path: "/auth/refresh".to_string(),
            login_route: "/login".to_string(),
            app_mode: AppMode::Development,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = first_env(&API_URL_ENV) {
            config.api_url = url;
        }
        if let Some(mode) = first_env(&APP_MODE_ENV) {
            config.app_mode = mode.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file, starting from defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load from a YAML string, starting from defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let mut config = Self::default();
        file.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "api_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(Error::invalid_value(
                "rate_limit.max_requests",
                "must be greater than zero",
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid_value("timeout", "must be greater than zero"));
        }
        Ok(())
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|v| !v.trim().is_empty())
}

/// On-disk representation; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    cache_ttl_ms: Option<u64>,
    cache_sweep_interval_ms: Option<u64>,
    dedup_window_ms: Option<u64>,
    rate_limit: Option<RateLimitFile>,
    refresh_path: Option<String>,
    login_route: Option<String>,
    app_mode: Option<AppMode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RateLimitFile {
    max_requests: Option<u32>,
    window_ms: Option<u64>,
}

impl ConfigFile {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(v) = self.api_url {
            config.api_url = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.user_agent {
            config.user_agent = v;
        }
        if let Some(v) = self.cache_ttl_ms {
            config.default_cache_ttl = Duration::from_millis(v);
        }
        if let Some(v) = self.cache_sweep_interval_ms {
            config.cache_sweep_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.dedup_window_ms {
            config.dedup_window = Duration::from_millis(v);
        }
        if let Some(rl) = self.rate_limit {
            if let Some(v) = rl.max_requests {
                config.rate_limit.max_requests = v;
            }
            if let Some(v) = rl.window_ms {
                config.rate_limit.window = Duration::from_millis(v);
            }
        }
        if let Some(v) = self.refresh_path {
            config.refresh_path = v;
        }
        if let Some(v) = self.login_route {
            config.login_route = v;
        }
        if let Some(v) = self.app_mode {
            config.app_mode = v;
        }
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the API base URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the transport timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the default cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_cache_ttl = ttl;
        self
    }

    /// Set the cache sweep interval
    pub fn cache_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.cache_sweep_interval = interval;
        self
    }

    /// Set the dedup window
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.config.dedup_window = window;
        self
    }

    /// Set the rate limit
    pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.config.rate_limit = RateLimitConfig::new(max_requests, window);
        self
    }

    /// Set the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set the login route
    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.config.login_route = route.into();
        self
    }

    /// Set the application mode
    pub fn app_mode(mut self, mode: AppMode) -> Self {
        self.config.app_mode = mode;
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.default_cache_ttl, Duration::from_millis(300_000));
        assert_eq!(config.cache_sweep_interval, Duration::from_millis(60_000));
        assert_eq!(config.dedup_window, Duration::from_millis(1000));
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window, Duration::from_millis(60_000));
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.login_route, "/login");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .api_url("https://admin.example.com/api")
            .timeout(Duration::from_secs(5))
            .cache_ttl(Duration::from_secs(30))
            .dedup_window(Duration::from_millis(250))
            .rate_limit(3, Duration::from_secs(60))
            .login_route("/signin")
            .app_mode(AppMode::Production)
            .build();

        assert_eq!(config.api_url, "https://admin.example.com/api");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.default_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.dedup_window, Duration::from_millis(250));
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.login_route, "/signin");
        assert_eq!(config.app_mode, AppMode::Production);
    }

    #[test]
    fn test_from_yaml_str_partial() {
        let yaml = r"
api_url: https://admin.example.com/api
timeout_ms: 5000
rate_limit:
  max_requests: 10
app_mode: staging
";
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.api_url, "https://admin.example.com/api");
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.rate_limit.max_requests, 10);
        // untouched fields keep defaults
        assert_eq!(config.rate_limit.window, Duration::from_millis(60_000));
        assert_eq!(config.app_mode, AppMode::Staging);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields() {
        let err = ClientConfig::from_yaml_str("base_url: http://x").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dedup_window_ms: 50\nlogin_route: /auth/login").unwrap();

        let config = ClientConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.dedup_window, Duration::from_millis(50));
        assert_eq!(config.login_route, "/auth/login");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ClientConfig::builder().api_url("ftp://example.com").build();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue { .. })
        ));

        let config = ClientConfig::builder().api_url("not a url").build();
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_app_mode_parse() {
        assert_eq!("production".parse::<AppMode>().unwrap(), AppMode::Production);
        assert_eq!("Dev".parse::<AppMode>().unwrap(), AppMode::Development);
        assert!("qa".parse::<AppMode>().is_err());
    }
}
