//! API Configuration Module
//!
//! Server, store, upstream and cache settings, loaded from environment
//! variables with defaults suitable for local development. Telemetry settings
//! live in [`crate::telemetry::TelemetryConfig`].

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use canto_core::{ConfigError, TextLanguage};
use canto_storage::{CacheConfig, RetryPolicy};
use secrecy::SecretString;

// ============================================================================
// STORE BACKEND
// ============================================================================

/// Which histogram store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::InvalidValue {
                field: "CANTO_STORE_BACKEND".to_string(),
                value: s.to_string(),
                reason: "expected 'redis' or 'memory'".to_string(),
            }),
        }
    }
}

// ============================================================================
// OAUTH CONFIGURATION
// ============================================================================

/// Client credentials for the token-issuing authority.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Base URL; tokens are requested from `{url}/token`.
    pub url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: Option<String>,
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Configuration for the Canto API service.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // Histogram store
    // ========================================================================
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub redis_pool_size: usize,
    /// Wait/create/recycle timeout for pooled Redis connections.
    pub redis_timeout: Duration,

    // ========================================================================
    // Upstream document store
    // ========================================================================
    pub document_url: String,
    /// Which text field of a document gets counted.
    pub document_language: TextLanguage,
    /// Per-request timeout for document and token calls.
    pub upstream_timeout: Duration,
    /// Bearer credentials for document requests; `None` sends none.
    pub oauth: Option<OAuthConfig>,

    // ========================================================================
    // Cache
    // ========================================================================
    pub populate_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3230,
            store_backend: StoreBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            redis_pool_size: 15,
            redis_timeout: Duration::from_millis(2000),
            document_url: "http://localhost:3210".to_string(),
            document_language: TextLanguage::Italian,
            upstream_timeout: Duration::from_millis(5000),
            oauth: None,
            populate_timeout: Duration::from_millis(30_000),
            retry_max_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CANTO_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `CANTO_API_PORT`: Listen port (default: 3230)
    /// - `CANTO_STORE_BACKEND`: "redis" or "memory" (default: redis)
    /// - `CANTO_REDIS_URL` or `REDIS_URL`: Redis URL, or a bare `host:port`
    ///   that gets `redis://` (default: redis://localhost:6379)
    /// - `CANTO_REDIS_POOL_SIZE`: Max pooled connections (default: 15)
    /// - `CANTO_REDIS_TIMEOUT_MS`: Pool timeouts (default: 2000)
    /// - `CANTO_DOCUMENT_URL`: Document store base URL (default: http://localhost:3210)
    /// - `CANTO_DOCUMENT_LANGUAGE`: "italian" or "english" (default: italian)
    /// - `CANTO_UPSTREAM_TIMEOUT_MS`: Upstream request timeout (default: 5000)
    /// - `CANTO_OAUTH_URL`, `CANTO_OAUTH_CLIENT_ID`, `CANTO_OAUTH_CLIENT_SECRET`,
    ///   `CANTO_OAUTH_SCOPE`: Token authority credentials (optional)
    /// - `CANTO_POPULATE_TIMEOUT_MS`: Populate pass limit (default: 30000)
    /// - `CANTO_RETRY_MAX_ATTEMPTS`: Attempts for idempotent calls (default: 3)
    /// - `CANTO_RETRY_BACKOFF_MS`: First retry delay (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup, then validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let oauth = match var("CANTO_OAUTH_URL") {
            Some(url) => Some(OAuthConfig {
                url,
                client_id: var("CANTO_OAUTH_CLIENT_ID").ok_or_else(|| {
                    ConfigError::MissingRequired {
                        field: "CANTO_OAUTH_CLIENT_ID".to_string(),
                    }
                })?,
                client_secret: var("CANTO_OAUTH_CLIENT_SECRET")
                    .map(SecretString::from)
                    .ok_or_else(|| ConfigError::MissingRequired {
                        field: "CANTO_OAUTH_CLIENT_SECRET".to_string(),
                    })?,
                scope: var("CANTO_OAUTH_SCOPE"),
            }),
            None if var("CANTO_OAUTH_CLIENT_ID").is_some() => {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: "CANTO_OAUTH_CLIENT_ID".to_string(),
                    option_b: "missing CANTO_OAUTH_URL".to_string(),
                })
            }
            None => None,
        };

        let config = Self {
            bind_host: var("CANTO_API_BIND").unwrap_or(defaults.bind_host),
            port: parse_or("PORT", var("PORT").or_else(|| var("CANTO_API_PORT")), defaults.port)?,
            store_backend: match var("CANTO_STORE_BACKEND") {
                Some(raw) => raw.parse()?,
                None => defaults.store_backend,
            },
            redis_url: var("CANTO_REDIS_URL")
                .or_else(|| var("REDIS_URL"))
                .map(|url| with_redis_scheme(&url))
                .unwrap_or(defaults.redis_url),
            redis_pool_size: parse_or(
                "CANTO_REDIS_POOL_SIZE",
                var("CANTO_REDIS_POOL_SIZE"),
                defaults.redis_pool_size,
            )?,
            redis_timeout: millis_or(
                "CANTO_REDIS_TIMEOUT_MS",
                var("CANTO_REDIS_TIMEOUT_MS"),
                defaults.redis_timeout,
            )?,
            document_url: var("CANTO_DOCUMENT_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.document_url),
            document_language: match var("CANTO_DOCUMENT_LANGUAGE") {
                Some(raw) => raw.parse()?,
                None => defaults.document_language,
            },
            upstream_timeout: millis_or(
                "CANTO_UPSTREAM_TIMEOUT_MS",
                var("CANTO_UPSTREAM_TIMEOUT_MS"),
                defaults.upstream_timeout,
            )?,
            oauth,
            populate_timeout: millis_or(
                "CANTO_POPULATE_TIMEOUT_MS",
                var("CANTO_POPULATE_TIMEOUT_MS"),
                defaults.populate_timeout,
            )?,
            retry_max_attempts: parse_or(
                "CANTO_RETRY_MAX_ATTEMPTS",
                var("CANTO_RETRY_MAX_ATTEMPTS"),
                defaults.retry_max_attempts,
            )?,
            retry_backoff: millis_or(
                "CANTO_RETRY_BACKOFF_MS",
                var("CANTO_RETRY_BACKOFF_MS"),
                defaults.retry_backoff,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_pool_size == 0 {
            return Err(invalid("CANTO_REDIS_POOL_SIZE", "0", "must be at least 1"));
        }
        if self.retry_max_attempts == 0 {
            return Err(invalid("CANTO_RETRY_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        if self.populate_timeout.is_zero() {
            return Err(invalid("CANTO_POPULATE_TIMEOUT_MS", "0", "must be positive"));
        }
        if self.upstream_timeout.is_zero() {
            return Err(invalid("CANTO_UPSTREAM_TIMEOUT_MS", "0", "must be positive"));
        }
        if !is_http_url(&self.document_url) {
            return Err(invalid(
                "CANTO_DOCUMENT_URL",
                &self.document_url,
                "must be an http(s) URL",
            ));
        }
        if let Some(oauth) = &self.oauth {
            if !is_http_url(&oauth.url) {
                return Err(invalid("CANTO_OAUTH_URL", &oauth.url, "must be an http(s) URL"));
            }
        }
        if self.store_backend == StoreBackend::Redis
            && !(self.redis_url.starts_with("redis://") || self.redis_url.starts_with("rediss://"))
        {
            return Err(invalid(
                "CANTO_REDIS_URL",
                "<redacted>",
                "must start with redis:// or rediss://",
            ));
        }
        Ok(())
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| invalid("CANTO_API_BIND", &addr, &e.to_string()))
    }

    /// Orchestrator settings derived from this config.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_populate_timeout(self.populate_timeout)
            .with_retry(RetryPolicy {
                max_attempts: self.retry_max_attempts,
                initial_backoff: self.retry_backoff,
                ..RetryPolicy::default()
            })
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T: FromStr>(field: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(field, &raw, "not a valid number")),
        None => Ok(default),
    }
}

fn millis_or(field: &str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    parse_or::<u64>(field, raw, default.as_millis() as u64).map(Duration::from_millis)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// `host:port` addresses carry no scheme.
fn with_redis_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("redis://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3230);
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.redis_pool_size, 15);
        assert_eq!(config.document_language, TextLanguage::Italian);
        assert_eq!(config.populate_timeout, Duration::from_secs(30));
        assert!(config.oauth.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("CANTO_API_PORT", "9999"),
            ("CANTO_STORE_BACKEND", "memory"),
            ("REDIS_URL", "redis://cache:6379"),
            ("CANTO_DOCUMENT_URL", "http://document:3210/"),
            ("CANTO_DOCUMENT_LANGUAGE", "en"),
            ("CANTO_RETRY_MAX_ATTEMPTS", "5"),
            ("CANTO_RETRY_BACKOFF_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.document_url, "http://document:3210");
        assert_eq!(config.document_language, TextLanguage::English);

        let cache = config.cache_config();
        assert_eq!(cache.retry.max_attempts, 5);
        assert_eq!(cache.retry.initial_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_oauth_requires_credentials() {
        let err = ApiConfig::from_lookup(lookup(&[("CANTO_OAUTH_URL", "http://oauth:3220")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { field } if field == "CANTO_OAUTH_CLIENT_ID"));

        let err = ApiConfig::from_lookup(lookup(&[("CANTO_OAUTH_CLIENT_ID", "keyvalue")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleOptions { .. }));

        let config = ApiConfig::from_lookup(lookup(&[
            ("CANTO_OAUTH_URL", "http://oauth:3220"),
            ("CANTO_OAUTH_CLIENT_ID", "keyvalue"),
            ("CANTO_OAUTH_CLIENT_SECRET", "s3cret"),
        ]))
        .unwrap();
        let oauth = config.oauth.unwrap();
        assert_eq!(oauth.client_secret.expose_secret(), "s3cret");
        assert!(!format!("{:?}", oauth).contains("s3cret"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(ApiConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("CANTO_STORE_BACKEND", "lmdb")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("CANTO_DOCUMENT_LANGUAGE", "latin")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("CANTO_REDIS_POOL_SIZE", "0")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("CANTO_DOCUMENT_URL", "document:3210")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("CANTO_REDIS_URL", "http://cache:6379")])).is_err());
    }

    #[test]
    fn test_bare_redis_address_gets_scheme() {
        let config = ApiConfig::from_lookup(lookup(&[("REDIS_URL", "cache:6379")])).unwrap();
        assert_eq!(config.redis_url, "redis://cache:6379");

        let config =
            ApiConfig::from_lookup(lookup(&[("CANTO_REDIS_URL", "rediss://cache:6380")])).unwrap();
        assert_eq!(config.redis_url, "rediss://cache:6380");
    }

    #[test]
    fn test_memory_backend_ignores_redis_url() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("CANTO_STORE_BACKEND", "memory"),
            ("CANTO_REDIS_URL", "not-a-url"),
        ]));
        assert!(config.is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig::from_lookup(lookup(&[("CANTO_API_BIND", "127.0.0.1")])).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:3230");

        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }
}
