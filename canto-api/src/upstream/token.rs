//! Client-credentials token client.
//!
//! Requests bearer tokens from the token authority with
//! `GET {url}/token?grant_type=client_credentials&client_id=..&client_secret=..`
//! and caches each token until shortly before it expires.

use std::time::{Duration, Instant};

use canto_core::{CantoResult, RequestContext, UpstreamError, REQUEST_ID_HEADER};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::OAuthConfig;

/// Tokens are refreshed this long before the authority says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// Lifetime assumed when the authority omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(300);

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

pub struct TokenClient {
    http: Client,
    config: OAuthConfig,
    // Held across the token request so concurrent callers share one fetch.
    cached: Mutex<Option<CachedToken>>,
}

impl TokenClient {
    pub fn new(http: Client, config: OAuthConfig) -> Self {
        Self {
            http,
            config,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, from cache when possible.
    pub async fn access_token(&self, ctx: &RequestContext) -> CantoResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let response = self.request_token(ctx).await?;
        let lifetime = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        tracing::debug!(
            token_type = response.token_type.as_deref().unwrap_or("bearer"),
            expires_in_secs = lifetime.as_secs(),
            "Obtained access token"
        );

        let token = CachedToken {
            access_token: response.access_token,
            expires_at: Instant::now() + lifetime,
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token, e.g. after the document store rejected it.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn request_token(&self, ctx: &RequestContext) -> CantoResult<TokenResponse> {
        let url = format!("{}/token", self.config.url.trim_end_matches('/'));
        let mut query = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];
        if let Some(scope) = &self.config.scope {
            query.push(("scope", scope.as_str()));
        }

        let mut request = self
            .http
            .get(&url)
            .query(&query)
            .header(REQUEST_ID_HEADER, ctx.request_id());
        for (name, value) in ctx.trace_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| UpstreamError::Unavailable {
            key: url.clone(),
            reason: e.without_url().to_string(),
        })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::Unavailable {
                key: url,
                reason: format!("token authority returned {}", status),
            }
            .into());
        }
        if !status.is_success() {
            return Err(UpstreamError::TokenRejected {
                reason: format!("token authority returned {}", status),
            }
            .into());
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            UpstreamError::TokenRejected {
                reason: format!("unreadable token response: {}", e.without_url()),
            }
            .into()
        })
    }
}
