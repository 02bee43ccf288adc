//! Upstream collaborators: the document store and the token authority.

pub mod document;
pub mod token;

use std::time::Duration;

use canto_core::ConfigError;

pub use document::HttpDocumentFetcher;
pub use token::{TokenClient, TokenResponse};

/// Build the HTTP client shared by the document fetcher and token client.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("canto-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::InvalidValue {
            field: "http_client".to_string(),
            value: format!("timeout={}ms", timeout.as_millis()),
            reason: e.to_string(),
        })
}
