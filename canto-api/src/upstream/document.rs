//! HTTP source fetcher backed by the document store.
//!
//! `GET {document_url}/api/v1/document/{book}/{canto}/{verse}` returns a
//! [`SourceDocument`]; the text field for the configured language is what
//! gets counted.

use std::sync::Arc;

use async_trait::async_trait;
use canto_core::{
    CantoError, CantoResult, ConfigError, HistogramKey, RequestContext, SourceDocument,
    TextLanguage, UpstreamError, REQUEST_ID_HEADER,
};
use canto_storage::SourceFetcher;
use reqwest::{Client, StatusCode, Url};

use super::token::TokenClient;
use crate::telemetry::metrics;

pub struct HttpDocumentFetcher {
    http: Client,
    base_url: Url,
    language: TextLanguage,
    token: Option<Arc<TokenClient>>,
}

impl HttpDocumentFetcher {
    pub fn new(http: Client, base_url: &str, language: TextLanguage) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "CANTO_DOCUMENT_URL".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "CANTO_DOCUMENT_URL".to_string(),
                value: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }
        Ok(Self {
            http,
            base_url,
            language,
            token: None,
        })
    }

    /// Send a bearer token from `token` with every document request.
    pub fn with_token_client(mut self, token: Arc<TokenClient>) -> Self {
        self.token = Some(token);
        self
    }

    pub fn language(&self) -> TextLanguage {
        self.language
    }

    /// Document URL for `key`, with each segment percent-encoded.
    pub fn document_url(&self, key: &HistogramKey) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "document", key.book(), key.canto(), key.verse()]);
        }
        url
    }

    /// Fetch the whole document for `key`.
    pub async fn fetch_document(
        &self,
        key: &HistogramKey,
        ctx: &RequestContext,
    ) -> CantoResult<SourceDocument> {
        let result = self.request_document(key, ctx).await;
        record_outcome(&result);
        result
    }

    async fn request_document(
        &self,
        key: &HistogramKey,
        ctx: &RequestContext,
    ) -> CantoResult<SourceDocument> {
        let url = self.document_url(key);
        tracing::debug!(key = %key, url = %url, "Fetching source document");

        let mut request = self
            .http
            .get(url)
            .header(REQUEST_ID_HEADER, ctx.request_id());
        for (name, value) in ctx.trace_headers() {
            request = request.header(name, value);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.access_token(ctx).await?);
        }

        let response = request.send().await.map_err(|e| UpstreamError::Unavailable {
            key: key.store_key(),
            reason: e.without_url().to_string(),
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(UpstreamError::NotFound {
                    key: key.store_key(),
                }
                .into())
            }
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                // A retry will request a fresh token.
                if let Some(token) = &self.token {
                    token.invalidate().await;
                }
                return Err(UpstreamError::Unavailable {
                    key: key.store_key(),
                    reason: format!("document store rejected credentials ({})", status),
                }
                .into());
            }
            status => {
                return Err(UpstreamError::Unavailable {
                    key: key.store_key(),
                    reason: format!("document store returned {}", status),
                }
                .into())
            }
        }

        response.json::<SourceDocument>().await.map_err(|e| {
            let is_decode = e.is_decode();
            let reason = e.without_url().to_string();
            if is_decode {
                UpstreamError::InvalidDocument {
                    key: key.store_key(),
                    reason,
                }
            } else {
                UpstreamError::Unavailable {
                    key: key.store_key(),
                    reason,
                }
            }
            .into()
        })
    }
}

fn record_outcome(result: &CantoResult<SourceDocument>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(CantoError::Upstream(UpstreamError::NotFound { .. })) => "not_found",
        Err(CantoError::Upstream(UpstreamError::InvalidDocument { .. })) => "invalid",
        Err(CantoError::Upstream(UpstreamError::TokenRejected { .. })) => "unauthorized",
        Err(_) => "unavailable",
    };
    if let Some(metrics) = metrics() {
        metrics.record_upstream_fetch(outcome);
    }
    if let Err(err) = result {
        tracing::warn!(outcome, error = %err, "Source document fetch failed");
    }
}

#[async_trait]
impl SourceFetcher for HttpDocumentFetcher {
    async fn fetch_text(&self, key: &HistogramKey, ctx: &RequestContext) -> CantoResult<String> {
        let document = self.fetch_document(key, ctx).await?;
        document
            .text(self.language)
            .map(str::to_string)
            .ok_or_else(|| {
                UpstreamError::InvalidDocument {
                    key: key.store_key(),
                    reason: format!("missing field {}", self.language.field_name()),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::upstream::test_server::serve;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use secrecy::SecretString;

    async fn document_store() -> String {
        let router = Router::new().route(
            "/api/v1/document/:book/:canto/:verse",
            get(
                |Path((book, canto, verse)): Path<(String, String, String)>, headers: HeaderMap| async move {
                    match (book.as_str(), canto.as_str(), verse.as_str()) {
                        ("inferno", "cantoi", "1") => Json(serde_json::json!({
                            "book": "inferno",
                            "title": "Canto I",
                            "roman": "I",
                            "arabic": 1,
                            "verse": 1,
                            "words": 7,
                            "textItalian": "Nel mezzo del cammin di nostra vita",
                            "textEnglish": "Midway upon the journey of our life",
                        }))
                        .into_response(),
                        ("inferno", "cantoi", "2") => {
                            Json(serde_json::json!({ "book": "inferno" })).into_response()
                        }
                        ("broken", _, _) => (AxumStatus::OK, "<html>").into_response(),
                        ("down", _, _) => AxumStatus::BAD_GATEWAY.into_response(),
                        ("secured", _, _) => {
                            let authorized = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                == Some("Bearer token-0");
                            if authorized {
                                Json(serde_json::json!({ "textItalian": "chiuso" })).into_response()
                            } else {
                                AxumStatus::UNAUTHORIZED.into_response()
                            }
                        }
                        ("traced", _, _) => {
                            let header = |name: &str| {
                                headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("").to_string()
                            };
                            Json(serde_json::json!({
                                "textItalian": format!("{} {}", header("x-request-id"), header("traceparent")),
                            }))
                            .into_response()
                        }
                        _ => AxumStatus::NOT_FOUND.into_response(),
                    }
                },
            ),
        );
        serve(router).await
    }

    fn key(book: &str, verse: &str) -> HistogramKey {
        HistogramKey::new(book, "cantoi", verse).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_configured_language() {
        let url = document_store().await;
        let ctx = RequestContext::new();

        let italian = HttpDocumentFetcher::new(Client::new(), &url, TextLanguage::Italian).unwrap();
        assert_eq!(
            italian.fetch_text(&key("inferno", "1"), &ctx).await.unwrap(),
            "Nel mezzo del cammin di nostra vita"
        );

        let english = HttpDocumentFetcher::new(Client::new(), &url, TextLanguage::English).unwrap();
        assert_eq!(
            english.fetch_text(&key("inferno", "1"), &ctx).await.unwrap(),
            "Midway upon the journey of our life"
        );
    }

    #[tokio::test]
    async fn test_error_classification() {
        let url = document_store().await;
        let fetcher = HttpDocumentFetcher::new(Client::new(), &url, TextLanguage::Italian).unwrap();
        let ctx = RequestContext::new();

        let missing = fetcher.fetch_text(&key("purgatorio", "1"), &ctx).await.unwrap_err();
        assert!(matches!(missing, CantoError::Upstream(UpstreamError::NotFound { .. })));

        let no_text = fetcher.fetch_text(&key("inferno", "2"), &ctx).await.unwrap_err();
        assert!(matches!(no_text, CantoError::Upstream(UpstreamError::InvalidDocument { .. })));

        let broken = fetcher.fetch_text(&key("broken", "1"), &ctx).await.unwrap_err();
        assert!(matches!(broken, CantoError::Upstream(UpstreamError::InvalidDocument { .. })));

        let down = fetcher.fetch_text(&key("down", "1"), &ctx).await.unwrap_err();
        assert!(matches!(down, CantoError::Upstream(UpstreamError::Unavailable { .. })));
        assert!(down.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let fetcher =
            HttpDocumentFetcher::new(Client::new(), "http://127.0.0.1:1", TextLanguage::Italian)
                .unwrap();
        let err = fetcher
            .fetch_text(&key("inferno", "1"), &RequestContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CantoError::Upstream(UpstreamError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_forwards_request_id_and_trace_headers() {
        let url = document_store().await;
        let fetcher = HttpDocumentFetcher::new(Client::new(), &url, TextLanguage::Italian).unwrap();
        let mut ctx = RequestContext::with_request_id("req-7");
        ctx.insert_header("traceparent", "00-abc-def-01");

        let text = fetcher.fetch_text(&key("traced", "1"), &ctx).await.unwrap();
        assert_eq!(text, "req-7 00-abc-def-01");
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let url = document_store().await;
        let authority = serve(Router::new().route(
            "/token",
            get(|| async {
                Json(serde_json::json!({ "access_token": "token-0", "expires_in": 3600 }))
            }),
        ))
        .await;
        let token = Arc::new(TokenClient::new(
            Client::new(),
            OAuthConfig {
                url: authority,
                client_id: "000000".to_string(),
                client_secret: SecretString::from("999999".to_string()),
                scope: None,
            },
        ));

        let fetcher = HttpDocumentFetcher::new(Client::new(), &url, TextLanguage::Italian).unwrap();
        let ctx = RequestContext::new();
        assert!(fetcher.fetch_text(&key("secured", "1"), &ctx).await.is_err());

        let fetcher = fetcher.with_token_client(token);
        assert_eq!(fetcher.fetch_text(&key("secured", "1"), &ctx).await.unwrap(), "chiuso");
    }

    #[test]
    fn test_document_url_encodes_segments() {
        let fetcher =
            HttpDocumentFetcher::new(Client::new(), "http://document:3210/", TextLanguage::Italian)
                .unwrap();
        let url = fetcher.document_url(&HistogramKey::new("inferno", "canto?i", "1#2").unwrap());
        assert_eq!(
            url.as_str(),
            "http://document:3210/api/v1/document/inferno/canto%3Fi/1%232"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpDocumentFetcher::new(Client::new(), "document", TextLanguage::Italian).is_err());
        assert!(
            HttpDocumentFetcher::new(Client::new(), "mailto:a@b.c", TextLanguage::Italian).is_err()
        );
    }
}
