use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use canto_api::{create_api_router, AppState};
use canto_core::{CantoResult, HistogramKey, RequestContext, UpstreamError};
use canto_storage::{
    CacheConfig, HistogramStore, InMemoryHistogramStore, RetryPolicy, SourceFetcher,
};
use serde_json::Value;
use tower::ServiceExt;

/// Document store double serving fixed texts by store key.
#[derive(Default)]
pub struct StaticFetcher {
    texts: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_text(mut self, key: &str, text: &str) -> Self {
        self.texts.insert(key.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch_text(&self, key: &HistogramKey, _ctx: &RequestContext) -> CantoResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts
            .get(&key.store_key())
            .cloned()
            .ok_or_else(|| {
                UpstreamError::NotFound {
                    key: key.store_key(),
                }
                .into()
            })
    }
}

/// Document store double that is never reachable.
pub struct UnreachableFetcher;

#[async_trait]
impl SourceFetcher for UnreachableFetcher {
    async fn fetch_text(&self, key: &HistogramKey, _ctx: &RequestContext) -> CantoResult<String> {
        Err(UpstreamError::Unavailable {
            key: key.store_key(),
            reason: "connection refused".to_string(),
        }
        .into())
    }
}

/// Document store double returning documents without usable text.
pub struct InvalidFetcher;

#[async_trait]
impl SourceFetcher for InvalidFetcher {
    async fn fetch_text(&self, key: &HistogramKey, _ctx: &RequestContext) -> CantoResult<String> {
        Err(UpstreamError::InvalidDocument {
            key: key.store_key(),
            reason: "missing field textItalian".to_string(),
        }
        .into())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryHistogramStore>,
}

/// Full router over an in-memory store and `fetcher`, without retry delays.
pub fn test_app(fetcher: Arc<dyn SourceFetcher>) -> TestApp {
    let store = Arc::new(InMemoryHistogramStore::new());
    let state = AppState::new(
        store.clone() as Arc<dyn HistogramStore>,
        fetcher,
        CacheConfig::new().with_retry(RetryPolicy::none()),
    );
    TestApp {
        router: create_api_router(state.clone()),
        state,
        store,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send `request` and decode the JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
