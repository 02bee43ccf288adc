//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use canto_storage::{
    CacheConfig, HistogramCache, HistogramStore, InMemoryHistogramStore, SourceFetcher,
};

use crate::config::{ApiConfig, StoreBackend};
use crate::error::ApiResult;
use crate::telemetry::{InstrumentedStore, PassMetrics};
use crate::upstream::{http_client, HttpDocumentFetcher, TokenClient};

/// Read-through cache as wired by the API.
///
/// Store and fetcher are trait objects so the backend can be picked at
/// startup and doubles can be injected in tests.
pub type ApiCache = HistogramCache<dyn HistogramStore, dyn SourceFetcher>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HistogramStore>,
        fetcher: Arc<dyn SourceFetcher>,
        config: CacheConfig,
    ) -> Self {
        Self {
            cache: Arc::new(
                HistogramCache::new(store, fetcher, config).with_observer(Arc::new(PassMetrics)),
            ),
            start_time: Instant::now(),
        }
    }

    /// Open the configured store and build the upstream clients.
    ///
    /// Fails when the store cannot be reached; the service does not start
    /// without one.
    pub async fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        let store: Arc<dyn HistogramStore> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory histogram store; histograms are lost on restart");
                Arc::new(InMemoryHistogramStore::new())
            }
            StoreBackend::Redis => open_redis(config).await?,
        };
        let store: Arc<dyn HistogramStore> = Arc::new(InstrumentedStore::new(store));

        let http = http_client(config.upstream_timeout)?;
        let mut fetcher =
            HttpDocumentFetcher::new(http.clone(), &config.document_url, config.document_language)?;
        if let Some(oauth) = &config.oauth {
            tracing::info!(url = %oauth.url, "Document requests carry client-credentials tokens");
            fetcher = fetcher.with_token_client(Arc::new(TokenClient::new(http, oauth.clone())));
        }

        tracing::info!(
            backend = store.backend_name(),
            document_url = %config.document_url,
            language = config.document_language.field_name(),
            "Histogram cache ready"
        );

        Ok(Self::new(store, Arc::new(fetcher), config.cache_config()))
    }

    /// Release store connections.
    pub async fn shutdown(&self) {
        self.cache.store().close().await;
    }
}

#[cfg(feature = "redis")]
async fn open_redis(config: &ApiConfig) -> ApiResult<Arc<dyn HistogramStore>> {
    use canto_storage::{RedisHistogramStore, RedisStoreConfig};

    let redis = RedisStoreConfig {
        url: config.redis_url.clone(),
        pool_size: config.redis_pool_size,
        timeout: config.redis_timeout,
    };
    let store = RedisHistogramStore::connect(&redis).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_config: &ApiConfig) -> ApiResult<Arc<dyn HistogramStore>> {
    Err(crate::error::ApiError::internal_error(
        "CANTO_STORE_BACKEND=redis requires the `redis` feature",
    ))
}

impl FromRef<AppState> for Arc<ApiCache> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}
