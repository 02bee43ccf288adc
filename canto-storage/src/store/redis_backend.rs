//! Redis-backed histogram store.
//!
//! Each histogram is a Redis hash at the key's store representation
//! (`book:canto:verse`), one field per word. Increments use `HINCRBY`, which
//! Redis applies atomically, so concurrent passes never lose counts.
//!
//! # Lifecycle
//!
//! The pool is opened once with [`RedisHistogramStore::connect`], shared by
//! every request through an `Arc`, and closed with
//! [`HistogramStore::close`] during shutdown.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use canto_core::{CantoResult, Histogram, HistogramKey, StoreError};
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};

use super::traits::HistogramStore;

/// Connection settings for [`RedisHistogramStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL, e.g. `redis://localhost:6379`
    pub url: String,
    /// Maximum pooled connections
    pub pool_size: usize,
    /// Timeout for acquiring, creating and recycling a connection
    pub timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 15,
            timeout: Duration::from_millis(2000),
        }
    }
}

impl RedisStoreConfig {
    /// Build the deadpool pool. Does not open any connection yet.
    pub fn create_pool(&self) -> CantoResult<Pool> {
        let mut cfg = Config::from_url(self.url.clone());
        let mut pool_config = PoolConfig::new(self.pool_size);
        pool_config.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            StoreError::ConnectionFailed {
                reason: format!("Failed to create pool: {}", e),
            }
            .into()
        })
    }
}

pub struct RedisHistogramStore {
    pool: Pool,
}

impl RedisHistogramStore {
    /// Create the pool and verify the server answers `PING`.
    pub async fn connect(config: &RedisStoreConfig) -> CantoResult<Self> {
        let store = Self {
            pool: config.create_pool()?,
        };
        store.ping().await?;
        tracing::info!(
            url = %redact_url(&config.url),
            pool_size = config.pool_size,
            "Connected to Redis histogram store"
        );
        Ok(store)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self, operation: &'static str, key: &str) -> CantoResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::unavailable(operation, key, e).into())
    }
}

#[async_trait]
impl HistogramStore for RedisHistogramStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn exists(&self, key: &HistogramKey) -> CantoResult<bool> {
        let store_key = key.store_key();
        let mut conn = self.conn("EXISTS", &store_key).await?;
        let exists: bool = conn
            .exists(&store_key)
            .await
            .map_err(|e| StoreError::unavailable("EXISTS", &store_key, e))?;
        Ok(exists)
    }

    async fn delete(&self, key: &HistogramKey) -> CantoResult<()> {
        let store_key = key.store_key();
        let mut conn = self.conn("DEL", &store_key).await?;
        let _removed: u64 = conn
            .del(&store_key)
            .await
            .map_err(|e| StoreError::unavailable("DEL", &store_key, e))?;
        Ok(())
    }

    async fn increment_word(&self, key: &HistogramKey, word: &str) -> CantoResult<u64> {
        let store_key = key.store_key();
        let mut conn = self.conn("HINCRBY", &store_key).await?;
        let count: i64 = conn
            .hincr(&store_key, word, 1i64)
            .await
            .map_err(|e| StoreError::unavailable("HINCRBY", &store_key, e))?;
        u64::try_from(count).map_err(|_| {
            StoreError::Corrupt {
                key: store_key,
                field: word.to_string(),
                reason: format!("negative count {}", count),
            }
            .into()
        })
    }

    async fn read_all(&self, key: &HistogramKey) -> CantoResult<Histogram> {
        let store_key = key.store_key();
        let mut conn = self.conn("HGETALL", &store_key).await?;
        let raw: HashMap<String, String> = conn
            .hgetall(&store_key)
            .await
            .map_err(|e| StoreError::unavailable("HGETALL", &store_key, e))?;
        parse_hash(&store_key, raw)
    }

    async fn ping(&self) -> CantoResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
        tracing::info!("Redis histogram store closed");
    }
}

/// Convert raw `HGETALL` output into a histogram.
fn parse_hash(store_key: &str, raw: HashMap<String, String>) -> CantoResult<Histogram> {
    let mut histogram = Histogram::new();
    for (word, value) in raw {
        let count = value.parse::<u64>().map_err(|e| StoreError::Corrupt {
            key: store_key.to_string(),
            field: word.clone(),
            reason: format!("{:?} is not a count: {}", value, e),
        })?;
        histogram.insert(word, count);
    }
    Ok(histogram)
}

/// Strip credentials from a Redis URL before logging it.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
