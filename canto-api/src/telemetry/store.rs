//! Store wrapper recording operation latency.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use canto_core::{CantoResult, Histogram, HistogramKey};
use canto_storage::HistogramStore;

use super::metrics::metrics;

/// Wraps a [`HistogramStore`] and records every call in
/// `canto_store_operation_duration_seconds`.
pub struct InstrumentedStore {
    inner: Arc<dyn HistogramStore>,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<dyn HistogramStore>) -> Self {
        Self { inner }
    }

    fn observe<T>(operation: &'static str, started: Instant, result: &CantoResult<T>) {
        if let Some(metrics) = metrics() {
            metrics.record_store_operation(
                operation,
                result.is_ok(),
                started.elapsed().as_secs_f64(),
            );
        }
    }
}

#[async_trait]
impl HistogramStore for InstrumentedStore {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn exists(&self, key: &HistogramKey) -> CantoResult<bool> {
        let started = Instant::now();
        let result = self.inner.exists(key).await;
        Self::observe("EXISTS", started, &result);
        result
    }

    async fn delete(&self, key: &HistogramKey) -> CantoResult<()> {
        let started = Instant::now();
        let result = self.inner.delete(key).await;
        Self::observe("DEL", started, &result);
        result
    }

    async fn increment_word(&self, key: &HistogramKey, word: &str) -> CantoResult<u64> {
        let started = Instant::now();
        let result = self.inner.increment_word(key, word).await;
        Self::observe("HINCRBY", started, &result);
        result
    }

    async fn read_all(&self, key: &HistogramKey) -> CantoResult<Histogram> {
        let started = Instant::now();
        let result = self.inner.read_all(key).await;
        Self::observe("HGETALL", started, &result);
        result
    }

    async fn ping(&self) -> CantoResult<()> {
        let started = Instant::now();
        let result = self.inner.ping().await;
        Self::observe("PING", started, &result);
        result
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
