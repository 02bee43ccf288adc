//! Histogram store trait.
//!
//! A histogram store keeps one word → count map per key. Backends must be
//! safe to share across tasks: every method takes `&self` and each increment
//! is an independent atomic operation on the backend.

use async_trait::async_trait;
use canto_core::{CantoResult, Histogram, HistogramKey};

/// Key-value backend holding per-key word histograms.
///
/// # Error Contract
///
/// Backend failures are returned as errors. An absent key is never an error:
/// `exists` returns `false` and `read_all` returns an empty histogram.
#[async_trait]
pub trait HistogramStore: Send + Sync {
    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// True iff a histogram exists for `key`.
    async fn exists(&self, key: &HistogramKey) -> CantoResult<bool>;

    /// Remove the histogram for `key`. No-op when absent.
    async fn delete(&self, key: &HistogramKey) -> CantoResult<()>;

    /// Atomically add one to `word` under `key`, creating the histogram
    /// and the field as needed. Returns the new count.
    async fn increment_word(&self, key: &HistogramKey, word: &str) -> CantoResult<u64>;

    /// Full histogram for `key`, empty when absent.
    async fn read_all(&self, key: &HistogramKey) -> CantoResult<Histogram>;

    /// Round-trip to the backend.
    async fn ping(&self) -> CantoResult<()>;

    /// Release backend connections. Further calls fail.
    async fn close(&self);
}
