//! Canto Storage - Histogram Stores and the Read-Through Cache
//!
//! Defines the [`HistogramStore`] abstraction with in-memory and Redis
//! backends, and the [`HistogramCache`] orchestrator that populates
//! histograms from a [`SourceFetcher`] on a miss.

pub mod cache;
pub mod store;

pub use cache::{
    CacheConfig, CacheRead, CacheState, CacheStats, HistogramCache, KeyGates, PassKind,
    PassObserver, ReadOrigin, RetryPolicy, SourceFetcher,
};
#[cfg(feature = "redis")]
pub use store::{RedisHistogramStore, RedisStoreConfig};
pub use store::{HistogramStore, InMemoryHistogramStore};
