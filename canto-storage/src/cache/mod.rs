//! Read-through word-count cache.
//!
//! [`HistogramCache`] ties a [`HistogramStore`](crate::store::HistogramStore)
//! to a [`SourceFetcher`]: reads check the store, populate from the source on
//! a miss, and serve the stored histogram on a hit. Writes replace a key's
//! histogram from caller-supplied text.
//!
//! # Per-key Gates
//!
//! Each key has its own reader/writer gate ([`KeyGates`]). Populate and ingest
//! passes hold it exclusively, so concurrent first reads of one key run a
//! single fetch-and-count pass and readers never see a half-written
//! histogram. Unrelated keys never wait on each other. A pass whose caller
//! goes away is rolled back before the key is released.
//!
//! # Example
//!
//! ```ignore
//! let cache = HistogramCache::new(store, fetcher, CacheConfig::default());
//! cache.set_text(&key, "a a b", &ctx).await?;
//!
//! let read = cache.get_histogram(&key, &ctx).await?;
//! assert_eq!(read.value().get("a"), 2);
//! ```

pub mod fetcher;
pub mod gate;
pub mod read;
pub mod read_through;
pub mod retry;
pub mod stats;

pub use fetcher::SourceFetcher;
pub use gate::KeyGates;
pub use read::{CacheRead, ReadOrigin};
pub use read_through::{CacheConfig, CacheState, HistogramCache};
pub use retry::RetryPolicy;
pub use stats::{CacheStats, PassKind, PassObserver};
