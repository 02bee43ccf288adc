//! Histogram store backends.
//!
//! [`HistogramStore`] is the seam between the cache orchestrator and the
//! key-value backend. Two implementations ship with the crate:
//!
//! - [`InMemoryHistogramStore`]: process-local, for development and tests
//! - [`RedisHistogramStore`]: Redis hashes over a `deadpool-redis` pool

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_backend;
pub mod traits;

pub use memory::InMemoryHistogramStore;
#[cfg(feature = "redis")]
pub use redis_backend::{RedisHistogramStore, RedisStoreConfig};
pub use traits::HistogramStore;
