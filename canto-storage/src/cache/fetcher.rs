//! Source fetcher trait.

use async_trait::async_trait;
use canto_core::{CantoResult, HistogramKey, RequestContext};

/// Retrieves the canonical text for a key from the upstream document store.
///
/// This trait abstracts over the actual upstream, allowing the cache to work
/// against HTTP services in production and fixtures in tests.
///
/// Implementations map the key's segments onto the upstream's own identifying
/// fields and must keep `UpstreamError::NotFound` distinct from
/// `UpstreamError::Unavailable`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the text to count for `key`.
    async fn fetch_text(&self, key: &HistogramKey, ctx: &RequestContext) -> CantoResult<String>;
}
