//! Read-through word-count cache.
//!
//! This module implements the core caching logic: check the store, fetch and
//! count on a miss, and serve the stored histogram on a hit. The ingestion
//! path replaces a key's histogram from caller-supplied text.
//!
//! # State Machine
//!
//! ```text
//!             read, !exists                    increments done
//! Missing ──────────────────→ Populating ─────────────────────→ Ready
//!    ↑                            │                               │
//!    └─ fetch/pass failed, ───────┘          set_text ────────────┘
//!       timed out or cancelled             (delete, Populating)
//! ```
//!
//! State is not persisted. `Ready` and `Missing` are inferred from the store
//! and `Populating` from the key's gate, see [`HistogramCache::state`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use canto_core::{
    tokenize, CantoError, CantoResult, Histogram, HistogramKey, RequestContext,
};
use tracing::Instrument;

use super::fetcher::SourceFetcher;
use super::gate::{ExclusivePermit, KeyGates};
use super::read::CacheRead;
use super::retry::RetryPolicy;
use super::stats::{CacheStats, PassKind, PassObserver, StatsCounters};
use crate::store::HistogramStore;

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on one populate or ingest pass, fetch included.
    pub populate_timeout: Duration,
    /// Retry policy for idempotent store calls and upstream fetches.
    pub retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            populate_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the populate timeout.
    pub fn with_populate_timeout(mut self, timeout: Duration) -> Self {
        self.populate_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Cache state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No histogram stored.
    Missing,
    /// A populate or ingest pass holds the key.
    Populating,
    /// A histogram is stored and readable.
    Ready,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Missing => "missing",
            CacheState::Populating => "populating",
            CacheState::Ready => "ready",
        }
    }
}

/// Read-through histogram cache.
///
/// # Type Parameters
///
/// - `S`: the histogram store
/// - `F`: the source fetcher used on a miss
///
/// Both may be trait objects, e.g.
/// `HistogramCache<dyn HistogramStore, dyn SourceFetcher>`.
///
/// # Example
///
/// ```ignore
/// let cache = HistogramCache::new(store, fetcher, CacheConfig::default());
///
/// let read = cache.get_histogram(&key, &RequestContext::new()).await?;
/// if !read.was_cache_hit() {
///     tracing::info!("populated from source");
/// }
/// ```
pub struct HistogramCache<S, F>
where
    S: HistogramStore + ?Sized,
    F: SourceFetcher + ?Sized,
{
    store: Arc<S>,
    fetcher: Arc<F>,
    gates: KeyGates,
    config: CacheConfig,
    stats: StatsCounters,
    observer: Option<Arc<dyn PassObserver>>,
}

impl<S, F> HistogramCache<S, F>
where
    S: HistogramStore + ?Sized + 'static,
    F: SourceFetcher + ?Sized,
{
    /// Create a new read-through cache.
    pub fn new(store: Arc<S>, fetcher: Arc<F>, config: CacheConfig) -> Self {
        Self {
            store,
            fetcher,
            gates: KeyGates::new(),
            config,
            stats: StatsCounters::default(),
            observer: None,
        }
    }

    /// Create a new read-through cache with default configuration.
    pub fn with_defaults(store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self::new(store, fetcher, CacheConfig::default())
    }

    /// Report the outcome of every settled pass to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PassObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the histogram store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of hit/miss and pass counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of keys with a request holding or waiting on their gate.
    pub fn active_keys(&self) -> usize {
        self.gates.active_keys()
    }

    /// Return the histogram for `key`, populating it from the source on a
    /// miss.
    ///
    /// Concurrent callers missing on the same key run a single pass: the
    /// first takes the key's exclusive gate, the rest wait and then read the
    /// populated histogram. Those waiters count as hits.
    ///
    /// # Errors
    ///
    /// Store failures and fetch failures are returned as-is. A failed fetch
    /// leaves the key `Missing`; it is never reported as an empty histogram.
    #[tracing::instrument(
        name = "cache.get_histogram",
        skip(self, ctx),
        fields(key = %key, request_id = ctx.request_id())
    )]
    pub async fn get_histogram(
        &self,
        key: &HistogramKey,
        ctx: &RequestContext,
    ) -> CantoResult<CacheRead<Histogram>> {
        let store_key = key.store_key();

        {
            let _shared = self.gates.shared(&store_key).await;
            if self.exists(key).await? {
                let histogram = self.read_all(key).await?;
                StatsCounters::bump(&self.stats.hits);
                tracing::debug!(state = CacheState::Ready.as_str(), words = histogram.len(), "Cache hit");
                return Ok(CacheRead::from_cache(histogram));
            }
        }

        let permit = self.gates.exclusive(&store_key).await;

        // Another caller may have finished a pass while we waited.
        if self.exists(key).await? {
            let histogram = self.read_all(key).await?;
            StatsCounters::bump(&self.stats.hits);
            tracing::debug!(state = CacheState::Ready.as_str(), "Populated by a concurrent caller");
            return Ok(CacheRead::from_cache(histogram));
        }

        StatsCounters::bump(&self.stats.misses);
        let pass = PassGuard::start(&self.store, key, &self.config.retry, permit);
        tracing::debug!(state = CacheState::Populating.as_str(), "Cache miss, populating from source");

        let started = Instant::now();
        let mut issued = 0usize;
        let outcome = tokio::time::timeout(
            self.config.populate_timeout,
            self.populate(key, ctx, &mut issued),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CantoError::Timeout {
                key: store_key.clone(),
                elapsed: started.elapsed(),
            })
        });

        match outcome {
            Ok(histogram) => {
                pass.settle();
                StatsCounters::bump(&self.stats.populations);
                self.notify(PassKind::Populate, true);
                tracing::info!(
                    state = CacheState::Ready.as_str(),
                    tokens = issued,
                    words = histogram.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Populated histogram"
                );
                Ok(CacheRead::from_source(histogram))
            }
            Err(err) => {
                self.abort_pass(key, issued, &err).await;
                pass.settle();
                self.notify(PassKind::Populate, false);
                Err(err)
            }
        }
    }

    /// Replace the histogram for `key` with counts from `text`.
    ///
    /// Overwrites rather than merges. Returns the number of tokens counted.
    #[tracing::instrument(
        name = "cache.set_text",
        skip(self, text, ctx),
        fields(key = %key, request_id = ctx.request_id())
    )]
    pub async fn set_text(
        &self,
        key: &HistogramKey,
        text: &str,
        ctx: &RequestContext,
    ) -> CantoResult<usize> {
        let store_key = key.store_key();
        let permit = self.gates.exclusive(&store_key).await;
        let pass = PassGuard::start(&self.store, key, &self.config.retry, permit);

        let started = Instant::now();
        let mut issued = 0usize;
        let outcome = tokio::time::timeout(
            self.config.populate_timeout,
            self.ingest(key, text, &mut issued),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CantoError::Timeout {
                key: store_key.clone(),
                elapsed: started.elapsed(),
            })
        });

        match outcome {
            Ok(_) => {
                pass.settle();
                StatsCounters::bump(&self.stats.ingestions);
                self.notify(PassKind::Ingest, true);
                tracing::info!(tokens = issued, "Replaced histogram from request text");
                Ok(issued)
            }
            Err(err) => {
                // The old histogram is already gone, so always roll back.
                self.abort_pass(key, issued.max(1), &err).await;
                pass.settle();
                self.notify(PassKind::Ingest, false);
                Err(err)
            }
        }
    }

    /// Current state of `key`.
    pub async fn state(&self, key: &HistogramKey) -> CantoResult<CacheState> {
        if self.gates.is_populating(&key.store_key()) {
            return Ok(CacheState::Populating);
        }
        if self.exists(key).await? {
            Ok(CacheState::Ready)
        } else {
            Ok(CacheState::Missing)
        }
    }

    // ------------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------------

    async fn populate(
        &self,
        key: &HistogramKey,
        ctx: &RequestContext,
        issued: &mut usize,
    ) -> CantoResult<Histogram> {
        let text = self
            .config
            .retry
            .run("fetch_text", || self.fetcher.fetch_text(key, ctx))
            .await
            .inspect_err(|err| {
                StatsCounters::bump(&self.stats.upstream_failures);
                tracing::warn!(error = %err, "Source fetch failed, key stays missing");
            })?;
        self.count_into_store(key, &text, issued).await
    }

    async fn ingest(
        &self,
        key: &HistogramKey,
        text: &str,
        issued: &mut usize,
    ) -> CantoResult<Histogram> {
        self.delete(key).await?;
        self.count_into_store(key, text, issued).await
    }

    /// Issue one increment per token, in order, then read the result back.
    async fn count_into_store(
        &self,
        key: &HistogramKey,
        text: &str,
        issued: &mut usize,
    ) -> CantoResult<Histogram> {
        let tokens = tokenize(text);
        for (position, word) in tokens.iter().enumerate() {
            self.store
                .increment_word(key, word)
                .await
                .inspect_err(|err| self.record_store_failure("HINCRBY", err))?;
            *issued += 1;
            tracing::trace!(position, word, "Incremented");
        }

        let histogram = self.read_all(key).await?;
        if histogram.total() != tokens.len() as u64 {
            tracing::warn!(
                tokens = tokens.len(),
                stored = histogram.total(),
                "Stored histogram total differs from token count"
            );
        }
        Ok(histogram)
    }

    /// Roll a failed pass back to `Missing` if it touched the store.
    async fn abort_pass(&self, key: &HistogramKey, issued: usize, err: &CantoError) {
        StatsCounters::bump(&self.stats.failed_passes);
        if issued == 0 {
            tracing::debug!(state = CacheState::Missing.as_str(), error = %err, "Pass aborted before writing");
            return;
        }
        match self.delete(key).await {
            Ok(()) => tracing::warn!(
                state = CacheState::Missing.as_str(),
                issued,
                error = %err,
                "Pass failed, partial histogram removed"
            ),
            Err(cleanup) => tracing::error!(
                issued,
                error = %err,
                cleanup_error = %cleanup,
                "Pass failed and partial histogram could not be removed"
            ),
        }
    }

    fn notify(&self, kind: PassKind, success: bool) {
        if let Some(observer) = &self.observer {
            observer.pass_finished(kind, success);
        }
    }

    // ------------------------------------------------------------------------
    // Store calls
    // ------------------------------------------------------------------------

    async fn exists(&self, key: &HistogramKey) -> CantoResult<bool> {
        self.config
            .retry
            .run("EXISTS", || self.store.exists(key))
            .await
            .inspect_err(|err| self.record_store_failure("EXISTS", err))
    }

    async fn read_all(&self, key: &HistogramKey) -> CantoResult<Histogram> {
        self.config
            .retry
            .run("HGETALL", || self.store.read_all(key))
            .await
            .inspect_err(|err| self.record_store_failure("HGETALL", err))
    }

    async fn delete(&self, key: &HistogramKey) -> CantoResult<()> {
        self.config
            .retry
            .run("DEL", || self.store.delete(key))
            .await
            .inspect_err(|err| self.record_store_failure("DEL", err))
    }

    fn record_store_failure(&self, operation: &'static str, err: &CantoError) {
        StatsCounters::bump(&self.stats.store_failures);
        tracing::error!(
            operation,
            backend = self.store.backend_name(),
            error = %err,
            "Histogram store operation failed"
        );
    }
}

/// Exclusive hold on a key for the length of one pass.
///
/// If the pass future is dropped before [`PassGuard::settle`], the guard
/// spawns a task that deletes the key and only then releases the permit,
/// so no reader sees what the pass had written.
struct PassGuard<S: HistogramStore + ?Sized + 'static> {
    store: Arc<S>,
    key: HistogramKey,
    retry: RetryPolicy,
    permit: Option<ExclusivePermit>,
}

impl<S: HistogramStore + ?Sized + 'static> PassGuard<S> {
    fn start(
        store: &Arc<S>,
        key: &HistogramKey,
        retry: &RetryPolicy,
        mut permit: ExclusivePermit,
    ) -> Self {
        permit.mark_populating();
        Self {
            store: Arc::clone(store),
            key: key.clone(),
            retry: retry.clone(),
            permit: Some(permit),
        }
    }

    /// The pass ran to an outcome; release the key.
    fn settle(mut self) {
        self.permit.take();
    }
}

impl<S: HistogramStore + ?Sized + 'static> Drop for PassGuard<S> {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };

        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let retry = self.retry.clone();
        let rollback = async move {
            match retry.run("DEL", || store.delete(&key)).await {
                Ok(()) => tracing::warn!(
                    state = CacheState::Missing.as_str(),
                    "Pass cancelled, partial histogram removed"
                ),
                Err(err) => tracing::error!(
                    error = %err,
                    "Pass cancelled and partial histogram could not be removed"
                ),
            }
            drop(permit);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(rollback.in_current_span());
            }
            Err(_) => tracing::error!(
                key = %self.key,
                "Pass cancelled outside a runtime, partial histogram may remain"
            ),
        }
    }
}
