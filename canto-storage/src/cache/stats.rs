//! Cache counters and pass outcome hooks.

use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Fetch-and-count after a miss.
    Populate,
    /// Replace from caller-supplied text.
    Ingest,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Populate => "populate",
            PassKind::Ingest => "ingest",
        }
    }
}

/// Receives the outcome of every populate and ingest pass that settles.
pub trait PassObserver: Send + Sync {
    fn pass_finished(&self, kind: PassKind, success: bool);
}

/// Snapshot of cache activity since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from an existing histogram, including callers that
    /// waited on a concurrent pass.
    pub hits: u64,
    /// Reads that ran a populate pass.
    pub misses: u64,
    /// Populate passes that completed.
    pub populations: u64,
    /// Ingest passes that completed.
    pub ingestions: u64,
    /// Populate and ingest passes that failed or timed out.
    pub failed_passes: u64,
    /// Fetches that failed upstream.
    pub upstream_failures: u64,
    /// Operations that failed in the store.
    pub store_failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub populations: AtomicU64,
    pub ingestions: AtomicU64,
    pub failed_passes: AtomicU64,
    pub upstream_failures: AtomicU64,
    pub store_failures: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            populations: self.populations.load(Ordering::Relaxed),
            ingestions: self.ingestions.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_snapshot() {
        let counters = StatsCounters::default();
        StatsCounters::bump(&counters.hits);
        StatsCounters::bump(&counters.hits);
        StatsCounters::bump(&counters.misses);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.populations, 0);
        assert_eq!(snapshot.failed_passes, 0);
    }

    #[test]
    fn test_pass_kind_labels() {
        assert_eq!(PassKind::Populate.as_str(), "populate");
        assert_eq!(PassKind::Ingest.as_str(), "ingest");
    }
}
