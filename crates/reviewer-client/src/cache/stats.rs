use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache statistics tracker using atomic counters for thread-safe operation.
///
/// Prunes count entries dropped on read for being empty or stale.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of lookups answered from the cache
    pub hits: AtomicUsize,
    /// Number of lookups that found nothing usable
    pub misses: AtomicUsize,
    /// Entries removed by read-time validation
    pub prunes: AtomicUsize,
    /// Successful saves of the backing file
    pub writes: AtomicUsize,
    /// Saves that failed and were swallowed
    pub write_failures: AtomicUsize,
    /// Current number of entries in cache
    pub entry_count: AtomicUsize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_prune(&self) {
        self.prunes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_prunes(&self, count: usize) {
        self.prunes.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_entry_count(&self, count: usize) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            prunes: self.prunes.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            entry_count: self.entry_count.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of cache statistics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: usize,
    pub misses: usize,
    pub prunes: usize,
    pub writes: usize,
    pub write_failures: usize,
    pub entry_count: usize,
}

impl CacheStatsSnapshot {
    /// Calculate the cache hit rate as a percentage (0.0 - 100.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (self.hits as f64 / total as f64) * 100.0
    }

    pub fn total_requests(&self) -> usize {
        self.hits + self.misses
    }
}

/// Statistics for both cache domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedCacheStats {
    pub reviews: CacheStatsSnapshot,
    pub stream_counts: CacheStatsSnapshot,
}
