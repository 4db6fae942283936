//! Cache Statistics Module
//!
//! Tracks memoization metrics: hits, misses, expirations and failed calls.

use serde::Serialize;

// == Cache Stats ==
/// Tracks memoization metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls that found no live entry
    pub misses: u64,
    /// Entries purged by an expiration watcher
    pub expirations: u64,
    /// Misses whose original call failed (never cached)
    pub failures: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Records a call answered from the cache.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Records a call that found no live entry.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Expiration ==
    /// Records a purge performed by an expiration watcher.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Record Failure ==
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    // == Total Entries ==
    /// Updates the current entry count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
