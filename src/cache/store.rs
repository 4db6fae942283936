//! Memoization Cache Module
//!
//! Maps cache keys to memoized results and owns each entry's expiration
//! watcher.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheKey, CacheStats};
use crate::expiration::{self, CacheExpiration};

#[derive(Debug)]
struct CacheState<V> {
    /// Live entries
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Memoization statistics
    stats: CacheStats,
    /// Last generation handed out
    generation: u64,
}

// == Memo Cache ==
/// Key to result mapping owned by one wrapped callable.
///
/// The lock is never held while user code runs, so a miss for one key can
/// call back into the same cache for another key.
#[derive(Debug)]
pub struct MemoCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
}

impl<V> Default for MemoCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoCache<V> {
    // == Constructor ==
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                stats: CacheStats::new(),
                generation: 0,
            })),
        }
    }

    // == Lookup ==
    /// Returns the stored value for `key`, or None on a miss.
    ///
    /// A hit leaves the entry's watcher untouched; expiration stays relative
    /// to creation, not to last access.
    pub fn lookup(&self, key: &CacheKey) -> Option<V>
    where
        V: Clone,
    {
        let mut state = self.state.lock();
        match state.entries.get(key).map(|entry| entry.value.clone()) {
            Some(value) => {
                state.stats.record_hit();
                trace!(key = %key, "memo hit");
                Some(value)
            }
            None => {
                state.stats.record_miss();
                debug!(key = %key, "memo miss");
                None
            }
        }
    }

    // == Store ==
    /// Inserts a new entry for `key`, replacing any stale one, and arms its
    /// expiration watcher.
    ///
    /// The replaced entry's watcher is cancelled. If the watcher cannot be
    /// armed the entry stays cached without expiry.
    pub fn store(
        &self,
        key: CacheKey,
        value: V,
        expiration: Option<&CacheExpiration>,
    ) -> EntryHandle<V>
    where
        V: Send + 'static,
    {
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            if state
                .entries
                .insert(key.clone(), CacheEntry::new(value, generation))
                .is_some()
            {
                debug!(key = %key, "replaced stale entry");
            }
            let count = state.entries.len();
            state.stats.set_total_entries(count);
            generation
        };
        debug!(key = %key, generation, "stored entry");

        let handle = EntryHandle {
            state: Arc::downgrade(&self.state),
            key,
            generation,
        };

        // Evaluated outside the lock: the policy is user code.
        if let Some(expiration) = expiration {
            let expiring = handle.clone();
            match expiration::arm(expiration, &handle.key, move || expiring.expire()) {
                Ok(watcher) => {
                    let mut state = self.state.lock();
                    match state.entries.get_mut(&handle.key) {
                        Some(entry) if entry.generation() == generation => {
                            debug!(
                                key = %handle.key,
                                kind = %watcher.kind(),
                                generation,
                                "watcher attached"
                            );
                            entry.attach_watcher(watcher)
                        }
                        // Already purged or replaced; dropping cancels it.
                        _ => drop(watcher),
                    }
                }
                Err(err) => {
                    warn!(
                        key = %handle.key,
                        kind = %expiration.kind(),
                        error = %err,
                        "entry retained without expiry"
                    );
                }
            }
        }

        handle
    }

    // == Purge ==
    /// Removes the entry for `key` if present. Idempotent.
    pub fn purge(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).is_some();
        if removed {
            let count = state.entries.len();
            state.stats.set_total_entries(count);
            debug!(key = %key, "purged entry");
        }
        removed
    }

    /// Removes every entry, cancelling all watchers.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats.set_total_entries(0);
    }

    /// Records an original-callable failure.
    pub fn record_failure(&self) {
        self.state.lock().stats.record_failure();
    }

    /// Returns true if a live entry exists for `key`. Not counted as a lookup.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Returns when the live entry for `key` was created.
    pub fn created_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.created_at)
    }

    /// Returns true if the live entry for `key` has an armed watcher.
    pub fn is_watched(&self, key: &CacheKey) -> bool {
        self.state
            .lock()
            .entries
            .get(key)
            .map_or(false, CacheEntry::is_watched)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

// == Entry Handle ==
/// Weak reference to one specific stored entry.
///
/// Purging through a handle only removes the generation it was created for,
/// so a late watcher never removes a newer entry stored under the same key.
/// The handle does not keep the cache alive.
#[derive(Debug)]
pub struct EntryHandle<V> {
    state: Weak<Mutex<CacheState<V>>>,
    key: CacheKey,
    generation: u64,
}

impl<V> Clone for EntryHandle<V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            key: self.key.clone(),
            generation: self.generation,
        }
    }
}

impl<V> EntryHandle<V> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Purge ==
    /// Removes this entry if it is still the live one. Idempotent.
    pub fn purge(&self) -> bool {
        self.remove(false)
    }

    /// Purge performed by the entry's own watcher.
    fn expire(&self) {
        self.remove(true);
    }

    fn remove(&self, expired: bool) -> bool {
        let Some(shared) = self.state.upgrade() else {
            return false;
        };
        let mut state = shared.lock();
        let live = matches!(
            state.entries.get(&self.key),
            Some(entry) if entry.generation() == self.generation
        );
        if !live {
            return false;
        }

        if let Some(mut entry) = state.entries.remove(&self.key) {
            if expired {
                // The running watcher is the one purging; don't abort it.
                entry.disarm();
                state.stats.record_expiration();
            }
        }
        let count = state.entries.len();
        state.stats.set_total_entries(count);
        debug!(key = %self.key, generation = self.generation, expired, "purged entry");
        true
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(s: &str) -> CacheKey {
        CacheKey::Structural(s.to_string())
    }

    #[test]
    fn test_cache_new() {
        let cache: MemoCache<u32> = MemoCache::new();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_and_lookup() {
        let cache = MemoCache::new();
        cache.store(key("[1]"), "one".to_string(), None);

        assert_eq!(cache.lookup(&key("[1]")), Some("one".to_string()));
        assert_eq!(cache.lookup(&key("[2]")), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_overwrites_stale_entry() {
        let cache = MemoCache::new();
        let first = cache.store(key("[1]"), 1u32, None);
        let second = cache.store(key("[1]"), 2u32, None);

        assert!(second.generation() > first.generation());
        assert_eq!(cache.lookup(&key("[1]")), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let cache = MemoCache::new();
        cache.store(key("[1]"), 1u32, None);

        assert!(cache.purge(&key("[1]")));
        assert!(!cache.purge(&key("[1]")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_purge_newer_entry() {
        let cache = MemoCache::new();
        let stale = cache.store(key("[1]"), 1u32, None);
        cache.store(key("[1]"), 2u32, None);

        assert!(!stale.purge());
        assert_eq!(cache.lookup(&key("[1]")), Some(2));
    }

    #[test]
    fn test_handle_outliving_cache_is_noop() {
        let cache = MemoCache::new();
        let handle = cache.store(key("[1]"), 1u32, None);
        drop(cache);

        assert!(!handle.purge());
    }

    #[test]
    fn test_stats_track_hits_misses_failures() {
        let cache = MemoCache::new();
        let _ = cache.lookup(&key("[1]"));
        cache.store(key("[1]"), 1u32, None);
        let _ = cache.lookup(&key("[1]"));
        let _ = cache.lookup(&key("[1]"));
        cache.record_failure();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_store_without_runtime_retains_entry() {
        let cache = MemoCache::new();
        let expiration = CacheExpiration::relative_millis(1);
        cache.store(key("[1]"), 1u32, Some(&expiration));

        assert!(!cache.is_watched(&key("[1]")));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.lookup(&key("[1]")), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_evaluator_retains_entry() {
        let cache = MemoCache::new();
        let expiration = CacheExpiration::relative(|| panic!("no delay"));
        cache.store(key("[1]"), 1u32, Some(&expiration));

        assert!(!cache.is_watched(&key("[1]")));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cache.lookup(&key("[1]")), Some(1));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_expiration_logs_carry_kind() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        tracing::subscriber::with_default(subscriber, || {
            let cache = MemoCache::new();
            cache.store(key("[1]"), 1u32, Some(&CacheExpiration::relative_millis(100)));
            let failing = CacheExpiration::try_relative(|| Err::<Duration, _>("no delay"));
            cache.store(key("[2]"), 2u32, Some(&failing));
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let arming = output
            .lines()
            .find(|line| line.contains("arming expiration"))
            .unwrap();
        assert!(arming.contains("kind=relative"));
        let retained = output
            .lines()
            .find(|line| line.contains("entry retained without expiry"))
            .unwrap();
        assert!(retained.contains("kind=relative"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relative_expiration_purges_entry() {
        let cache = MemoCache::new();
        let expiration = CacheExpiration::relative_millis(100);
        cache.store(key("[1]"), 1u32, Some(&expiration));
        assert!(cache.is_watched(&key("[1]")));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.lookup(&key("[1]")), Some(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.lookup(&key("[1]")), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_extend_expiration() {
        let cache = MemoCache::new();
        let expiration = CacheExpiration::relative_millis(100);
        cache.store(key("[1]"), 1u32, Some(&expiration));
        let created = cache.created_at(&key("[1]"));

        for _ in 0..9 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(cache.lookup(&key("[1]")), Some(1));
            assert_eq!(cache.created_at(&key("[1]")), created);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.contains(&key("[1]")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_cancels_previous_timer() {
        let cache = MemoCache::new();
        let short = CacheExpiration::relative_millis(50);
        let long = CacheExpiration::relative_millis(500);

        cache.store(key("[1]"), 1u32, Some(&short));
        cache.store(key("[1]"), 2u32, Some(&long));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.lookup(&key("[1]")), Some(2));
        assert_eq!(cache.stats().expirations, 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.lookup(&key("[1]")), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_watchers() {
        let cache = MemoCache::new();
        let expiration = CacheExpiration::relative_millis(100);
        cache.store(key("[1]"), 1u32, Some(&expiration));
        cache.store(key("[2]"), 2u32, Some(&expiration));

        cache.clear();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 0);
    }
}
