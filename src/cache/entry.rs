//! Cache Entry Module
//!
//! Defines a memoized result together with the watcher that will purge it.

use chrono::{DateTime, Utc};

use crate::expiration::Watcher;

// == Cache Entry ==
/// A stored result, its generation and its armed expiration watcher.
///
/// Dropping an entry cancels its watcher.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The memoized result
    pub value: V,
    /// When the entry was created; hits never move this
    pub created_at: DateTime<Utc>,
    /// Distinguishes this entry from earlier ones stored under the same key
    generation: u64,
    /// Armed expiration watcher, None = never expires on its own
    watcher: Option<Watcher>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry with no watcher attached.
    pub fn new(value: V, generation: u64) -> Self {
        Self {
            value,
            created_at: Utc::now(),
            generation,
            watcher: None,
        }
    }

    /// Returns the generation this entry was stored with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if an expiration watcher is attached.
    pub fn is_watched(&self) -> bool {
        self.watcher.is_some()
    }

    // == Attach Watcher ==
    /// Attaches the watcher armed for this entry, cancelling any previous one.
    pub fn attach_watcher(&mut self, watcher: Watcher) {
        self.watcher = Some(watcher);
    }

    // == Disarm ==
    /// Detaches the watcher without cancelling it.
    ///
    /// Used when the watcher itself is purging the entry.
    pub fn disarm(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.detach();
        }
    }

    // == Age ==
    /// Returns how long ago the entry was created, in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.created_at).num_milliseconds().max(0)
    }
}
