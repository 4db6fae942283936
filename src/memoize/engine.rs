//! Hit/miss path shared by the function wrapper and the method adapter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{CacheStats, EntryHandle, JsonKeyCodec, KeyCodec, MemoCache};
use crate::memoize::MemoizeOptions;

/// Called right after a miss stores its value.
pub(crate) type StoreHook<T> = Arc<dyn Fn(&T, EntryHandle<T>) + Send + Sync>;

pub(crate) struct Engine<A, T> {
    cache: MemoCache<T>,
    codec: Arc<dyn KeyCodec<A>>,
    options: MemoizeOptions,
    on_store: Option<StoreHook<T>>,
}

impl<A, T> Engine<A, T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(options: MemoizeOptions) -> Self
    where
        A: serde::Serialize + std::fmt::Debug,
    {
        Self {
            cache: MemoCache::new(),
            codec: Arc::new(JsonKeyCodec),
            options,
            on_store: None,
        }
    }

    pub(crate) fn with_codec(mut self, codec: Arc<dyn KeyCodec<A>>) -> Self {
        self.codec = codec;
        self
    }

    pub(crate) fn with_store_hook(mut self, hook: StoreHook<T>) -> Self {
        self.on_store = Some(hook);
        self
    }

    /// Same codec, options and hook over a new empty cache.
    pub(crate) fn fork(&self) -> Self {
        Self {
            cache: MemoCache::new(),
            codec: self.codec.clone(),
            options: self.options.clone(),
            on_store: self.on_store.clone(),
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `args`, or runs `compute` and stores
    /// its `Ok` result. An `Err` is returned untouched and not stored.
    pub(crate) fn get_or_compute<E, F>(&self, args: A, compute: F) -> Result<T, E>
    where
        F: FnOnce(A) -> Result<T, E>,
    {
        let key = self.codec.derive_key(&args);
        if let Some(value) = self.cache.lookup(&key) {
            return Ok(value);
        }

        let value = match compute(args) {
            Ok(value) => value,
            Err(err) => {
                self.cache.record_failure();
                debug!(key = %key, "original call failed, nothing cached");
                return Err(err);
            }
        };

        let handle = self
            .cache
            .store(key, value.clone(), self.options.cache_expiration.as_ref());
        if let Some(hook) = &self.on_store {
            hook(&value, handle);
        }
        Ok(value)
    }

    pub(crate) fn invalidate(&self, args: &A) -> bool {
        self.cache.purge(&self.codec.derive_key(args))
    }

    pub(crate) fn contains(&self, args: &A) -> bool {
        self.cache.contains(&self.codec.derive_key(args))
    }

    pub(crate) fn created_at(&self, args: &A) -> Option<DateTime<Utc>> {
        self.cache.created_at(&self.codec.derive_key(args))
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub(crate) fn options(&self) -> &MemoizeOptions {
        &self.options
    }
}
