//! Function Wrapper
//!
//! Wraps a callable so repeated calls with equal arguments are answered
//! from its private cache.

use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::{CacheStats, EntryHandle, KeyCodec};
use crate::memoize::engine::Engine;
use crate::memoize::MemoizeOptions;

/// Cloneable in-flight result of a memoized async function.
pub type SharedFuture<T> = Shared<BoxFuture<'static, T>>;

type Original<A, T, E> = dyn Fn(A) -> Result<T, E> + Send + Sync;

// == Memoized ==
/// A memoized callable.
///
/// `A` is the argument tuple, `T` the cached value and `E` the error type of
/// a fallible original. Clones are handles onto the same cache; separately
/// constructed wrappers never share state.
pub struct Memoized<A, T, E = Infallible> {
    original: Arc<Original<A, T, E>>,
    engine: Arc<Engine<A, T>>,
}

impl<A, T, E> Clone for Memoized<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            original: self.original.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<A, T> Memoized<A, T, Infallible>
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
{
    // == Constructors ==
    /// Memoizes an infallible function, entries never expire.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        Self::with_options(f, MemoizeOptions::default())
    }

    /// Memoizes an infallible function with the given options.
    pub fn with_options<F>(f: F, options: MemoizeOptions) -> Self
    where
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        Self::try_with_options(move |args| Ok(f(args)), options)
    }

    // == Call ==
    /// Calls through the cache.
    pub fn call(&self, args: A) -> T {
        match self.try_call(args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<A, T, E> Memoized<A, T, E>
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
{
    /// Memoizes a fallible function. Errors are returned to the caller and
    /// never cached.
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::try_with_options(f, MemoizeOptions::default())
    }

    /// Memoizes a fallible function with the given options.
    pub fn try_with_options<F>(f: F, options: MemoizeOptions) -> Self
    where
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            original: Arc::new(f),
            engine: Arc::new(Engine::new(options)),
        }
    }
}

impl<A, T> Memoized<A, SharedFuture<T>, Infallible>
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Memoizes an async function.
    ///
    /// The returned future is stored before the call returns, so concurrent
    /// callers await the same in-flight computation.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::async_with_options(f, MemoizeOptions::default())
    }

    pub fn async_with_options<F, Fut>(f: F, options: MemoizeOptions) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::with_options(move |args| f(args).boxed().shared(), options)
    }
}

impl<A, T, E> Memoized<A, SharedFuture<Result<T, E>>, Infallible>
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Memoizes a fallible async function.
    ///
    /// The in-flight future is shared like [`Memoized::new_async`]; once it
    /// settles with `Err` the entry is purged so the next call retries.
    pub fn try_new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::try_async_with_options(f, MemoizeOptions::default())
    }

    pub fn try_async_with_options<F, Fut>(f: F, options: MemoizeOptions) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let wrapper = Self::async_with_options(f, options);
        let engine = Arc::try_unwrap(wrapper.engine)
            .unwrap_or_else(|shared| shared.fork())
            .with_store_hook(Arc::new(purge_on_rejection::<T, E>));
        Self {
            original: wrapper.original,
            engine: Arc::new(engine),
        }
    }
}

/// Watches a stored shared future and purges its entry if it rejects.
fn purge_on_rejection<T, E>(
    value: &SharedFuture<Result<T, E>>,
    handle: EntryHandle<SharedFuture<Result<T, E>>>,
) where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let Ok(runtime) = Handle::try_current() else {
        debug!(key = %handle.key(), "no runtime, rejection will stay cached");
        return;
    };
    let settled = value.clone();
    runtime.spawn(async move {
        if settled.await.is_err() && handle.purge() {
            debug!(key = %handle.key(), "async original rejected, entry purged");
        }
    });
}

impl<A, T, E> Memoized<A, T, E>
where
    T: Clone + Send + 'static,
{
    /// Calls through the cache, returning the original's error unchanged.
    pub fn try_call(&self, args: A) -> Result<T, E> {
        self.engine.get_or_compute(args, |args| (self.original)(args))
    }

    /// Replaces the key codec. Only affects calls made afterwards.
    pub fn with_key_codec<C>(self, codec: C) -> Self
    where
        C: KeyCodec<A> + 'static,
    {
        let engine = Arc::try_unwrap(self.engine).unwrap_or_else(|shared| shared.fork());
        Self {
            original: self.original,
            engine: Arc::new(engine.with_codec(Arc::new(codec))),
        }
    }

    // == Maintenance ==
    /// Purges the entry for `args`. Returns true if one was removed.
    pub fn invalidate(&self, args: &A) -> bool {
        self.engine.invalidate(args)
    }

    pub fn clear(&self) {
        self.engine.clear();
    }

    pub fn contains(&self, args: &A) -> bool {
        self.engine.contains(args)
    }

    /// Returns when the live entry for `args` was created.
    pub fn created_at(&self, args: &A) -> Option<DateTime<Utc>> {
        self.engine.created_at(args)
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }

    pub fn options(&self) -> &MemoizeOptions {
        self.engine.options()
    }
}

impl<A, T, E> Debug for Memoized<A, T, E>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("entries", &self.len())
            .field("expiration", &self.options().expiration_kind())
            .finish()
    }
}
