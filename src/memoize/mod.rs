//! Memoize Module
//!
//! The function wrapper, the method adapter and the options they share.

mod engine;
mod function;
mod method;
mod options;

use std::fmt::Debug;

use serde::Serialize;

pub use function::{Memoized, SharedFuture};
pub use method::MemoizedMethod;
pub use options::MemoizeOptions;

// == Wrap ==
/// Wraps `f` in a memoizing callable with the same signature.
///
/// Every clone of the returned closure shares one cache.
pub fn wrap<A, T, F>(f: F, options: MemoizeOptions) -> impl Fn(A) -> T + Clone + Send + Sync
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
    F: Fn(A) -> T + Send + Sync + 'static,
{
    let memoized = Memoized::with_options(f, options);
    move |args| memoized.call(args)
}

/// [`wrap`] with default options: entries never expire.
pub fn memoize<A, T, F>(f: F) -> impl Fn(A) -> T + Clone + Send + Sync
where
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
    F: Fn(A) -> T + Send + Sync + 'static,
{
    wrap(f, MemoizeOptions::default())
}
