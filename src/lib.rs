//! Memo Cache - function-result memoization with pluggable expiration
//!
//! Wraps functions and methods so repeated calls with equal arguments are
//! answered from a private cache. Entries can expire after a delay or when an
//! external signal resolves.

pub mod cache;
pub mod config;
pub mod error;
pub mod expiration;
pub mod memoize;

pub use cache::{CacheKey, CacheStats, JsonKeyCodec, KeyCodec};
pub use config::Config;
pub use error::{BoxError, MemoError};
pub use expiration::{CacheExpiration, ExpirationKind};
pub use memoize::{memoize, wrap, MemoizeOptions, Memoized, MemoizedMethod, SharedFuture};
