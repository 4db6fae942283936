//! Cache Module
//!
//! Provides the memoization cache: key derivation, entry lifecycle and
//! statistics.

mod entry;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use key::{CacheKey, JsonKeyCodec, KeyCodec};
pub use stats::CacheStats;
pub use store::{EntryHandle, MemoCache};
