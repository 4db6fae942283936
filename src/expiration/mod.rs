//! Expiration Module
//!
//! Per-entry expiration strategies and the watcher tasks that enforce them.
//!
//! # Policies
//! - Relative: purge after a delay sampled when the entry is created
//! - Promise resolution: purge when an external awaitable resolves

mod policy;
mod watcher;

pub use policy::{CacheExpiration, ExpirationKind};
pub use watcher::{arm, Watcher};
