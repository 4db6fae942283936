//! Error types for the memoization engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::expiration::ExpirationKind;

/// Boxed error accepted from user-supplied evaluators and signals.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Memo Error Enum ==
/// Unified error type for cache bookkeeping.
///
/// None of these reach the caller of a wrapped function. They are logged and
/// the affected entry is kept without expiry.
#[derive(Error, Debug)]
pub enum MemoError {
    /// The expiration evaluator itself failed
    #[error("{kind} expiration evaluator failed: {source}")]
    Evaluator {
        kind: ExpirationKind,
        #[source]
        source: BoxError,
    },

    /// The invalidation signal settled with an error
    #[error("invalidation signal rejected: {0}")]
    SignalRejected(#[source] BoxError),

    /// No tokio runtime on the current thread to host a watcher
    #[error("no tokio runtime available to arm {0} expiration")]
    NoRuntime(ExpirationKind),

    /// Unknown expiration type tag
    #[error("invalid expiration kind: {0}")]
    InvalidKind(String),
}

// == Result Type Alias ==
/// Convenience Result type for the memoization engine.
pub type Result<T> = std::result::Result<T, MemoError>;
