//! Expiration Policy Module
//!
//! Strategies deciding when a freshly stored entry gets purged.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::{BoxError, MemoError, Result};

type DelayFn = dyn Fn() -> std::result::Result<Duration, BoxError> + Send + Sync;
type SignalFn = dyn Fn() -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync;

// == Expiration Kind ==
/// Type tag of an expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirationKind {
    /// Timer measured from entry creation
    Relative,
    /// Purge when an external awaitable settles
    PromiseResolution,
}

impl ExpirationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationKind::Relative => "relative",
            ExpirationKind::PromiseResolution => "promise-resolution",
        }
    }
}

impl fmt::Display for ExpirationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpirationKind {
    type Err = MemoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(ExpirationKind::Relative),
            "promise-resolution" | "promise_resolution" => Ok(ExpirationKind::PromiseResolution),
            other => Err(MemoError::InvalidKind(other.to_string())),
        }
    }
}

// == Trigger ==
/// What a single evaluation produced for one entry.
pub(crate) enum Trigger {
    /// Purge after this delay
    After(Duration),
    /// Purge once this signal resolves `Ok`
    Signal(BoxFuture<'static, std::result::Result<(), BoxError>>),
}

// == Cache Expiration ==
/// Expiration policy for a memoized callable.
///
/// The evaluator runs once per created entry, so every entry gets its own
/// delay or its own signal.
#[derive(Clone)]
pub enum CacheExpiration {
    /// Evaluates to a delay; the entry is purged when it elapses
    Relative(Arc<DelayFn>),
    /// Evaluates to a fresh awaitable; the entry is purged when it resolves
    PromiseResolution(Arc<SignalFn>),
}

impl CacheExpiration {
    // == Constructors ==
    /// Timer-based expiration with a delay sampled per entry.
    pub fn relative<F>(evaluate: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        CacheExpiration::Relative(Arc::new(move || Ok::<_, BoxError>(evaluate())))
    }

    /// Timer-based expiration with a fixed delay in milliseconds.
    pub fn relative_millis(delay_ms: u64) -> Self {
        Self::relative(move || Duration::from_millis(delay_ms))
    }

    /// Timer-based expiration whose evaluator may fail.
    ///
    /// A failed evaluation leaves the entry cached without expiry.
    pub fn try_relative<F, E>(evaluate: F) -> Self
    where
        F: Fn() -> std::result::Result<Duration, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        CacheExpiration::Relative(Arc::new(move || {
            evaluate().map_err(|err| -> BoxError { err.into() })
        }))
    }

    /// Signal-based expiration. `evaluate` must return a fresh awaitable on
    /// every call, e.g. by subscribing to an event source anew.
    pub fn promise_resolution<F, Fut>(evaluate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        CacheExpiration::PromiseResolution(Arc::new(move || {
            evaluate().map(|()| Ok::<(), BoxError>(())).boxed()
        }))
    }

    /// Signal-based expiration whose signal may reject.
    ///
    /// A rejected signal leaves the entry cached without expiry.
    pub fn try_promise_resolution<F, Fut, E>(evaluate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        CacheExpiration::PromiseResolution(Arc::new(move || {
            evaluate()
                .map(|settled| settled.map_err(|err| -> BoxError { err.into() }))
                .boxed()
        }))
    }

    /// Returns the policy's type tag.
    pub fn kind(&self) -> ExpirationKind {
        match self {
            CacheExpiration::Relative(_) => ExpirationKind::Relative,
            CacheExpiration::PromiseResolution(_) => ExpirationKind::PromiseResolution,
        }
    }

    // == Evaluate ==
    /// Runs the evaluator once for a newly created entry.
    ///
    /// A panicking evaluator is reported as [`MemoError::Evaluator`] like one
    /// returning `Err`.
    pub(crate) fn evaluate(&self) -> Result<Trigger> {
        let kind = self.kind();
        let evaluated = panic::catch_unwind(AssertUnwindSafe(|| match self {
            CacheExpiration::Relative(delay) => delay().map(Trigger::After),
            CacheExpiration::PromiseResolution(signal) => Ok(Trigger::Signal(signal())),
        }));
        match evaluated {
            Ok(trigger) => trigger.map_err(|source| MemoError::Evaluator { kind, source }),
            Err(payload) => Err(MemoError::Evaluator {
                kind,
                source: format!("evaluator panicked: {}", panic_message(&*payload)).into(),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl fmt::Debug for CacheExpiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheExpiration").field(&self.kind()).finish()
    }
}
