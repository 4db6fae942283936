//! Expiration Watchers
//!
//! Background tasks that purge one specific cache entry once its
//! expiration condition is met.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::CacheKey;
use crate::error::{MemoError, Result};
use crate::expiration::policy::{CacheExpiration, ExpirationKind, Trigger};

// == Watcher ==
/// Handle to a spawned expiration task.
///
/// Dropping the watcher aborts the task, so a purged or overwritten entry
/// never leaves an orphaned timer behind.
#[derive(Debug)]
pub struct Watcher {
    task: Option<JoinHandle<()>>,
    kind: ExpirationKind,
}

impl Watcher {
    /// Wraps an already spawned task.
    pub fn new(task: JoinHandle<()>, kind: ExpirationKind) -> Self {
        Self {
            task: Some(task),
            kind,
        }
    }

    /// Returns the policy that armed this watcher.
    pub fn kind(&self) -> ExpirationKind {
        self.kind
    }

    /// Returns true once the task has completed or been aborted.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Lets the task run to completion without holding it.
    pub fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// == Arm ==
/// Evaluates `expiration` once and spawns the task that calls `on_expire`.
///
/// Fails without spawning anything when no tokio runtime is available or
/// when the evaluator fails. A signal that later rejects is logged by the
/// task and `on_expire` is never called.
pub fn arm<F>(expiration: &CacheExpiration, key: &CacheKey, on_expire: F) -> Result<Watcher>
where
    F: FnOnce() + Send + 'static,
{
    let kind = expiration.kind();
    let runtime = Handle::try_current().map_err(|_| MemoError::NoRuntime(kind))?;
    let key = key.clone();

    let task = match expiration.evaluate()? {
        Trigger::After(delay) => {
            debug!(
                key = %key,
                kind = %kind,
                delay_ms = delay.as_millis() as u64,
                "arming expiration"
            );
            runtime.spawn(expire_after(delay, key, on_expire))
        }
        Trigger::Signal(signal) => {
            debug!(key = %key, kind = %kind, "arming expiration");
            runtime.spawn(async move {
                match signal.await {
                    Ok(()) => {
                        debug!(key = %key, kind = %kind, "invalidation signal resolved");
                        on_expire();
                    }
                    Err(err) => {
                        let err = MemoError::SignalRejected(err);
                        warn!(
                            key = %key,
                            kind = %kind,
                            error = %err,
                            "entry retained without expiry"
                        );
                    }
                }
            })
        }
    };

    Ok(Watcher::new(task, kind))
}

async fn expire_after<F>(delay: Duration, key: CacheKey, on_expire: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::time::sleep(delay).await;
    debug!(key = %key, "relative expiration elapsed");
    on_expire();
}
