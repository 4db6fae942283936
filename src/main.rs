//! Memo Cache demo
//!
//! Memoizes a slow function under the configured expiration policy and logs
//! how many times the original actually ran.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{CacheExpiration, Config, ExpirationKind, MemoizeOptions, Memoized};

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the expiration policy and wrap the function
/// 4. Run call rounds, invalidating between them
/// 5. Print final statistics as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to debug for this crate, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: expiration={:?}, relative_delay_ms={}, rounds={}",
        config.expiration, config.relative_delay_ms, config.rounds
    );

    // Each evaluation subscribes anew, so every entry gets its own signal.
    let (invalidate_tx, _) = broadcast::channel::<()>(16);
    let options = match config.expiration {
        None => MemoizeOptions::default(),
        Some(ExpirationKind::Relative) => {
            let delay = config.relative_delay();
            CacheExpiration::relative(move || delay).into()
        }
        Some(ExpirationKind::PromiseResolution) => {
            let tx = invalidate_tx.clone();
            CacheExpiration::promise_resolution(move || {
                let mut rx = tx.subscribe();
                async move {
                    let _ = rx.recv().await;
                }
            })
            .into()
        }
    };

    let invocations = Arc::new(AtomicU64::new(0));
    let counter = invocations.clone();
    let slow_square = Memoized::with_options(
        move |(n,): (u64,)| {
            counter.fetch_add(1, Ordering::SeqCst);
            // Squaring by repeated addition stands in for expensive work.
            (0..n).fold(0, |acc, _| acc + n)
        },
        options,
    );

    for round in 1..=config.rounds {
        let first = slow_square.call((12,));
        let second = slow_square.call((12,));
        info!(
            round,
            first,
            second,
            invocations = invocations.load(Ordering::SeqCst),
            "round complete"
        );

        match config.expiration {
            Some(ExpirationKind::Relative) => {
                tokio::time::sleep(config.relative_delay() * 2).await;
            }
            Some(ExpirationKind::PromiseResolution) => {
                let _ = invalidate_tx.send(());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            None => {}
        }
    }

    let stats = slow_square.stats();
    info!(
        "Final stats: {} (hit rate {:.2})",
        serde_json::to_string(&stats)?,
        stats.hit_rate()
    );

    Ok(())
}
