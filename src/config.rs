//! Configuration Module
//!
//! Loads the demo binary's settings from environment variables.

use std::env;
use std::time::Duration;

use crate::expiration::ExpirationKind;

/// Demo configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Expiration policy to demonstrate, None = entries never expire
    pub expiration: Option<ExpirationKind>,
    /// Delay in milliseconds for relative expiration
    pub relative_delay_ms: u64,
    /// Number of call rounds to run
    pub rounds: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_EXPIRATION` - `none`, `relative` or `promise-resolution` (default: relative)
    /// - `MEMO_RELATIVE_DELAY_MS` - Relative expiration delay (default: 100)
    /// - `MEMO_DEMO_ROUNDS` - Call rounds (default: 3)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiration: env::var("MEMO_EXPIRATION")
                .ok()
                .map(|v| parse_expiration(&v).unwrap_or(defaults.expiration))
                .unwrap_or(defaults.expiration),
            relative_delay_ms: env::var("MEMO_RELATIVE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.relative_delay_ms),
            rounds: env::var("MEMO_DEMO_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rounds),
        }
    }

    /// Returns the relative expiration delay.
    pub fn relative_delay(&self) -> Duration {
        Duration::from_millis(self.relative_delay_ms)
    }
}

/// `none` selects no expiration; anything unparseable yields None.
fn parse_expiration(value: &str) -> Option<Option<ExpirationKind>> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Some(None);
    }
    value.parse().ok().map(Some)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expiration: Some(ExpirationKind::Relative),
            relative_delay_ms: 100,
            rounds: 3,
        }
    }
}
