//! Memoize Options
//!
//! Configuration accepted by every wrapper constructor.

use crate::expiration::{CacheExpiration, ExpirationKind};

/// Options for a memoized function or method.
///
/// Without `cache_expiration`, entries live as long as the wrapper.
#[derive(Debug, Clone, Default)]
pub struct MemoizeOptions {
    pub cache_expiration: Option<CacheExpiration>,
}

impl MemoizeOptions {
    /// Creates options with no expiration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expiration policy.
    pub fn with_cache_expiration(mut self, expiration: CacheExpiration) -> Self {
        self.cache_expiration = Some(expiration);
        self
    }

    /// Returns the configured policy's tag, if any.
    pub fn expiration_kind(&self) -> Option<ExpirationKind> {
        self.cache_expiration.as_ref().map(CacheExpiration::kind)
    }
}

impl From<CacheExpiration> for MemoizeOptions {
    fn from(expiration: CacheExpiration) -> Self {
        Self::new().with_cache_expiration(expiration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_expiration() {
        let options = MemoizeOptions::default();
        assert!(options.cache_expiration.is_none());
        assert_eq!(options.expiration_kind(), None);
    }

    #[test]
    fn test_with_cache_expiration() {
        let options = MemoizeOptions::new().with_cache_expiration(CacheExpiration::relative_millis(100));
        assert_eq!(options.expiration_kind(), Some(ExpirationKind::Relative));

        let options: MemoizeOptions = CacheExpiration::promise_resolution(|| async {}).into();
        assert_eq!(options.expiration_kind(), Some(ExpirationKind::PromiseResolution));
    }
}
