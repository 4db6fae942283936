//! Method Decorator Adapter
//!
//! Memoizes a method body while forwarding the receiver on every call.
//! The receiver is not part of the cache key.
//!
//! # Scope
//! The adapter lives in a field of the receiver, so each instance owns its
//! cache. Cloning the adapter (or the receiver) starts from an empty cache.
//! A cache shared by every instance is a `static` adapter instead.
//!
//! # Example
//! ```
//! use memo_cache::{memoized_method, MemoizedMethod};
//!
//! struct Rectangle {
//!     width: u64,
//!     height: u64,
//!     area: MemoizedMethod<Rectangle, (u64,), u64>,
//! }
//!
//! impl Rectangle {
//!     fn new(width: u64, height: u64) -> Self {
//!         Self {
//!             width,
//!             height,
//!             area: MemoizedMethod::new(|this: &Rectangle, (scale,): (u64,)| {
//!                 this.width * this.height * scale
//!             }),
//!         }
//!     }
//!
//!     memoized_method!(pub fn scaled_area(&self, scale: u64) -> u64 => area);
//! }
//!
//! let rect = Rectangle::new(3, 4);
//! assert_eq!(rect.scaled_area(2), 24);
//! assert_eq!(rect.scaled_area(2), 24);
//! assert_eq!(rect.area.stats().hits, 1);
//! ```

use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheStats, KeyCodec};
use crate::memoize::engine::Engine;
use crate::memoize::MemoizeOptions;

// == Memoized Method ==
/// A memoized method body taking its receiver explicitly.
pub struct MemoizedMethod<S: ?Sized, A, T, E = Infallible> {
    body: Arc<dyn Fn(&S, A) -> Result<T, E> + Send + Sync>,
    engine: Engine<A, T>,
}

impl<S, A, T> MemoizedMethod<S, A, T, Infallible>
where
    S: ?Sized,
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
{
    // == Constructors ==
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&S, A) -> T + Send + Sync + 'static,
    {
        Self::with_options(body, MemoizeOptions::default())
    }

    /// Same expiration semantics as [`crate::Memoized::with_options`].
    pub fn with_options<F>(body: F, options: MemoizeOptions) -> Self
    where
        F: Fn(&S, A) -> T + Send + Sync + 'static,
    {
        Self::try_with_options(move |receiver: &S, args| Ok(body(receiver, args)), options)
    }

    // == Call ==
    /// Calls the body with `receiver` on a miss.
    pub fn call(&self, receiver: &S, args: A) -> T {
        match self.try_call(receiver, args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<S, A, T, E> MemoizedMethod<S, A, T, E>
where
    S: ?Sized,
    A: Serialize + Debug + 'static,
    T: Clone + Send + 'static,
{
    pub fn try_new<F>(body: F) -> Self
    where
        F: Fn(&S, A) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::try_with_options(body, MemoizeOptions::default())
    }

    pub fn try_with_options<F>(body: F, options: MemoizeOptions) -> Self
    where
        F: Fn(&S, A) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(body),
            engine: Engine::new(options),
        }
    }
}

impl<S, A, T, E> MemoizedMethod<S, A, T, E>
where
    S: ?Sized,
    T: Clone + Send + 'static,
{
    /// Calls the body with `receiver` on a miss; errors are never cached.
    pub fn try_call(&self, receiver: &S, args: A) -> Result<T, E> {
        self.engine.get_or_compute(args, |args| (self.body)(receiver, args))
    }

    pub fn with_key_codec<C>(mut self, codec: C) -> Self
    where
        C: KeyCodec<A> + 'static,
    {
        self.engine = self.engine.with_codec(Arc::new(codec));
        self
    }

    pub fn invalidate(&self, args: &A) -> bool {
        self.engine.invalidate(args)
    }

    pub fn clear(&self) {
        self.engine.clear();
    }

    pub fn contains(&self, args: &A) -> bool {
        self.engine.contains(args)
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }
}

impl<S, A, T, E> Clone for MemoizedMethod<S, A, T, E>
where
    S: ?Sized,
    T: Clone + Send + 'static,
{
    /// Same body and options over an empty cache.
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
            engine: self.engine.fork(),
        }
    }
}

impl<S, A, T, E> Debug for MemoizedMethod<S, A, T, E>
where
    S: ?Sized,
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedMethod")
            .field("entries", &self.len())
            .field("expiration", &self.engine.options().expiration_kind())
            .finish()
    }
}

// == Installation ==
/// Generates a method that forwards `&self` and its arguments to a
/// [`MemoizedMethod`] field.
///
/// `=> field` calls [`MemoizedMethod::call`]; `=> try field` calls
/// [`MemoizedMethod::try_call`].
#[macro_export]
macro_rules! memoized_method {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident(&self $(, $arg:ident : $ty:ty)* $(,)?) -> $ret:ty => try $slot:ident
    ) => {
        $(#[$meta])*
        $vis fn $name(&self $(, $arg: $ty)*) -> $ret {
            self.$slot.try_call(self, ($($arg,)*))
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident(&self $(, $arg:ident : $ty:ty)* $(,)?) -> $ret:ty => $slot:ident
    ) => {
        $(#[$meta])*
        $vis fn $name(&self $(, $arg: $ty)*) -> $ret {
            self.$slot.call(self, ($($arg,)*))
        }
    };
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::CacheExpiration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    struct Account {
        owner: String,
        balance: i64,
        body_calls: AtomicUsize,
        statement: MemoizedMethod<Account, (u32,), String>,
        withdraw_check: MemoizedMethod<Account, (i64,), i64, String>,
    }

    impl Account {
        fn new(owner: &str, balance: i64) -> Self {
            Self {
                owner: owner.to_string(),
                balance,
                body_calls: AtomicUsize::new(0),
                statement: MemoizedMethod::new(|this: &Account, (month,): (u32,)| {
                    this.body_calls.fetch_add(1, Ordering::SeqCst);
                    format!("{} month {}: {}", this.owner, month, this.formatted_balance())
                }),
                withdraw_check: MemoizedMethod::try_new(|this: &Account, (amount,): (i64,)| {
                    this.body_calls.fetch_add(1, Ordering::SeqCst);
                    if amount > this.balance {
                        Err(format!("{} cannot cover {}", this.owner, amount))
                    } else {
                        Ok(this.balance - amount)
                    }
                }),
            }
        }

        fn formatted_balance(&self) -> String {
            format!("${}", self.balance)
        }

        memoized_method!(fn statement(&self, month: u32) -> String => statement);

        memoized_method!(
            /// Remaining balance after a withdrawal.
            fn remaining_after(&self, amount: i64) -> Result<i64, String> => try withdraw_check
        );

        fn calls(&self) -> usize {
            self.body_calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_receiver_state_reaches_body() {
        let account = Account::new("ada", 120);

        assert_eq!(account.statement(3), "ada month 3: $120");
        assert_eq!(account.statement(3), "ada month 3: $120");
        assert_eq!(account.calls(), 1);
    }

    #[test]
    fn test_instances_have_private_caches() {
        let ada = Account::new("ada", 120);
        let bob = Account::new("bob", 7);

        assert_eq!(ada.statement(1), "ada month 1: $120");
        assert_eq!(bob.statement(1), "bob month 1: $7");
        assert_eq!(ada.calls(), 1);
        assert_eq!(bob.calls(), 1);
    }

    #[test]
    fn test_try_method_does_not_cache_errors() {
        let account = Account::new("ada", 50);

        assert!(account.remaining_after(80).is_err());
        assert!(account.remaining_after(80).is_err());
        assert_eq!(account.remaining_after(20), Ok(30));
        assert_eq!(account.remaining_after(20), Ok(30));
        assert_eq!(account.calls(), 3);
        assert_eq!(account.withdraw_check.stats().failures, 2);
    }

    #[test]
    fn test_clone_starts_with_empty_cache() {
        let account = Account::new("ada", 1);
        account.statement(1);

        let copy = account.statement.clone();
        assert_eq!(account.statement.len(), 1);
        assert!(copy.is_empty());
    }

    #[test]
    fn test_static_adapter_shares_across_instances() {
        struct Point {
            x: i32,
        }
        static NORM: OnceLock<MemoizedMethod<Point, (i32,), i32>> = OnceLock::new();
        let norm = NORM.get_or_init(|| MemoizedMethod::new(|p: &Point, (k,): (i32,)| p.x.abs() * k));

        assert_eq!(norm.call(&Point { x: -2 }, (3,)), 6);
        // Receiver is not in the key, so the second instance hits.
        assert_eq!(norm.call(&Point { x: 5 }, (3,)), 6);
        assert_eq!(norm.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_method_expiration_matches_function_wrapper() {
        struct Clock {
            ticks: AtomicUsize,
            now: MemoizedMethod<Clock, (), usize>,
        }
        let clock = Clock {
            ticks: AtomicUsize::new(0),
            now: MemoizedMethod::with_options(
                |c: &Clock, (): ()| c.ticks.fetch_add(1, Ordering::SeqCst),
                CacheExpiration::relative_millis(100).into(),
            ),
        };

        assert_eq!(clock.now.call(&clock, ()), 0);
        assert_eq!(clock.now.call(&clock, ()), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(clock.now.call(&clock, ()), 1);
    }
}
