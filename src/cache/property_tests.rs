//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key derivation and hit/miss accounting.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{JsonKeyCodec, KeyCodec};
use crate::memoize::Memoized;

// == Strategies ==
/// Generates argument tuples mixing numbers and strings
fn args_strategy() -> impl Strategy<Value = (i64, String)> {
    (any::<i64>(), "[a-zA-Z0-9 ]{0,16}")
}

fn counting_memo() -> (Arc<AtomicUsize>, Memoized<(i64, String), String>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let memo = Memoized::new(move |(n, s): (i64, String)| {
        seen.fetch_add(1, Ordering::SeqCst);
        format!("{}:{}", n, s)
    });
    (calls, memo)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Equal argument tuples always derive equal keys.
    #[test]
    fn prop_key_is_deterministic(args in args_strategy()) {
        let first = JsonKeyCodec.derive_key(&args);
        let second = JsonKeyCodec.derive_key(&args.clone());
        prop_assert_eq!(first, second);
    }

    // Distinct argument tuples derive distinct keys.
    #[test]
    fn prop_distinct_args_distinct_keys(a in args_strategy(), b in args_strategy()) {
        prop_assume!(a != b);
        prop_assert_ne!(JsonKeyCodec.derive_key(&a), JsonKeyCodec.derive_key(&b));
    }

    // Swapping two different arguments changes the key.
    #[test]
    fn prop_order_is_significant(x in any::<u32>(), y in any::<u32>()) {
        prop_assume!(x != y);
        prop_assert_ne!(JsonKeyCodec.derive_key(&(x, y)), JsonKeyCodec.derive_key(&(y, x)));
    }

    // Floats that differ, infinities included, never share a key.
    #[test]
    fn prop_distinct_floats_distinct_keys(a in any::<f64>(), b in any::<f64>()) {
        prop_assume!(a != b && !(a.is_nan() && b.is_nan()));
        prop_assert_ne!(JsonKeyCodec.derive_key(&(a,)), JsonKeyCodec.derive_key(&(b,)));
    }

    // N calls with the same arguments invoke the original exactly once.
    #[test]
    fn prop_idempotent_hit(args in args_strategy(), n in 2usize..20) {
        let (calls, memo) = counting_memo();
        let expected = format!("{}:{}", args.0, args.1);

        for _ in 0..n {
            prop_assert_eq!(memo.call(args.clone()), expected.clone());
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        prop_assert_eq!(memo.stats().hits, (n - 1) as u64);
    }

    // a, b, a invokes the original twice.
    #[test]
    fn prop_key_separation(a in args_strategy(), b in args_strategy()) {
        prop_assume!(a != b);
        let (calls, memo) = counting_memo();

        memo.call(a.clone());
        memo.call(b);
        memo.call(a);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 2);
        prop_assert_eq!(memo.len(), 2);
    }
}
