//! Property tests for query filters.
//!
//! Filters are conjunctions, so adding a clause can only narrow the result,
//! and `apply` must agree with `meets_criteria` item by item.

use proptest::prelude::*;

use daemon_client::core::{BlockHeader, Output, Transaction};
use daemon_client::filter::{Filter, OutputFilter, TransactionFilter};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_output() -> impl Strategy<Value = Output> {
    (
        prop::option::of(0u64..1_000),
        prop::option::of(0u32..4),
        prop::option::of(any::<bool>()),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(amount, subaddress_index, is_spent, is_frozen)| Output {
            amount,
            subaddress_index,
            account_index: Some(0),
            is_spent,
            is_frozen,
            ..Default::default()
        })
}

fn arb_tx() -> impl Strategy<Value = Transaction> {
    (
        "[0-9a-f]{4}",
        prop::option::of(0u64..50),
        prop::option::of(0u64..100),
        prop::option::of("[0-9a-f]{16}"),
        prop::option::of(prop::collection::vec(arb_output(), 0..4)),
    )
        .prop_map(|(hash, height, fee, payment_id, outputs)| {
            let mut tx = Transaction::with_hash(hash);
            tx.block = height.map(|h| BlockHeader {
                height: Some(h),
                ..Default::default()
            });
            tx.fee = fee;
            tx.payment_id = payment_id;
            tx.outputs = outputs;
            tx
        })
}

/// An ordered height window
fn arb_window() -> impl Strategy<Value = (u64, u64)> {
    (0u64..50, 0u64..50).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// An empty filter selects everything.
    #[test]
    fn empty_filter_matches_all(txs in prop::collection::vec(arb_tx(), 0..16)) {
        let filter = TransactionFilter::default();
        prop_assert_eq!(filter.apply(&txs[..]).len(), txs.len());
    }

    /// `apply` keeps exactly the matching items, in input order.
    #[test]
    fn apply_agrees_with_meets_criteria(
        txs in prop::collection::vec(arb_tx(), 0..16),
        (min, max) in arb_window(),
    ) {
        let filter = TransactionFilter::builder().min_height(min).max_height(max).build().unwrap();
        let expected: Vec<&Transaction> = txs.iter().filter(|tx| filter.meets_criteria(*tx)).collect();
        prop_assert_eq!(filter.apply(&txs[..]), expected);
    }

    /// Adding a clause never admits a transaction the looser filter rejected.
    #[test]
    fn extra_clauses_only_narrow(
        txs in prop::collection::vec(arb_tx(), 0..16),
        (min, max) in arb_window(),
        has_payment_id in any::<bool>(),
    ) {
        let loose = TransactionFilter::builder().min_height(min).build().unwrap();
        let tight = TransactionFilter::builder()
            .min_height(min)
            .max_height(max)
            .has_payment_id(has_payment_id)
            .build()
            .unwrap();

        for tx in &txs {
            if tight.meets_criteria(tx) {
                prop_assert!(loose.meets_criteria(tx));
            }
        }
    }

    /// Height bounds select confirmed transactions inside the window only.
    #[test]
    fn height_window_matches_known_heights(tx in arb_tx(), (min, max) in arb_window()) {
        let filter = TransactionFilter::builder().min_height(min).max_height(max).build().unwrap();
        let expected = tx.height().is_some_and(|h| (min..=max).contains(&h));
        prop_assert_eq!(filter.meets_criteria(&tx), expected);
    }

    /// Inverted windows are refused at construction.
    #[test]
    fn inverted_window_is_invalid(min in 1u64..100, gap in 1u64..100) {
        let max = min.saturating_sub(gap);
        prop_assert!(TransactionFilter::builder().min_height(min).max_height(max).build().is_err());
        prop_assert!(OutputFilter::builder().min_amount(min).max_amount(max).build().is_err());
    }

    /// A nested output filter requires at least one matching output.
    #[test]
    fn output_filter_needs_a_matching_output(tx in arb_tx(), spent in any::<bool>()) {
        let outputs = OutputFilter::builder().is_spent(spent).build().unwrap();
        let filter = TransactionFilter::builder().output_filter(outputs.clone()).build().unwrap();

        let expected = tx.outputs.iter().flatten().any(|o| outputs.meets_criteria(o));
        prop_assert_eq!(filter.meets_criteria(&tx), expected);
    }

    /// Amount bounds reject outputs whose amount is unknown.
    #[test]
    fn amount_window_requires_known_amount(output in arb_output(), (min, max) in arb_window()) {
        let filter = OutputFilter::builder().min_amount(min).max_amount(max).build().unwrap();
        let expected = output.amount.is_some_and(|a| (min..=max).contains(&a));
        prop_assert_eq!(filter.meets_criteria(&output), expected);
    }
}
