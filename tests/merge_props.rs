//! Property tests for transaction reconciliation.

use proptest::prelude::*;

use daemon_client::core::Transaction;
use daemon_client::merge::{merge, merge_tx, MergeError};

/// A partial view of transaction "feed" with a random subset of fields known
fn arb_view() -> impl Strategy<Value = Transaction> {
    (
        prop::option::of(0u64..3),
        prop::option::of(any::<bool>()),
        prop::option::of(any::<bool>()),
        prop::option::of(0u64..20),
        prop::option::of(1_000u64..1_010),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(fee, in_tx_pool, is_confirmed, num_confirmations, received_timestamp, relay)| {
            Transaction {
                fee,
                in_tx_pool,
                is_confirmed,
                num_confirmations,
                received_timestamp,
                relay,
                ..Transaction::with_hash("feed")
            }
        })
}

proptest! {
    /// Merging a view into itself changes nothing.
    #[test]
    fn merge_is_idempotent(view in arb_view()) {
        let mut target = view.clone();
        merge(&mut target, &view).unwrap();
        prop_assert_eq!(target, view);
    }

    /// The outcome does not depend on which view arrived first.
    #[test]
    fn merge_is_order_independent(a in arb_view(), b in arb_view()) {
        let mut ab = a.clone();
        let mut ba = b.clone();
        let first = merge(&mut ab, &b);
        let second = merge(&mut ba, &a);

        prop_assert_eq!(first.is_ok(), second.is_ok());
        if first.is_ok() {
            prop_assert_eq!(ab, ba);
        }
    }

    /// A failed merge leaves the target exactly as it was.
    #[test]
    fn failed_merge_is_atomic(a in arb_view(), b in arb_view()) {
        let mut target = a.clone();
        if merge(&mut target, &b).is_err() {
            prop_assert_eq!(target, a);
        }
    }

    /// Lifecycle fields only move forward.
    #[test]
    fn lifecycle_advances(a in arb_view(), b in arb_view()) {
        let mut target = a.clone();
        if merge(&mut target, &b).is_ok() {
            if a.is_confirmed == Some(true) || b.is_confirmed == Some(true) {
                prop_assert_eq!(target.is_confirmed, Some(true));
            }
            if a.in_tx_pool == Some(false) || b.in_tx_pool == Some(false) {
                prop_assert_eq!(target.in_tx_pool, Some(false));
            }
            let most = a.num_confirmations.max(b.num_confirmations);
            prop_assert_eq!(target.num_confirmations, most);
        }
    }

    /// Differing known fees always conflict.
    #[test]
    fn unequal_fees_conflict(x in 0u64..100, y in 0u64..100) {
        prop_assume!(x != y);
        let mut target = Transaction { fee: Some(x), ..Transaction::with_hash("feed") };
        let incoming = Transaction { fee: Some(y), ..Transaction::with_hash("feed") };
        let is_fee_conflict = matches!(
            merge(&mut target, &incoming),
            Err(MergeError::MergeConflict { field, .. }) if field == "fee"
        );
        prop_assert!(is_fee_conflict);
    }

    /// The list holds one entry per hash, in first-seen order.
    #[test]
    fn merge_tx_dedups_in_first_seen_order(hashes in prop::collection::vec("[a-c]", 0..24)) {
        let mut list = Vec::new();
        for hash in &hashes {
            merge_tx(&mut list, Transaction::with_hash(hash.clone())).unwrap();
        }

        let mut expected: Vec<String> = Vec::new();
        for hash in hashes {
            if !expected.contains(&hash) {
                expected.push(hash);
            }
        }
        let seen: Vec<String> = list.into_iter().filter_map(|tx| tx.hash).collect();
        prop_assert_eq!(seen, expected);
    }
}
