//! Merge rules per entity

use crate::core::{
    Block, BlockHeader, Destination, IncomingTransfer, OutgoingTransfer, Output, Transaction,
};
use crate::core::payment_ids_equal;
use crate::merge::{
    advance_pair, by_key, by_position, nested, prefer_max, prefer_min, prefer_false, prefer_true,
    strict, Merge, MergeError,
};

impl Merge for Transaction {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        // Identity needs a known hash on both sides
        if self.hash.is_none() || self.hash != other.hash {
            return Err(MergeError::IdentityMismatch {
                target: self.hash.clone(),
                incoming: other.hash.clone(),
            });
        }

        // Lifecycle
        prefer_true(&mut self.is_confirmed, &other.is_confirmed);
        prefer_true(&mut self.relay, &other.relay);
        prefer_true(&mut self.is_relayed, &other.is_relayed);
        prefer_true(&mut self.is_double_spend_seen, &other.is_double_spend_seen);
        prefer_true(&mut self.is_failed, &other.is_failed);
        prefer_false(&mut self.in_tx_pool, &other.in_tx_pool);
        prefer_false(&mut self.is_locked, &other.is_locked);
        prefer_max(&mut self.num_confirmations, &other.num_confirmations);
        prefer_max(&mut self.last_relayed_timestamp, &other.last_relayed_timestamp);
        prefer_min(&mut self.received_timestamp, &other.received_timestamp);
        advance_pair(
            "last_failed_hash",
            &mut self.last_failed_height,
            &mut self.last_failed_hash,
            &other.last_failed_height,
            &other.last_failed_hash,
        )?;
        advance_pair(
            "max_used_block_hash",
            &mut self.max_used_block_height,
            &mut self.max_used_block_hash,
            &other.max_used_block_height,
            &other.max_used_block_hash,
        )?;

        // Zero-padded forms of one payment id are the same id; keep the longer
        match (&self.payment_id, &other.payment_id) {
            (Some(a), Some(b)) if payment_ids_equal(a, b) => {
                if b.len() > a.len() {
                    self.payment_id = Some(b.clone());
                }
            }
            _ => strict("payment_id", &mut self.payment_id, &other.payment_id)?,
        }

        strict("version", &mut self.version, &other.version)?;
        strict("is_miner_tx", &mut self.is_miner_tx, &other.is_miner_tx)?;
        strict("fee", &mut self.fee, &other.fee)?;
        strict("ring_size", &mut self.ring_size, &other.ring_size)?;
        strict("unlock_time", &mut self.unlock_time, &other.unlock_time)?;
        strict("is_kept_by_block", &mut self.is_kept_by_block, &other.is_kept_by_block)?;
        strict("full_hex", &mut self.full_hex, &other.full_hex)?;
        strict("pruned_hex", &mut self.pruned_hex, &other.pruned_hex)?;
        strict("prunable_hex", &mut self.prunable_hex, &other.prunable_hex)?;
        strict("prunable_hash", &mut self.prunable_hash, &other.prunable_hash)?;
        strict("size", &mut self.size, &other.size)?;
        strict("weight", &mut self.weight, &other.weight)?;
        strict("extra", &mut self.extra, &other.extra)?;
        strict("output_indices", &mut self.output_indices, &other.output_indices)?;
        strict("rct_signatures", &mut self.rct_signatures, &other.rct_signatures)?;
        strict("rct_sig_prunable", &mut self.rct_sig_prunable, &other.rct_sig_prunable)?;
        strict("signatures", &mut self.signatures, &other.signatures)?;

        nested("block", &mut self.block, &other.block)?;
        by_position("inputs", &mut self.inputs, &other.inputs)?;
        by_position("outputs", &mut self.outputs, &other.outputs)?;
        by_key(
            "incoming_transfers",
            &mut self.incoming_transfers,
            &other.incoming_transfers,
            |transfer: &IncomingTransfer| Some(transfer.key()),
        )?;
        nested("outgoing_transfer", &mut self.outgoing_transfer, &other.outgoing_transfer)?;
        Ok(())
    }
}

impl Merge for BlockHeader {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        prefer_max(&mut self.depth, &other.depth);
        strict("hash", &mut self.hash, &other.hash)?;
        strict("height", &mut self.height, &other.height)?;
        strict("timestamp", &mut self.timestamp, &other.timestamp)?;
        strict("size", &mut self.size, &other.size)?;
        strict("weight", &mut self.weight, &other.weight)?;
        strict("long_term_weight", &mut self.long_term_weight, &other.long_term_weight)?;
        strict("difficulty", &mut self.difficulty, &other.difficulty)?;
        strict(
            "cumulative_difficulty",
            &mut self.cumulative_difficulty,
            &other.cumulative_difficulty,
        )?;
        strict("major_version", &mut self.major_version, &other.major_version)?;
        strict("minor_version", &mut self.minor_version, &other.minor_version)?;
        strict("nonce", &mut self.nonce, &other.nonce)?;
        strict("miner_tx_hash", &mut self.miner_tx_hash, &other.miner_tx_hash)?;
        strict("num_txs", &mut self.num_txs, &other.num_txs)?;
        strict("orphan_status", &mut self.orphan_status, &other.orphan_status)?;
        strict("prev_hash", &mut self.prev_hash, &other.prev_hash)?;
        strict("reward", &mut self.reward, &other.reward)?;
        strict("pow_hash", &mut self.pow_hash, &other.pow_hash)?;
        Ok(())
    }
}

impl Merge for Block {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        self.header.merge_from(&other.header)?;
        strict("hex", &mut self.hex, &other.hex)?;
        strict("tx_hashes", &mut self.tx_hashes, &other.tx_hashes)?;
        nested("miner_tx", &mut self.miner_tx, &other.miner_tx)?;
        by_key("txs", &mut self.txs, &other.txs, |tx: &Transaction| tx.hash.clone())
    }
}

impl Merge for Output {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        prefer_true(&mut self.is_spent, &other.is_spent);
        strict("key_image", &mut self.key_image, &other.key_image)?;
        strict("amount", &mut self.amount, &other.amount)?;
        strict("index", &mut self.index, &other.index)?;
        strict(
            "ring_output_indices",
            &mut self.ring_output_indices,
            &other.ring_output_indices,
        )?;
        strict(
            "stealth_public_key",
            &mut self.stealth_public_key,
            &other.stealth_public_key,
        )?;
        strict("view_tag", &mut self.view_tag, &other.view_tag)?;
        strict("account_index", &mut self.account_index, &other.account_index)?;
        strict("subaddress_index", &mut self.subaddress_index, &other.subaddress_index)?;
        strict("is_frozen", &mut self.is_frozen, &other.is_frozen)?;
        Ok(())
    }
}

impl Merge for IncomingTransfer {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        prefer_max(
            &mut self.num_suggested_confirmations,
            &other.num_suggested_confirmations,
        );
        strict("amount", &mut self.amount, &other.amount)?;
        strict("account_index", &mut self.account_index, &other.account_index)?;
        strict("subaddress_index", &mut self.subaddress_index, &other.subaddress_index)?;
        strict("address", &mut self.address, &other.address)?;
        Ok(())
    }
}

impl Merge for OutgoingTransfer {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        strict("amount", &mut self.amount, &other.amount)?;
        strict("account_index", &mut self.account_index, &other.account_index)?;
        strict(
            "subaddress_indices",
            &mut self.subaddress_indices,
            &other.subaddress_indices,
        )?;
        strict("addresses", &mut self.addresses, &other.addresses)?;
        by_position("destinations", &mut self.destinations, &other.destinations)
    }
}

impl Merge for Destination {
    fn merge_from(&mut self, other: &Self) -> Result<(), MergeError> {
        strict("address", &mut self.address, &other.address)?;
        strict("amount", &mut self.amount, &other.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge, merge_tx};

    fn pool_view() -> Transaction {
        Transaction {
            hash: Some("abc123".to_string()),
            is_confirmed: Some(false),
            in_tx_pool: Some(true),
            num_confirmations: Some(0),
            received_timestamp: Some(1_700_000_000),
            fee: Some(10),
            ..Default::default()
        }
    }

    fn block_view() -> Transaction {
        let mut tx = Transaction::confirmed_in(&BlockHeader {
            height: Some(100),
            ..Default::default()
        });
        tx.hash = Some("abc123".to_string());
        tx
    }

    #[test]
    fn test_pool_then_block() {
        let mut tx = pool_view();
        merge(&mut tx, &block_view()).unwrap();

        assert_eq!(tx.hash.as_deref(), Some("abc123"));
        assert_eq!(tx.is_confirmed, Some(true));
        assert_eq!(tx.in_tx_pool, Some(false));
        assert_eq!(tx.height(), Some(100));
        assert_eq!(tx.fee, Some(10));
        assert_eq!(tx.received_timestamp, Some(1_700_000_000));
    }

    #[test]
    fn test_block_then_pool_is_the_same() {
        let mut a = pool_view();
        merge(&mut a, &block_view()).unwrap();
        let mut b = block_view();
        merge(&mut b, &pool_view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fee_conflict_reports_both_values() {
        let mut tx = Transaction {
            fee: Some(10),
            ..Transaction::with_hash("abc123")
        };
        let other = Transaction {
            fee: Some(20),
            ..Transaction::with_hash("abc123")
        };

        let err = merge(&mut tx, &other).unwrap_err();
        assert_eq!(
            err,
            MergeError::MergeConflict {
                field: "fee".to_string(),
                existing: "10".to_string(),
                incoming: "20".to_string(),
            }
        );
    }

    #[test]
    fn test_failed_merge_leaves_target_untouched() {
        let mut tx = Transaction {
            fee: Some(10),
            ..Transaction::with_hash("h")
        };
        let before = tx.clone();
        let other = Transaction {
            is_confirmed: Some(true),
            size: Some(5),
            fee: Some(11),
            ..Transaction::with_hash("h")
        };
        assert!(merge(&mut tx, &other).is_err());
        assert_eq!(tx, before);
    }

    #[test]
    fn test_identity_mismatch() {
        let mut tx = Transaction::with_hash("a");
        assert!(matches!(
            merge(&mut tx, &Transaction::with_hash("b")),
            Err(MergeError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut tx = pool_view();
        tx.outputs = Some(vec![Output {
            amount: Some(5),
            ..Default::default()
        }]);
        let copy = tx.clone();
        merge(&mut tx, &copy).unwrap();
        assert_eq!(tx, copy);
    }

    #[test]
    fn test_merge_tx_list() {
        let mut list = Vec::new();
        merge_tx(&mut list, pool_view()).unwrap();
        assert_eq!(list.len(), 1);

        merge_tx(&mut list, block_view()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].height(), Some(100));

        merge_tx(&mut list, Transaction::with_hash("def456")).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].hash.as_deref(), Some("def456"));
    }

    #[test]
    fn test_incoming_transfers_merge_by_subaddress() {
        let transfer = |account, subaddress, amount| IncomingTransfer {
            amount,
            account_index: Some(account),
            subaddress_index: Some(subaddress),
            ..Default::default()
        };
        let mut tx = Transaction {
            incoming_transfers: Some(vec![transfer(0, 1, None)]),
            ..Transaction::with_hash("h")
        };
        let other = Transaction {
            incoming_transfers: Some(vec![transfer(0, 2, Some(7)), transfer(0, 1, Some(3))]),
            ..Transaction::with_hash("h")
        };
        merge(&mut tx, &other).unwrap();

        let transfers = tx.incoming_transfers.unwrap();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].amount, Some(3));
        assert_eq!(transfers[1].subaddress_index, Some(2));
    }

    #[test]
    fn test_output_count_mismatch_conflicts() {
        let mut tx = Transaction {
            outputs: Some(vec![Output::default()]),
            ..Transaction::with_hash("h")
        };
        let other = Transaction {
            outputs: Some(vec![Output::default(), Output::default()]),
            ..Transaction::with_hash("h")
        };
        assert!(matches!(
            merge(&mut tx, &other),
            Err(MergeError::MergeConflict { field, .. }) if field == "outputs"
        ));
    }

    #[test]
    fn test_nested_conflict_path() {
        let header = |hash: &str| BlockHeader {
            hash: Some(hash.to_string()),
            ..Default::default()
        };
        let mut tx = Transaction {
            block: Some(header("b1")),
            ..Transaction::with_hash("h")
        };
        let other = Transaction {
            block: Some(header("b2")),
            ..Transaction::with_hash("h")
        };
        assert!(matches!(
            merge(&mut tx, &other),
            Err(MergeError::MergeConflict { field, .. }) if field == "block.hash"
        ));
    }

    #[test]
    fn test_payment_id_padding_keeps_longer() {
        let long = format!("03284e41c342f032{}", "0".repeat(48));
        let mut tx = Transaction {
            payment_id: Some("03284e41c342f032".to_string()),
            ..Transaction::with_hash("h")
        };
        let other = Transaction {
            payment_id: Some(long.clone()),
            ..Transaction::with_hash("h")
        };
        merge(&mut tx, &other).unwrap();
        assert_eq!(tx.payment_id, Some(long));
    }

    #[test]
    fn test_block_txs_merge_by_hash() {
        let mut block = Block {
            txs: Some(vec![Transaction::with_hash("a")]),
            ..Default::default()
        };
        let other = Block {
            txs: Some(vec![
                Transaction {
                    fee: Some(1),
                    ..Transaction::with_hash("a")
                },
                Transaction::with_hash("b"),
            ]),
            ..Default::default()
        };
        merge(&mut block, &other).unwrap();
        let txs = block.txs.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].fee, Some(1));
    }

    #[test]
    fn test_unhashed_txs_never_merge() {
        let mut tx = Transaction { fee: Some(1), ..Default::default() };
        let before = tx.clone();
        assert!(matches!(
            merge(&mut tx, &Transaction { fee: Some(2), ..Default::default() }),
            Err(MergeError::IdentityMismatch { target: None, incoming: None })
        ));
        assert_eq!(tx, before);

        let mut block = Block {
            txs: Some(vec![Transaction { fee: Some(1), ..Default::default() }]),
            ..Default::default()
        };
        let other = Block {
            txs: Some(vec![Transaction { fee: Some(2), ..Default::default() }]),
            ..Default::default()
        };
        merge(&mut block, &other).unwrap();
        let fees: Vec<_> = block.txs.unwrap().iter().map(|tx| tx.fee).collect();
        assert_eq!(fees, vec![Some(1), Some(2)]);
    }
}
