//! Reconciliation of partial observations
//!
//! Two views of the same entity combine field by field:
//! - unknown in the target: adopt the incoming value
//! - known in both and unequal: conflict
//!
//! Lifecycle fields of a transaction advance in one direction (pool to
//! confirmed, relayed, more confirmations) and are reconciled by that
//! direction instead. Merging is atomic: on error the target is unchanged.

pub mod entities;

use crate::core::Transaction;
use std::fmt::Debug;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Merge errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Cannot merge different transactions: {target:?} vs {incoming:?}")]
    IdentityMismatch {
        target: Option<String>,
        incoming: Option<String>,
    },
    #[error("Merge conflict on '{field}': existing {existing}, incoming {incoming}")]
    MergeConflict {
        field: String,
        existing: String,
        incoming: String,
    },
}

impl MergeError {
    /// Qualify a conflict's field path with its parent
    pub fn within(self, parent: &str) -> Self {
        match self {
            MergeError::MergeConflict {
                field,
                existing,
                incoming,
            } => MergeError::MergeConflict {
                field: format!("{}.{}", parent, field),
                existing,
                incoming,
            },
            other => other,
        }
    }

    fn conflict<T: Debug>(field: &str, existing: &T, incoming: &T) -> Self {
        MergeError::MergeConflict {
            field: field.to_string(),
            existing: format!("{:?}", existing),
            incoming: format!("{:?}", incoming),
        }
    }
}

// =============================================================================
// Merge Trait
// =============================================================================

/// Entities that absorb another observation of themselves
pub trait Merge {
    /// Fold `incoming` into `self`; may leave `self` partially updated on
    /// error, use [`merge`] for the atomic form
    fn merge_from(&mut self, incoming: &Self) -> Result<(), MergeError>;
}

/// Merge `incoming` into `target`, leaving `target` untouched on error
pub fn merge<T: Merge + Clone>(target: &mut T, incoming: &T) -> Result<(), MergeError> {
    let mut work = target.clone();
    work.merge_from(incoming)?;
    *target = work;
    Ok(())
}

/// Merge `tx` into the entry of `list` with the same hash, or append it
///
/// Entries keep the order in which their hash first appeared. A transaction
/// without a hash matches nothing and is always appended.
pub fn merge_tx(list: &mut Vec<Transaction>, tx: Transaction) -> Result<(), MergeError> {
    let found = match tx.hash.as_deref() {
        Some(hash) => list.iter_mut().find(|existing| existing.hash.as_deref() == Some(hash)),
        None => None,
    };
    match found {
        Some(existing) => merge(existing, &tx),
        None => {
            list.push(tx);
            Ok(())
        }
    }
}

// =============================================================================
// Field Rules
// =============================================================================

/// Adopt when unknown; conflict when both known and unequal
pub(crate) fn strict<T: PartialEq + Clone + Debug>(
    field: &str,
    target: &mut Option<T>,
    incoming: &Option<T>,
) -> Result<(), MergeError> {
    match (target.as_ref(), incoming) {
        (_, None) => Ok(()),
        (None, Some(v)) => {
            *target = Some(v.clone());
            Ok(())
        }
        (Some(a), Some(b)) if a == b => Ok(()),
        (Some(a), Some(b)) => Err(MergeError::conflict(field, a, b)),
    }
}

/// A flag that only ever turns on
pub(crate) fn prefer_true(target: &mut Option<bool>, incoming: &Option<bool>) {
    *target = match (*target, *incoming) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (None, v) | (v, None) => v,
        (Some(false), Some(false)) => Some(false),
    };
}

/// A flag that only ever turns off
pub(crate) fn prefer_false(target: &mut Option<bool>, incoming: &Option<bool>) {
    *target = match (*target, *incoming) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (None, v) | (v, None) => v,
        (Some(true), Some(true)) => Some(true),
    };
}

/// A counter or timestamp that only grows
pub(crate) fn prefer_max(target: &mut Option<u64>, incoming: &Option<u64>) {
    *target = match (*target, *incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
}

/// A first-seen timestamp
pub(crate) fn prefer_min(target: &mut Option<u64>, incoming: &Option<u64>) {
    *target = match (*target, *incoming) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}

/// A height with its block hash; the higher height carries the current hash
pub(crate) fn advance_pair(
    field: &str,
    height: &mut Option<u64>,
    hash: &mut Option<String>,
    incoming_height: &Option<u64>,
    incoming_hash: &Option<String>,
) -> Result<(), MergeError> {
    match (*height, *incoming_height) {
        (Some(a), Some(b)) if b < a => Ok(()),
        (Some(a), Some(b)) if b > a => {
            // An older hash never pairs with a newer height
            *height = Some(b);
            *hash = incoming_hash.clone();
            Ok(())
        }
        (None, Some(b)) => {
            strict(field, hash, incoming_hash)?;
            *height = Some(b);
            Ok(())
        }
        _ => strict(field, hash, incoming_hash),
    }
}

/// Merge an optional sub-entity
pub(crate) fn nested<T: Merge + Clone>(
    field: &str,
    target: &mut Option<T>,
    incoming: &Option<T>,
) -> Result<(), MergeError> {
    match (target.as_mut(), incoming) {
        (_, None) => Ok(()),
        (None, Some(v)) => {
            *target = Some(v.clone());
            Ok(())
        }
        (Some(t), Some(v)) => t.merge_from(v).map_err(|e| e.within(field)),
    }
}

/// Merge lists element by element; lengths must agree
pub(crate) fn by_position<T: Merge + Clone>(
    field: &str,
    target: &mut Option<Vec<T>>,
    incoming: &Option<Vec<T>>,
) -> Result<(), MergeError> {
    match (target.as_mut(), incoming) {
        (_, None) => Ok(()),
        (None, Some(v)) => {
            *target = Some(v.clone());
            Ok(())
        }
        (Some(t), Some(v)) => {
            if t.len() != v.len() {
                return Err(MergeError::MergeConflict {
                    field: field.to_string(),
                    existing: format!("{} elements", t.len()),
                    incoming: format!("{} elements", v.len()),
                });
            }
            for (i, (a, b)) in t.iter_mut().zip(v).enumerate() {
                a.merge_from(b).map_err(|e| e.within(&format!("{}[{}]", field, i)))?;
            }
            Ok(())
        }
    }
}

/// Merge lists by an identity key; unmatched incoming elements are appended
///
/// Elements whose key is unknown match nothing and are appended as well.
pub(crate) fn by_key<T, K, F>(
    field: &str,
    target: &mut Option<Vec<T>>,
    incoming: &Option<Vec<T>>,
    key: F,
) -> Result<(), MergeError>
where
    T: Merge + Clone,
    K: PartialEq + Debug,
    F: Fn(&T) -> Option<K>,
{
    let Some(incoming) = incoming else {
        return Ok(());
    };
    let list = target.get_or_insert_with(Vec::new);
    for item in incoming {
        let Some(k) = key(item) else {
            list.push(item.clone());
            continue;
        };
        match list.iter_mut().find(|existing| key(existing).as_ref() == Some(&k)) {
            Some(existing) => existing
                .merge_from(item)
                .map_err(|e| e.within(&format!("{}[{:?}]", field, k)))?,
            None => list.push(item.clone()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_rule() {
        let mut target = None;
        strict("fee", &mut target, &Some(10u64)).unwrap();
        assert_eq!(target, Some(10));

        strict("fee", &mut target, &None).unwrap();
        assert_eq!(target, Some(10));

        let err = strict("fee", &mut target, &Some(20)).unwrap_err();
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
    fn test_directional_flags() {
        let mut flag = Some(false);
        prefer_true(&mut flag, &Some(true));
        assert_eq!(flag, Some(true));
        prefer_true(&mut flag, &Some(false));
        assert_eq!(flag, Some(true));

        let mut pool = Some(true);
        prefer_false(&mut pool, &Some(false));
        assert_eq!(pool, Some(false));

        let mut unknown = None;
        prefer_false(&mut unknown, &None);
        assert_eq!(unknown, None);
    }

    #[test]
    fn test_max_and_min() {
        let mut confirmations = Some(3);
        prefer_max(&mut confirmations, &Some(1));
        assert_eq!(confirmations, Some(3));

        let mut received = Some(100);
        prefer_min(&mut received, &Some(90));
        assert_eq!(received, Some(90));
        prefer_min(&mut received, &None);
        assert_eq!(received, Some(90));
    }

    #[test]
    fn test_advance_pair() {
        let mut height = Some(10);
        let mut hash = Some("a".to_string());
        advance_pair("max_used", &mut height, &mut hash, &Some(12), &Some("b".to_string())).unwrap();
        assert_eq!((height, hash.as_deref()), (Some(12), Some("b")));

        advance_pair("max_used", &mut height, &mut hash, &Some(11), &Some("c".to_string())).unwrap();
        assert_eq!(hash.as_deref(), Some("b"));

        assert!(advance_pair("max_used", &mut height, &mut hash, &Some(12), &Some("d".to_string())).is_err());
    }

    #[test]
    fn test_advance_pair_drops_stale_hash() {
        let mut height = Some(10);
        let mut hash = Some("a".to_string());
        advance_pair("max_used", &mut height, &mut hash, &Some(12), &None).unwrap();
        assert_eq!((height, hash.clone()), (Some(12), None));

        // The same height may fill the hash in later
        advance_pair("max_used", &mut height, &mut hash, &Some(12), &Some("b".to_string())).unwrap();
        assert_eq!((height, hash.as_deref()), (Some(12), Some("b")));
    }

    #[test]
    fn test_merge_tx_appends_unhashed() {
        let mut list = vec![Transaction::default()];
        merge_tx(&mut list, Transaction { fee: Some(1), ..Default::default() }).unwrap();
        merge_tx(&mut list, Transaction { fee: Some(2), ..Default::default() }).unwrap();
        assert_eq!(list.len(), 3);

        merge_tx(&mut list, Transaction::with_hash("a")).unwrap();
        merge_tx(&mut list, Transaction { fee: Some(3), ..Transaction::with_hash("a") }).unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[3].fee, Some(3));
    }

    #[test]
    fn test_by_key_appends_unkeyed() {
        let mut target = Some(vec![Transaction { fee: Some(1), ..Default::default() }]);
        let incoming = Some(vec![
            Transaction { fee: Some(2), ..Default::default() },
            Transaction::with_hash("a"),
        ]);
        by_key("txs", &mut target, &incoming, |tx: &Transaction| tx.hash.clone()).unwrap();
        let txs = target.unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].fee, Some(1));
        assert_eq!(txs[1].fee, Some(2));
    }

    #[test]
    fn test_within_prefixes_path() {
        let err = MergeError::conflict("amount", &1u64, &2u64).within("outputs[0]");
        assert!(matches!(err, MergeError::MergeConflict { field, .. } if field == "outputs[0].amount"));
    }
}
