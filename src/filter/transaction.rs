//! Transaction filter
//!
//! Clauses are evaluated cheapest first: presence flags, id sets, height
//! bounds, the template, then nested transfer and output filters.

use crate::core::{payment_ids_equal, Transaction};
use crate::filter::{from_json, in_set, Filter, FilterError, OutputFilter, TransferFilter};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Template fields must be unset or equal on the candidate
macro_rules! template_matches {
    ($template:expr, $candidate:expr, [$($field:ident),+ $(,)?]) => {
        true $(&& match &$template.$field {
            None => true,
            Some(expected) => $candidate.$field.as_ref() == Some(expected),
        })+
    };
}

/// Unvalidated transaction filter fields; also the filter's JSON shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionFilterBuilder {
    /// Scalar fields a candidate must share
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "strict_template"
    )]
    pub template: Option<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_filter: Option<TransferFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filter: Option<OutputFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_payment_id: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_outgoing_transfer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_incoming_transfers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u64>,
}

/// Deserialize a template, refusing keys that are not transaction fields
///
/// A key survives a round trip through [`Transaction`] only if it names a
/// field; `null` values constrain nothing and are let through.
fn strict_template<'de, D>(deserializer: D) -> Result<Option<Transaction>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Map<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let tx: Transaction = serde_json::from_value(Value::Object(raw.clone())).map_err(D::Error::custom)?;
    let known = serde_json::to_value(&tx).map_err(D::Error::custom)?;
    if let Some(key) = raw
        .iter()
        .find(|(key, value)| !value.is_null() && known.get(key.as_str()).is_none())
        .map(|(key, _)| key)
    {
        return Err(D::Error::custom(format!("unknown template field '{}'", key)));
    }
    Ok(Some(tx))
}

impl TransactionFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(mut self, tx: Transaction) -> Self {
        self.template = Some(tx);
        self
    }

    pub fn transfer_filter(mut self, filter: TransferFilter) -> Self {
        self.transfer_filter = Some(filter);
        self
    }

    pub fn output_filter(mut self, filter: OutputFilter) -> Self {
        self.output_filter = Some(filter);
        self
    }

    pub fn has_payment_id(mut self, v: bool) -> Self {
        self.has_payment_id = Some(v);
        self
    }

    pub fn has_outgoing_transfer(mut self, v: bool) -> Self {
        self.has_outgoing_transfer = Some(v);
        self
    }

    pub fn has_incoming_transfers(mut self, v: bool) -> Self {
        self.has_incoming_transfers = Some(v);
        self
    }

    pub fn tx_ids(mut self, ids: Vec<String>) -> Self {
        self.tx_ids = Some(ids);
        self
    }

    pub fn payment_ids(mut self, ids: Vec<String>) -> Self {
        self.payment_ids = Some(ids);
        self
    }

    pub fn height(mut self, v: u64) -> Self {
        self.height = Some(v);
        self
    }

    pub fn min_height(mut self, v: u64) -> Self {
        self.min_height = Some(v);
        self
    }

    pub fn max_height(mut self, v: u64) -> Self {
        self.max_height = Some(v);
        self
    }

    pub fn build(self) -> Result<TransactionFilter, FilterError> {
        TransactionFilter::try_from(self)
    }
}

/// Validated transaction filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionFilterBuilder", into = "TransactionFilterBuilder")]
pub struct TransactionFilter {
    fields: TransactionFilterBuilder,
}

impl TryFrom<TransactionFilterBuilder> for TransactionFilter {
    type Error = FilterError;

    fn try_from(fields: TransactionFilterBuilder) -> Result<Self, Self::Error> {
        if let Some(template) = &fields.template {
            let relations = [
                ("inputs", template.inputs.is_some()),
                ("outputs", template.outputs.is_some()),
                ("incoming_transfers", template.incoming_transfers.is_some()),
                ("outgoing_transfer", template.outgoing_transfer.is_some()),
                ("block", template.block.is_some()),
            ];
            if let Some((name, _)) = relations.iter().find(|(_, set)| *set) {
                return Err(FilterError::invalid(format!(
                    "template cannot constrain '{}'; use the nested filters or height bounds",
                    name
                )));
            }
        }

        if let (Some(min), Some(max)) = (fields.min_height, fields.max_height) {
            if min > max {
                return Err(FilterError::invalid(format!(
                    "min_height {} exceeds max_height {}",
                    min, max
                )));
            }
        }
        if let Some(height) = fields.height {
            if fields.min_height.is_some_and(|min| height < min)
                || fields.max_height.is_some_and(|max| height > max)
            {
                return Err(FilterError::invalid(format!(
                    "height {} outside [min_height, max_height]",
                    height
                )));
            }
        }

        Ok(Self { fields })
    }
}

impl From<TransactionFilter> for TransactionFilterBuilder {
    fn from(filter: TransactionFilter) -> Self {
        filter.fields
    }
}

impl TryFrom<&Value> for TransactionFilter {
    type Error = FilterError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        from_json::<TransactionFilterBuilder, _>(value)
    }
}

impl TransactionFilter {
    pub fn builder() -> TransactionFilterBuilder {
        TransactionFilterBuilder::new()
    }

    pub fn fields(&self) -> &TransactionFilterBuilder {
        &self.fields
    }

    pub fn transfer_filter(&self) -> Option<&TransferFilter> {
        self.fields.transfer_filter.as_ref()
    }

    pub fn output_filter(&self) -> Option<&OutputFilter> {
        self.fields.output_filter.as_ref()
    }

    fn presence_matches(&self, tx: &Transaction) -> bool {
        let f = &self.fields;
        let has_incoming = tx.incoming_transfers.as_ref().is_some_and(|t| !t.is_empty());
        f.has_payment_id.map_or(true, |v| tx.payment_id.is_some() == v)
            && f.has_outgoing_transfer.map_or(true, |v| tx.outgoing_transfer.is_some() == v)
            && f.has_incoming_transfers.map_or(true, |v| has_incoming == v)
    }

    fn ids_match(&self, tx: &Transaction) -> bool {
        let f = &self.fields;
        if !in_set(&f.tx_ids, tx.hash.as_ref()) {
            return false;
        }
        match (&f.payment_ids, &tx.payment_id) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(ids), Some(id)) => ids.iter().any(|wanted| payment_ids_equal(wanted, id)),
        }
    }

    fn height_matches(&self, tx: &Transaction) -> bool {
        let f = &self.fields;
        if f.height.is_none() && f.min_height.is_none() && f.max_height.is_none() {
            return true;
        }
        let Some(height) = tx.height() else {
            return false;
        };
        f.height.map_or(true, |h| height == h)
            && f.min_height.map_or(true, |min| height >= min)
            && f.max_height.map_or(true, |max| height <= max)
    }

    fn template_matches(&self, tx: &Transaction) -> bool {
        let Some(template) = &self.fields.template else {
            return true;
        };
        let payment_id_matches = match (&template.payment_id, &tx.payment_id) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(actual)) => payment_ids_equal(expected, actual),
        };
        payment_id_matches
            && template_matches!(template, tx, [
                hash,
                version,
                is_miner_tx,
                fee,
                ring_size,
                relay,
                is_relayed,
                is_confirmed,
                in_tx_pool,
                num_confirmations,
                unlock_time,
                last_relayed_timestamp,
                received_timestamp,
                is_double_spend_seen,
                is_kept_by_block,
                is_failed,
                last_failed_height,
                last_failed_hash,
                max_used_block_height,
                max_used_block_hash,
                is_locked,
                full_hex,
                pruned_hex,
                prunable_hex,
                prunable_hash,
                size,
                weight,
                extra,
                output_indices,
                rct_signatures,
                rct_sig_prunable,
                signatures,
            ])
    }

    fn transfers_match(&self, tx: &Transaction) -> bool {
        match &self.fields.transfer_filter {
            None => true,
            Some(filter) => tx.transfers().any(|t| filter.meets_criteria(&t)),
        }
    }

    fn outputs_match(&self, tx: &Transaction) -> bool {
        match &self.fields.output_filter {
            None => true,
            Some(filter) => tx
                .outputs
                .iter()
                .flatten()
                .any(|output| filter.meets_criteria(output)),
        }
    }
}

impl Filter<Transaction> for TransactionFilter {
    fn meets_criteria(&self, tx: &Transaction) -> bool {
        self.presence_matches(tx)
            && self.ids_match(tx)
            && self.height_matches(tx)
            && self.template_matches(tx)
            && self.transfers_match(tx)
            && self.outputs_match(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BlockHeader, IncomingTransfer, OutgoingTransfer, Output};
    use serde_json::json;

    fn confirmed(hash: &str, height: u64) -> Transaction {
        Transaction {
            hash: Some(hash.to_string()),
            is_confirmed: Some(true),
            block: Some(BlockHeader {
                height: Some(height),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TransactionFilter::default();
        assert!(filter.meets_criteria(&Transaction::default()));
        assert!(filter.meets_criteria(&confirmed("a", 1)));
    }

    #[test]
    fn test_template_clause() {
        let filter = TransactionFilter::builder()
            .template(Transaction {
                is_confirmed: Some(true),
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(filter.meets_criteria(&confirmed("a", 1)));
        assert!(!filter.meets_criteria(&Transaction::with_hash("b")));
    }

    #[test]
    fn test_template_payment_id_padding() {
        let filter = TransactionFilter::builder()
            .template(Transaction {
                payment_id: Some("03284e41c342f032".to_string()),
                ..Default::default()
            })
            .build()
            .unwrap();
        let tx = Transaction {
            payment_id: Some(format!("03284e41c342f032{}", "0".repeat(48))),
            ..Default::default()
        };
        assert!(filter.meets_criteria(&tx));
    }

    #[test]
    fn test_height_clauses_require_a_block() {
        let filter = TransactionFilter::builder().min_height(0).build().unwrap();
        assert!(filter.meets_criteria(&confirmed("a", 0)));
        assert!(!filter.meets_criteria(&Transaction::with_hash("pool")));

        let filter = TransactionFilter::builder()
            .min_height(10)
            .max_height(20)
            .build()
            .unwrap();
        let txs = vec![confirmed("a", 9), confirmed("b", 10), confirmed("c", 20), confirmed("d", 21)];
        let hashes: Vec<_> = filter.apply(&txs[..]).iter().filter_map(|t| t.hash.clone()).collect();
        assert_eq!(hashes, vec!["b", "c"]);
    }

    #[test]
    fn test_set_membership() {
        let filter = TransactionFilter::builder()
            .tx_ids(vec!["a".to_string(), "c".to_string()])
            .build()
            .unwrap();
        assert!(filter.meets_criteria(&confirmed("a", 1)));
        assert!(!filter.meets_criteria(&confirmed("b", 1)));
        assert!(!filter.meets_criteria(&Transaction::default()));

        let filter = TransactionFilter::builder()
            .payment_ids(vec!["aa".to_string()])
            .build()
            .unwrap();
        assert!(!filter.meets_criteria(&Transaction::default()));
    }

    #[test]
    fn test_presence_clauses() {
        let with_incoming = Transaction {
            incoming_transfers: Some(vec![IncomingTransfer::default()]),
            ..Default::default()
        };
        let filter = TransactionFilter::builder().has_incoming_transfers(true).build().unwrap();
        assert!(filter.meets_criteria(&with_incoming));
        assert!(!filter.meets_criteria(&Transaction::default()));

        let filter = TransactionFilter::builder().has_outgoing_transfer(false).build().unwrap();
        assert!(filter.meets_criteria(&with_incoming));
    }

    #[test]
    fn test_nested_transfer_clause() {
        let filter = TransactionFilter::builder()
            .transfer_filter(TransferFilter::builder().account_index(1).build().unwrap())
            .build()
            .unwrap();

        let tx = Transaction {
            outgoing_transfer: Some(OutgoingTransfer {
                account_index: Some(0),
                ..Default::default()
            }),
            incoming_transfers: Some(vec![IncomingTransfer {
                account_index: Some(1),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(filter.meets_criteria(&tx));
        // No transfers at all fails a nested clause
        assert!(!filter.meets_criteria(&Transaction::default()));
    }

    #[test]
    fn test_nested_output_clause() {
        let filter = TransactionFilter::builder()
            .output_filter(OutputFilter::builder().is_spent(false).build().unwrap())
            .build()
            .unwrap();
        let tx = Transaction {
            outputs: Some(vec![Output {
                is_spent: Some(false),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(filter.meets_criteria(&tx));
        assert!(!filter.meets_criteria(&Transaction::default()));
    }

    #[test]
    fn test_invalid_states() {
        assert!(TransactionFilter::builder().min_height(5).max_height(4).build().is_err());
        assert!(TransactionFilter::builder().height(3).min_height(5).build().is_err());
        assert!(TransactionFilter::builder()
            .template(Transaction {
                outputs: Some(vec![]),
                ..Default::default()
            })
            .build()
            .is_err());
    }

    #[test]
    fn test_from_json() {
        let filter = TransactionFilter::try_from(&json!({
            "template": {"is_confirmed": true},
            "transfer_filter": {"is_incoming": true},
            "min_height": 10
        }))
        .unwrap();
        assert_eq!(filter.fields().min_height, Some(10));
        assert!(filter.transfer_filter().is_some());

        // Nested filters are validated too
        assert!(TransactionFilter::try_from(&json!({
            "transfer_filter": {"is_incoming": true, "is_outgoing": true}
        }))
        .is_err());
        assert!(TransactionFilter::try_from(&json!({"template": 5})).is_err());
        assert!(TransactionFilter::try_from(&json!({"heigth": 5})).is_err());
    }

    #[test]
    fn test_misspelled_template_field_rejected() {
        let err = TransactionFilter::try_from(&json!({"template": {"is_confirmd": true}})).unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilterState(msg) if msg.contains("is_confirmd")));

        // Known fields and explicit nulls still build
        let filter = TransactionFilter::try_from(&json!({
            "template": {"is_confirmed": true, "fee": null}
        }))
        .unwrap();
        let mut unconfirmed = Transaction::with_hash("a");
        unconfirmed.is_confirmed = Some(false);
        assert!(!filter.meets_criteria(&unconfirmed));
        assert!(TransactionFilter::try_from(&json!({"template": null})).unwrap().fields().template.is_none());
    }

    #[test]
    fn test_payment_id_set_with_multibyte_ids() {
        let filter = TransactionFilter::builder().payment_ids(vec!["é".to_string()]).build().unwrap();
        let tx = Transaction {
            payment_id: Some("aé".to_string()),
            ..Transaction::with_hash("a")
        };
        assert!(!filter.meets_criteria(&tx));
    }
}
