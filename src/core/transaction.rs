//! Transactions as observed through the node
//!
//! A transaction is identified by its hash. Different queries (pool listing,
//! block retrieval, `get_transactions`) each reveal a subset of its fields;
//! every field is therefore optional and views are reconciled by merging.

use crate::core::block::BlockHeader;
use crate::core::output::Output;
use crate::core::record::{
    array_of, bool_of, is_zero_hash, nested_json, nonempty_string_of, object, string_list_of,
    string_of, u32_of, u64_list_of, u64_of, unknown_field, EntityError, RpcEntity,
};
use crate::core::transfer::{IncomingTransfer, OutgoingTransfer, TransferRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Transaction
// =============================================================================

/// A transaction with every field the node or a wallet may report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_miner_tx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_size: Option<u32>,
    /// Whether the node may relay it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_relayed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_confirmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_tx_pool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_confirmations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_relayed_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_double_spend_seen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_kept_by_block: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_failed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_used_block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_used_block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
    /// Full serialized transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pruned_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prunable_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prunable_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Output>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Output>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_indices: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rct_signatures: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rct_sig_prunable: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,
    /// Copy of the containing block's header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_transfers: Option<Vec<IncomingTransfer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_transfer: Option<OutgoingTransfer>,
}

impl Transaction {
    /// Transaction with only its hash known
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            ..Default::default()
        }
    }

    /// Seed for a transaction retrieved as part of a confirmed block
    pub fn confirmed_in(header: &BlockHeader) -> Self {
        Self {
            is_confirmed: Some(true),
            in_tx_pool: Some(false),
            is_miner_tx: Some(false),
            relay: Some(true),
            is_relayed: Some(true),
            is_failed: Some(false),
            is_double_spend_seen: Some(false),
            block: Some(header.clone()),
            ..Default::default()
        }
    }

    /// Height of the containing block
    pub fn height(&self) -> Option<u64> {
        self.block.as_ref().and_then(|b| b.height)
    }

    /// Outgoing transfer first, then incoming transfers in order
    pub fn transfers(&self) -> impl Iterator<Item = TransferRef<'_>> {
        self.outgoing_transfer
            .iter()
            .map(TransferRef::Outgoing)
            .chain(self.incoming_transfers.iter().flatten().map(TransferRef::Incoming))
    }

    /// Apply a node JSON record, then settle fields implied by the result
    pub fn apply_rpc(&mut self, value: &Value) -> Result<(), EntityError> {
        self.apply_fields(value)?;
        self.finalize()
    }

    fn apply_fields(&mut self, value: &Value) -> Result<(), EntityError> {
        for (key, val) in object("transaction", value)? {
            let key = key.as_str();
            match key {
                "tx_hash" | "id_hash" => self.hash = Some(string_of(key, val)?),
                "block_height" => self.header_mut().height = Some(u64_of(key, val)?),
                "block_timestamp" => self.header_mut().timestamp = Some(u64_of(key, val)?),
                "confirmations" => self.num_confirmations = Some(u64_of(key, val)?),
                "in_pool" => {
                    let in_pool = bool_of(key, val)?;
                    self.in_tx_pool = Some(in_pool);
                    self.is_confirmed = Some(!in_pool);
                }
                "double_spend_seen" => self.is_double_spend_seen = Some(bool_of(key, val)?),
                "do_not_relay" => self.relay = Some(!bool_of(key, val)?),
                "relayed" => self.is_relayed = Some(bool_of(key, val)?),
                "kept_by_block" => self.is_kept_by_block = Some(bool_of(key, val)?),
                "receive_time" => self.received_timestamp = Some(u64_of(key, val)?),
                "last_relayed_time" => self.last_relayed_timestamp = Some(u64_of(key, val)?),
                "last_failed_height" => {
                    let height = u64_of(key, val)?;
                    if height == 0 {
                        self.is_failed = Some(false);
                    } else {
                        self.is_failed = Some(true);
                        self.last_failed_height = Some(height);
                    }
                }
                "last_failed_id_hash" => {
                    let hash = string_of(key, val)?;
                    if is_zero_hash(&hash) {
                        self.is_failed.get_or_insert(false);
                    } else {
                        self.is_failed = Some(true);
                        self.last_failed_hash = Some(hash);
                    }
                }
                "max_used_block_height" => self.max_used_block_height = Some(u64_of(key, val)?),
                "max_used_block_id_hash" => {
                    self.max_used_block_hash = Some(string_of(key, val)?)
                }
                "as_hex" | "tx_blob" => self.full_hex = nonempty_string_of(key, val)?.or(self.full_hex.take()),
                "pruned_as_hex" => self.pruned_hex = nonempty_string_of(key, val)?.or(self.pruned_hex.take()),
                "prunable_as_hex" => {
                    self.prunable_hex = nonempty_string_of(key, val)?.or(self.prunable_hex.take())
                }
                "prunable_hash" => {
                    self.prunable_hash = nonempty_string_of(key, val)?.or(self.prunable_hash.take())
                }
                "as_json" | "tx_json" => {
                    if let Some(inner) = nested_json(key, val)? {
                        self.apply_fields(&inner)?;
                    }
                }
                "version" => self.version = Some(u32_of(key, val)?),
                "unlock_time" => self.unlock_time = Some(u64_of(key, val)?),
                "extra" => self.extra = Some(extra_of(key, val)?),
                "vin" => self.apply_inputs(val)?,
                "vout" => {
                    let outputs = array_of(key, val)?
                        .iter()
                        .map(Output::from_rpc_output)
                        .collect::<Result<Vec<_>, _>>()?;
                    self.outputs = Some(outputs);
                }
                "rct_signatures" => {
                    if let Some(fee) = val.get("txnFee") {
                        self.fee = Some(u64_of("txnFee", fee)?);
                    }
                    self.rct_signatures = Some(val.clone());
                }
                "rctsig_prunable" => self.rct_sig_prunable = Some(val.clone()),
                "signatures" => self.signatures = Some(string_list_of(key, val)?),
                "output_indices" => self.output_indices = Some(u64_list_of(key, val)?),
                "blob_size" | "size" => self.size = Some(u64_of(key, val)?),
                "weight" => self.weight = Some(u64_of(key, val)?),
                "fee" => self.fee = Some(u64_of(key, val)?),
                "payment_id" => {
                    let id = string_of(key, val)?;
                    self.payment_id = if id.is_empty() || is_zero_hash(&id) { None } else { Some(id) };
                }
                "status" | "untrusted" | "credits" | "top_hash" => {}
                _ => unknown_field("transaction", key),
            }
        }
        Ok(())
    }

    fn apply_inputs(&mut self, val: &Value) -> Result<(), EntityError> {
        let entries = array_of("vin", val)?;
        // A lone `gen` input marks a coinbase transaction
        if entries.len() == 1 && entries[0].get("gen").is_some() {
            self.is_miner_tx = Some(true);
            return Ok(());
        }
        let inputs = entries
            .iter()
            .map(Output::from_rpc_input)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = inputs.first() {
            self.ring_size = first
                .ring_output_indices
                .as_ref()
                .and_then(|r| u32::try_from(r.len()).ok());
        }
        self.inputs = Some(inputs);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), EntityError> {
        if self.is_confirmed == Some(true) {
            self.is_relayed = Some(true);
            self.relay = Some(true);
            self.is_failed = Some(false);
        } else {
            self.num_confirmations = Some(0);
        }
        if self.is_failed.is_none() {
            self.is_failed = Some(false);
        }

        if let (Some(indices), Some(outputs)) = (&self.output_indices, self.outputs.as_mut()) {
            if indices.len() != outputs.len() {
                return Err(EntityError::invalid(
                    "output_indices",
                    format!("{} indices for {} outputs", indices.len(), outputs.len()),
                ));
            }
            for (output, index) in outputs.iter_mut().zip(indices) {
                output.index = Some(*index);
            }
        }

        if self.is_relayed != Some(true) {
            self.last_relayed_timestamp = None;
        }
        Ok(())
    }

    fn header_mut(&mut self) -> &mut BlockHeader {
        self.block.get_or_insert_with(BlockHeader::default)
    }
}

impl RpcEntity for Transaction {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut tx = Transaction::default();
        tx.apply_rpc(value)?;
        Ok(tx)
    }
}

/// `extra` is a list of byte values (or a hex string in some responses)
fn extra_of(field: &str, value: &Value) -> Result<Vec<u8>, EntityError> {
    match value {
        Value::String(s) => hex::decode(s).map_err(|e| EntityError::invalid(field, e.to_string())),
        _ => array_of(field, value)?
            .iter()
            .map(|v| {
                let byte = u64_of(field, v)?;
                u8::try_from(byte).map_err(|_| EntityError::invalid(field, format!("{} is not a byte", byte)))
            })
            .collect(),
    }
}

// =============================================================================
// Payment IDs
// =============================================================================

/// Compare payment ids with zero-padding equivalence
///
/// A short id equals a long id when the long one starts with it (ignoring
/// ASCII case) and every remaining character is `'0'`.
pub fn payment_ids_equal(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let (head, tail) = long.as_bytes().split_at(short.len());
    head.eq_ignore_ascii_case(short.as_bytes()) && tail.iter().all(|&c| c == b'0')
}
