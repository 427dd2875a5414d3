//! Blocks and block headers as reported by the node

use crate::codec::{wire_to_json, WireValue};
use crate::core::record::{
    self, array_of, bool_of, nested_json, nonempty_string_of, object, opt_u128, string_list_of,
    string_of, u32_of, u64_of, unknown_field, with_low64, with_top64, wide_of, EntityError,
    RpcEntity,
};
use crate::core::transaction::Transaction;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Block Header
// =============================================================================

/// Block header; every field is optional because each query reveals a
/// different subset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_weight: Option<u64>,
    /// Blocks on top of this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u64>,
    #[serde(default, with = "opt_u128", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u128>,
    #[serde(default, with = "opt_u128", skip_serializing_if = "Option::is_none")]
    pub cumulative_difficulty: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_txs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphan_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pow_hash: Option<String>,
}

impl BlockHeader {
    /// Apply one node field; returns false when the key is not a header field
    pub(crate) fn apply_field(&mut self, key: &str, val: &Value) -> Result<bool, EntityError> {
        match key {
            "hash" => self.hash = Some(string_of(key, val)?),
            "height" => self.height = Some(u64_of(key, val)?),
            "timestamp" => self.timestamp = Some(u64_of(key, val)?),
            "block_size" | "size" => self.size = Some(u64_of(key, val)?),
            "block_weight" | "weight" => self.weight = Some(u64_of(key, val)?),
            "long_term_weight" => self.long_term_weight = Some(u64_of(key, val)?),
            "depth" => self.depth = Some(u64_of(key, val)?),
            "difficulty" => self.difficulty = with_low64(self.difficulty, u64_of(key, val)?),
            "difficulty_top64" => self.difficulty = with_top64(self.difficulty, u64_of(key, val)?),
            "wide_difficulty" => self.difficulty = Some(wide_of(key, val)?),
            "cumulative_difficulty" => {
                self.cumulative_difficulty = with_low64(self.cumulative_difficulty, u64_of(key, val)?)
            }
            "cumulative_difficulty_top64" => {
                self.cumulative_difficulty = with_top64(self.cumulative_difficulty, u64_of(key, val)?)
            }
            "wide_cumulative_difficulty" => self.cumulative_difficulty = Some(wide_of(key, val)?),
            "major_version" => self.major_version = Some(u32_of(key, val)?),
            "minor_version" => self.minor_version = Some(u32_of(key, val)?),
            "nonce" => self.nonce = Some(u32_of(key, val)?),
            "miner_tx_hash" => self.miner_tx_hash = nonempty_string_of(key, val)?,
            "num_txes" | "num_txs" => self.num_txs = Some(u32_of(key, val)?),
            "orphan_status" => self.orphan_status = Some(bool_of(key, val)?),
            "prev_hash" | "prev_id" => self.prev_hash = Some(string_of(key, val)?),
            "reward" => self.reward = Some(u64_of(key, val)?),
            "pow_hash" => self.pow_hash = nonempty_string_of(key, val)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Block time as a UTC datetime
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|t| i64::try_from(t).ok())
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
    }
}

impl RpcEntity for BlockHeader {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut header = BlockHeader::default();
        for (key, val) in object("block header", value)? {
            if !header.apply_field(key, val)? {
                unknown_field("block header", key);
            }
        }
        Ok(header)
    }
}

// =============================================================================
// Block
// =============================================================================

/// A block: header plus body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    /// Serialized block blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner_tx: Option<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hashes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txs: Option<Vec<Transaction>>,
}

impl Block {
    fn apply_rpc(&mut self, value: &Value) -> Result<(), EntityError> {
        for (key, val) in object("block", value)? {
            match key.as_str() {
                "blob" => self.hex = Some(string_of(key, val)?),
                "block_header" => {
                    for (hkey, hval) in object("block header", val)? {
                        if !self.header.apply_field(hkey, hval)? {
                            unknown_field("block header", hkey);
                        }
                    }
                }
                "tx_hashes" => self.tx_hashes = Some(string_list_of(key, val)?),
                "miner_tx" => {
                    let mut tx = Transaction::from_rpc(val)?;
                    tx.is_miner_tx = Some(true);
                    self.miner_tx = Some(tx);
                }
                "json" => {
                    if let Some(inner) = nested_json(key, val)? {
                        self.apply_rpc(&inner)?;
                    }
                }
                "status" | "untrusted" | "credits" | "top_hash" => {}
                _ => {
                    if !self.header.apply_field(key, val)? {
                        unknown_field("block", key);
                    }
                }
            }
        }
        if let (Some(tx), Some(hash)) = (self.miner_tx.as_mut(), self.header.miner_tx_hash.as_ref()) {
            if tx.hash.is_none() {
                tx.hash = Some(hash.clone());
            }
        }
        Ok(())
    }

    /// Build a block from one entry of a batched block response
    ///
    /// Transactions are seeded as confirmed members of this block: their hash
    /// comes from the block's `tx_hashes` and they carry a copy of its header.
    pub fn from_batch_entry(
        block: &WireValue,
        txs: &[WireValue],
        height: Option<u64>,
    ) -> Result<Block, EntityError> {
        let mut result = Block::from_wire(block)?;
        if result.header.height.is_none() {
            result.header.height = height;
        }

        // Blob-only entries carry no hash list; their transactions stay unhashed
        let hashes: Vec<Option<String>> = match &result.tx_hashes {
            Some(hashes) if hashes.len() != txs.len() && !txs.is_empty() => {
                return Err(EntityError::invalid(
                    "txs",
                    format!("{} transactions for {} hashes", txs.len(), hashes.len()),
                ));
            }
            Some(hashes) => hashes.iter().cloned().map(Some).collect(),
            None => vec![None; txs.len()],
        };

        let mut seeded = Vec::with_capacity(txs.len());
        for (tx_value, hash) in txs.iter().zip(hashes) {
            let mut tx = Transaction::confirmed_in(&result.header);
            tx.hash = hash;
            tx.apply_rpc(&wire_to_json(tx_value))?;
            seeded.push(tx);
        }
        result.txs = Some(seeded);
        Ok(result)
    }

    /// Hashes of every transaction including the miner transaction
    pub fn all_tx_hashes(&self) -> Vec<String> {
        let mut hashes = Vec::new();
        if let Some(hash) = &self.header.miner_tx_hash {
            hashes.push(hash.clone());
        }
        hashes.extend(self.tx_hashes.iter().flatten().cloned());
        hashes
    }
}

impl RpcEntity for Block {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut block = Block::default();
        block.apply_rpc(value)?;
        Ok(block)
    }
}

/// Parse the `headers` array of a ranged header response
pub(crate) fn headers_of(value: &Value) -> Result<Vec<BlockHeader>, EntityError> {
    let Some(list) = value.get("headers") else {
        return Ok(Vec::new());
    };
    array_of("headers", list)?
        .iter()
        .map(BlockHeader::from_rpc)
        .collect()
}

/// Parse the `block_header` member of a header response
pub(crate) fn header_of(value: &Value) -> Result<BlockHeader, EntityError> {
    let header = value
        .get("block_header")
        .ok_or_else(|| record::EntityError::invalid("block_header", "missing"))?;
    BlockHeader::from_rpc(header)
}
