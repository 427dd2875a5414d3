//! Transaction pool statistics and backlog

use crate::core::record::{array_of, deserialize_rpc, object, u64_of, EntityError, RpcEntity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate statistics of the node's transaction pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxPoolStats {
    #[serde(default, alias = "txs_total")]
    pub num_txs: Option<u64>,
    #[serde(default)]
    pub num_not_relayed: Option<u64>,
    #[serde(default)]
    pub num_failing: Option<u64>,
    #[serde(default)]
    pub num_double_spends: Option<u64>,
    /// Transactions older than ten minutes
    #[serde(default, alias = "num_10m")]
    pub num10m: Option<u64>,
    #[serde(default)]
    pub fee_total: Option<u64>,
    #[serde(default)]
    pub bytes_max: Option<u64>,
    #[serde(default)]
    pub bytes_med: Option<u64>,
    #[serde(default)]
    pub bytes_min: Option<u64>,
    #[serde(default)]
    pub bytes_total: Option<u64>,
    #[serde(default, alias = "histo_98pc")]
    pub histo98pc: Option<u64>,
    #[serde(default, alias = "oldest")]
    pub oldest_timestamp: Option<u64>,
}

impl RpcEntity for TxPoolStats {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        deserialize_rpc("pool stats", value)
    }
}

/// One entry of the pool backlog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBacklogEntry {
    pub weight: u64,
    pub fee: u64,
    pub time_in_pool: u64,
}

const BACKLOG_ENTRY_SIZE: usize = 24;

impl PoolBacklogEntry {
    /// Parse the `backlog` member of a `get_txpool_backlog` response
    ///
    /// The node packs entries as a blob of little-endian `u64` triples, which
    /// JSON carries as a string of byte-valued characters. Lists of objects
    /// are accepted as well.
    pub fn list_from_rpc(value: &Value) -> Result<Vec<PoolBacklogEntry>, EntityError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(packed) => {
                let bytes = packed
                    .chars()
                    .map(|c| {
                        u8::try_from(c as u32)
                            .map_err(|_| EntityError::invalid("backlog", "non-byte character in blob"))
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                Self::list_from_blob(&bytes)
            }
            _ => array_of("backlog", value)?
                .iter()
                .map(|entry| {
                    let entry = object("backlog entry", entry)?;
                    let field = |name: &str| -> Result<u64, EntityError> {
                        entry
                            .get(name)
                            .map(|v| u64_of(name, v))
                            .unwrap_or_else(|| Err(EntityError::invalid(name, "missing")))
                    };
                    Ok(PoolBacklogEntry {
                        weight: field("weight")?,
                        fee: field("fee")?,
                        time_in_pool: field("time_in_pool")?,
                    })
                })
                .collect(),
        }
    }

    /// Unpack a blob of `weight | fee | time_in_pool` little-endian triples
    pub fn list_from_blob(bytes: &[u8]) -> Result<Vec<PoolBacklogEntry>, EntityError> {
        if bytes.len() % BACKLOG_ENTRY_SIZE != 0 {
            return Err(EntityError::invalid(
                "backlog",
                format!("blob length {} is not a multiple of {}", bytes.len(), BACKLOG_ENTRY_SIZE),
            ));
        }
        Ok(bytes
            .chunks_exact(BACKLOG_ENTRY_SIZE)
            .map(|chunk| {
                let word = |i: usize| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(&chunk[i * 8..i * 8 + 8]);
                    u64::from_le_bytes(buf)
                };
                PoolBacklogEntry {
                    weight: word(0),
                    fee: word(1),
                    time_in_pool: word(2),
                }
            })
            .collect())
    }
}
