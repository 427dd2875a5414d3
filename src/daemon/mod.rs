//! Remote daemon contract
//!
//! [`Daemon`] is the transport-agnostic, asynchronous command set of a node.
//! [`RpcDaemon`] implements it over the node's HTTP interface:
//! - JSON-RPC 2.0 at `/json_rpc`
//! - Plain JSON endpoints such as `/get_height` and `/get_transactions`
//! - Portable storage endpoints such as `/get_blocks_by_height.bin`

pub mod config;
pub mod listener;
pub mod range;
pub mod rpc;

pub use config::{ConfigError, DaemonConfig};
pub use listener::{BlockListener, BlockNotifier, BlockPoller};
pub use range::{ChunkPlanner, RangeFetcher, RangeSource};
pub use rpc::RpcDaemon;

use crate::codec::CodecError;
use crate::core::{
    Ban, Block, BlockHeader, DaemonInfo, EntityError, FeeEstimate, HardForkInfo,
    KeyImageSpentStatus, Peer, PoolBacklogEntry, SubmitTxResult, SyncInfo, Transaction,
    TxPoolStats, Version,
};
use crate::merge::MergeError;
use crate::provider::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Daemon errors
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Node returned status '{0}'")]
    Status(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Block {height} of {size} bytes exceeds the {budget} byte request budget")]
    BlockExceedsBudget { height: u64, size: u64, budget: u64 },
    #[error("Range fetch {start}..={end} aborted: {source}")]
    RangeFetchAborted {
        start: u64,
        end: u64,
        source: Box<DaemonError>,
    },
    #[error("Request cancelled")]
    Cancelled,
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DaemonError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DaemonError::Transport(_) => true,
            DaemonError::RangeFetchAborted { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DaemonError {
    fn from(e: reqwest::Error) -> Self {
        DaemonError::Transport(e.to_string())
    }
}

// =============================================================================
// Daemon Contract
// =============================================================================

/// Command set of a remote node
///
/// Batch operations answer in request order, one entry per request item.
/// `get_txs` and `get_tx_hexes` hold `None` where the node does not know the
/// hash.
#[async_trait]
pub trait Daemon: Send + Sync {
    async fn get_height(&self) -> Result<u64, DaemonError>;

    async fn get_last_block_header(&self) -> Result<BlockHeader, DaemonError>;

    async fn get_block_hash(&self, height: u64) -> Result<String, DaemonError>;

    async fn get_block_header_by_hash(&self, hash: &str) -> Result<BlockHeader, DaemonError>;

    async fn get_block_header_by_height(&self, height: u64) -> Result<BlockHeader, DaemonError>;

    /// Headers of heights `start..=end`
    async fn get_block_headers_by_range(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError>;

    async fn get_block_by_hash(&self, hash: &str) -> Result<Block, DaemonError>;

    async fn get_block_by_height(&self, height: u64) -> Result<Block, DaemonError>;

    /// Blocks with their transactions, one per requested height
    async fn get_blocks_by_height(&self, heights: &[u64]) -> Result<Vec<Block>, DaemonError>;

    /// Blocks `start..=end`; defaults are genesis and the current tip
    async fn get_blocks_by_range(&self, start: Option<u64>, end: Option<u64>) -> Result<Vec<Block>, DaemonError>;

    async fn get_tx(&self, hash: &str, prune: bool) -> Result<Option<Transaction>, DaemonError> {
        let txs = self.get_txs(&[hash.to_string()], prune).await?;
        Ok(txs.into_iter().next().flatten())
    }

    async fn get_txs(&self, hashes: &[String], prune: bool) -> Result<Vec<Option<Transaction>>, DaemonError>;

    async fn get_tx_hex(&self, hash: &str, prune: bool) -> Result<Option<String>, DaemonError> {
        let hexes = self.get_tx_hexes(&[hash.to_string()], prune).await?;
        Ok(hexes.into_iter().next().flatten())
    }

    async fn get_tx_hexes(&self, hashes: &[String], prune: bool) -> Result<Vec<Option<String>>, DaemonError>;

    async fn get_tx_pool(&self) -> Result<Vec<Transaction>, DaemonError>;

    async fn get_tx_pool_hashes(&self) -> Result<Vec<String>, DaemonError>;

    async fn get_tx_pool_stats(&self) -> Result<TxPoolStats, DaemonError>;

    async fn get_tx_pool_backlog(&self) -> Result<Vec<PoolBacklogEntry>, DaemonError>;

    /// Remove transactions from the pool; an empty list flushes everything
    async fn flush_tx_pool(&self, hashes: &[String]) -> Result<(), DaemonError>;

    async fn get_key_image_spent_statuses(&self, key_images: &[String]) -> Result<Vec<KeyImageSpentStatus>, DaemonError>;

    async fn get_fee_estimate(&self, grace_blocks: Option<u64>) -> Result<FeeEstimate, DaemonError>;

    async fn submit_tx_hex(&self, hex: &str, do_not_relay: bool) -> Result<SubmitTxResult, DaemonError>;

    async fn relay_txs_by_hash(&self, hashes: &[String]) -> Result<(), DaemonError>;

    async fn get_info(&self) -> Result<DaemonInfo, DaemonError>;

    async fn get_sync_info(&self) -> Result<SyncInfo, DaemonError>;

    async fn get_hard_fork_info(&self) -> Result<HardForkInfo, DaemonError>;

    async fn get_version(&self) -> Result<Version, DaemonError>;

    async fn is_trusted(&self) -> Result<bool, DaemonError>;

    /// Live peer connections
    async fn get_peers(&self) -> Result<Vec<Peer>, DaemonError>;

    /// Peers from the node's address book
    async fn get_known_peers(&self) -> Result<Vec<Peer>, DaemonError>;

    async fn get_peer_bans(&self) -> Result<Vec<Ban>, DaemonError>;

    async fn set_peer_bans(&self, bans: &[Ban]) -> Result<(), DaemonError>;

    /// Register a listener for new blocks
    fn add_block_listener(&self, listener: Arc<dyn BlockListener>);

    /// Unregister a listener by identity; returns whether it was registered
    fn remove_block_listener(&self, listener: &Arc<dyn BlockListener>) -> bool;
}
