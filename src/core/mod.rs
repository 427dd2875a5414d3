//! Entity model
//!
//! Records reported by the node and by wallets:
//! - Blocks and block headers
//! - Transactions with inputs, outputs and wallet transfers
//! - Pool statistics and backlog
//! - Node status (info, sync state, peers, bans, fees, hard forks, versions)
//!
//! Every field is optional: a value the current query did not reveal is
//! unknown, which is distinct from zero or false.

pub mod block;
pub mod info;
pub mod output;
pub mod pool;
pub mod record;
pub mod transaction;
pub mod transfer;

pub use block::{Block, BlockHeader};
pub use info::{
    Ban, ConnectionSpan, DaemonInfo, FeeEstimate, HardForkInfo, KeyImageSpentStatus, NetworkType,
    Peer, SubmitTxResult, SyncInfo, Version,
};
pub use output::Output;
pub use pool::{PoolBacklogEntry, TxPoolStats};
pub use record::{EntityError, RpcEntity};
pub use transaction::{payment_ids_equal, Transaction};
pub use transfer::{Destination, IncomingTransfer, OutgoingTransfer, TransferRef};
