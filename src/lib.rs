//! Daemon Client: talk to a Monero-style node from Rust
//!
//! This crate provides:
//! - The portable storage binary codec (bytes to value tree and back)
//! - Typed entities for blocks, transactions, transfers, outputs and node state
//! - Query filters over transactions, transfers and outputs
//! - Reconciliation of partial transaction views into one record
//! - An async daemon contract with a JSON-RPC implementation, ranged block
//!   retrieval under a byte budget and block notifications
//! - A cryptography provider boundary for address validation and storage
//!
//! # Example
//!
//! ```rust
//! use daemon_client::core::Transaction;
//! use daemon_client::filter::{Filter, TransactionFilter};
//! use daemon_client::merge::merge_tx;
//!
//! // Two views of the same transaction
//! let mut pool_view = Transaction::with_hash("abc123");
//! pool_view.in_tx_pool = Some(true);
//! let mut fee_view = Transaction::with_hash("abc123");
//! fee_view.fee = Some(10);
//!
//! let mut txs = Vec::new();
//! merge_tx(&mut txs, pool_view).unwrap();
//! merge_tx(&mut txs, fee_view).unwrap();
//! assert_eq!(txs.len(), 1);
//! assert_eq!(txs[0].fee, Some(10));
//!
//! // Select it by hash
//! let filter = TransactionFilter::builder()
//!     .tx_ids(vec!["abc123".to_string()])
//!     .build()
//!     .unwrap();
//! assert_eq!(filter.apply(&txs[..]).len(), 1);
//! ```

pub mod cli;
pub mod codec;
pub mod core;
pub mod daemon;
pub mod filter;
pub mod merge;
pub mod provider;

// Re-export commonly used types
pub use codec::{decode, decode_blocks_batch, encode, BlocksBatch, CodecError, WireValue};
pub use core::{Block, BlockHeader, NetworkType, Output, Transaction};
pub use daemon::{Daemon, DaemonConfig, DaemonError, RpcDaemon};
pub use filter::{Filter, FilterError, OutputFilter, TransactionFilter, TransferFilter};
pub use merge::{merge, merge_tx, Merge, MergeError};
pub use provider::{CryptoProvider, NativeProvider, ProviderError, ProviderHandle};
