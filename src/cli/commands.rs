//! CLI commands for the daemon client
//!
//! Offline commands work on files; the others query a node through a
//! [`RpcDaemon`].

use crate::codec::{json_to_wire, wire_to_json};
use crate::core::{Block, BlockHeader, NetworkType, Transaction};
use crate::daemon::{BlockListener, Daemon, DaemonConfig, RpcDaemon};
use crate::filter::{Filter, TransactionFilter};
use crate::provider::native::decode_address;
use crate::provider::ProviderHandle;
use bytes::Bytes;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Daemon config from an optional file with an optional URL override
pub fn load_config(path: Option<&Path>, url: Option<&str>) -> CliResult<DaemonConfig> {
    let mut config = match path {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(url) = url {
        config.url = url.to_string();
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// Offline Commands
// =============================================================================

/// Print a portable storage file as JSON
pub fn cmd_decode(provider: &ProviderHandle, input: &Path) -> CliResult<()> {
    let bytes = fs::read(input)?;
    let value = provider.decode_storage(Bytes::from(bytes))?;
    println!("{}", serde_json::to_string_pretty(&wire_to_json(&value))?);
    Ok(())
}

/// Encode a JSON file as portable storage
pub fn cmd_encode(provider: &ProviderHandle, input: &Path, output: &Path) -> CliResult<()> {
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    let bytes = provider.encode_storage(&json_to_wire(&json)?)?;
    fs::write(output, &bytes)?;
    println!("✅ Wrote {} bytes to {:?}", bytes.len(), output);
    Ok(())
}

/// Check an address against a network
pub fn cmd_validate_address(provider: &ProviderHandle, address: &str, network: NetworkType) -> CliResult<()> {
    match provider.validate_address(address, network) {
        Ok(()) => {
            let decoded = decode_address(address)?;
            println!("✅ Valid {} address", network);
            println!("   ├─ Type: {:?}", decoded.address_type);
            println!("   ├─ Spend key: {}", decoded.public_spend_key);
            println!("   ├─ View key: {}", decoded.public_view_key);
            match decoded.payment_id {
                Some(id) => println!("   └─ Payment ID: {}", id),
                None => println!("   └─ Payment ID: none"),
            }
        }
        Err(e) => println!("❌ {}", e),
    }
    Ok(())
}

// =============================================================================
// Node Commands
// =============================================================================

pub async fn cmd_height(daemon: &RpcDaemon) -> CliResult<()> {
    let height = daemon.get_height().await?;
    println!("🧱 Height: {}", height);
    Ok(())
}

/// Show one header, the tip by default
pub async fn cmd_header(daemon: &RpcDaemon, height: Option<u64>) -> CliResult<()> {
    let header = match height {
        Some(height) => daemon.get_block_header_by_height(height).await?,
        None => daemon.get_last_block_header().await?,
    };
    print_header(&header);
    Ok(())
}

/// Fetch a block range; Ctrl-C cancels the download
pub async fn cmd_blocks(daemon: &RpcDaemon, start: Option<u64>, end: Option<u64>) -> CliResult<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let blocks = daemon.get_blocks_by_range_with(start, end, &cancel).await?;
    println!("📦 Fetched {} block(s)", blocks.len());
    for block in &blocks {
        print_block_line(block);
    }
    Ok(())
}

/// List pool transactions, optionally narrowed by a JSON transaction filter
pub async fn cmd_pool(daemon: &RpcDaemon, filter: Option<&str>) -> CliResult<()> {
    let filter = match filter {
        Some(json) => TransactionFilter::try_from(&serde_json::from_str::<serde_json::Value>(json)?)?,
        None => TransactionFilter::default(),
    };

    let (txs, stats) = futures::try_join!(daemon.get_tx_pool(), daemon.get_tx_pool_stats())?;
    let matched = filter.apply(&txs[..]);
    println!(
        "🕒 Pool: {} transaction(s), {} matching",
        stats.num_txs.unwrap_or(txs.len() as u64),
        matched.len()
    );
    for tx in matched {
        print_tx_line(tx);
    }
    Ok(())
}

pub async fn cmd_tx(daemon: &RpcDaemon, hash: &str, prune: bool) -> CliResult<()> {
    match daemon.get_tx(hash, prune).await? {
        Some(tx) => println!("{}", serde_json::to_string_pretty(&tx)?),
        None => println!("❌ Transaction not found: {}", hash),
    }
    Ok(())
}

/// Node overview
pub async fn cmd_status(daemon: &RpcDaemon) -> CliResult<()> {
    let (info, sync, version) =
        futures::try_join!(daemon.get_info(), daemon.get_sync_info(), daemon.get_version())?;

    println!("ℹ️  Node status:");
    if let Some(network) = info.network_type {
        println!("   ├─ Network: {}", network);
    }
    println!("   ├─ Height: {}", info.height.unwrap_or_default());
    println!("   ├─ Target height: {}", sync.target_height.or(info.target_height).unwrap_or_default());
    println!("   ├─ Synchronized: {}", info.is_synchronized.unwrap_or(false));
    println!("   ├─ Peers: {}", sync.peers.as_ref().map_or(0, Vec::len));
    if let Some((major, minor)) = version.major_minor() {
        println!("   ├─ RPC version: {}.{}", major, minor);
    }
    println!("   └─ Pool size: {}", info.num_txs_pool.unwrap_or_default());
    Ok(())
}

/// Print new block headers until Ctrl-C
pub async fn cmd_watch(daemon: &RpcDaemon) -> CliResult<()> {
    let listener: Arc<dyn BlockListener> = Arc::new(|header: &BlockHeader| print_header(header));
    daemon.add_block_listener(Arc::clone(&listener));
    println!("👀 Watching for new blocks every {:?} (Ctrl-C to stop)", daemon.config().poll_interval());

    tokio::signal::ctrl_c().await?;
    daemon.remove_block_listener(&listener);
    println!("\n📴 Stopped watching");
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_header(header: &BlockHeader) {
    println!("\n   Block {}", header.height.map_or("?".to_string(), |h| h.to_string()));
    println!("   ├─ Hash: {}", header.hash.as_deref().unwrap_or("?"));
    if let Some(time) = header.datetime() {
        println!("   ├─ Time: {}", time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("   ├─ Transactions: {}", header.num_txs.unwrap_or_default());
    println!("   ├─ Size: {} bytes", header.size.unwrap_or_default());
    println!("   └─ Difficulty: {}", header.difficulty.unwrap_or_default());
}

fn print_block_line(block: &Block) {
    println!(
        "   {:>8}  {} tx(s)",
        block.header.height.map_or("?".to_string(), |h| h.to_string()),
        block.txs.as_ref().map_or(0, Vec::len)
    );
}

fn print_tx_line(tx: &Transaction) {
    println!(
        "   {}  fee {}  {} bytes",
        tx.hash.as_deref().unwrap_or("?"),
        tx.fee.map_or("?".to_string(), |f| f.to_string()),
        tx.size.map_or("?".to_string(), |s| s.to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NativeProvider;
    use tempfile::tempdir;

    fn provider() -> ProviderHandle {
        ProviderHandle::ready(Arc::new(NativeProvider))
    }

    #[test]
    fn test_encode_then_decode_files() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("in.json");
        let bin_path = dir.path().join("out.bin");
        fs::write(&json_path, r#"{"height": 12, "status": "OK"}"#).unwrap();

        cmd_encode(&provider(), &json_path, &bin_path).unwrap();
        assert!(fs::metadata(&bin_path).unwrap().len() > 9);
        cmd_decode(&provider(), &bin_path).unwrap();
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        fs::write(&path, b"not storage").unwrap();
        assert!(cmd_decode(&provider(), &path).is_err());
    }

    #[test]
    fn test_load_config_override() {
        let config = load_config(None, Some("http://node:28081")).unwrap();
        assert_eq!(config.url, "http://node:28081");
        assert!(load_config(None, Some("node")).is_err());
    }
}
