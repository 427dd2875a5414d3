//! Daemon over the node's HTTP interface

use crate::codec::{blocks_batch_from_value, WireValue};
use crate::core::block::{header_of, headers_of};
use crate::core::record::{array_of, string_list_of};
use crate::core::{
    Ban, Block, BlockHeader, DaemonInfo, EntityError, FeeEstimate, HardForkInfo, KeyImageSpentStatus, Peer,
    PoolBacklogEntry, RpcEntity, SubmitTxResult, SyncInfo, Transaction, TxPoolStats, Version,
};
use crate::daemon::listener::{BlockListener, BlockNotifier, BlockPoller};
use crate::daemon::range::{RangeFetcher, RangeSource};
use crate::daemon::{Daemon, DaemonConfig, DaemonError};
use crate::merge::{merge_tx, MergeError};
use crate::provider::{NativeProvider, ProviderHandle};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

// =============================================================================
// JSON-RPC Envelope
// =============================================================================

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// =============================================================================
// RPC Daemon
// =============================================================================

struct Inner {
    http: reqwest::Client,
    config: DaemonConfig,
    provider: Arc<ProviderHandle>,
    poller: BlockPoller,
    request_id: AtomicU64,
}

/// [`Daemon`] backed by a node's RPC server; clones share one connection pool
#[derive(Clone)]
pub struct RpcDaemon {
    inner: Arc<Inner>,
}

impl RpcDaemon {
    /// Connect with the built-in provider
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        let provider = Arc::new(ProviderHandle::ready(Arc::new(NativeProvider)));
        Self::with_provider(config, provider)
    }

    /// Connect using `provider` for portable storage payloads
    pub fn with_provider(config: DaemonConfig, provider: Arc<ProviderHandle>) -> Result<Self, DaemonError> {
        config.validate()?;
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let notifier = Arc::new(BlockNotifier::new());
        let poller = BlockPoller::new(notifier, config.poll_interval());
        log::debug!("RPC daemon at {}", config.url);
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                provider,
                poller,
                request_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.inner.config
    }

    pub fn provider(&self) -> &Arc<ProviderHandle> {
        &self.inner.provider
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Blocks `start..=end` with cancellation; see [`Daemon::get_blocks_by_range`]
    pub async fn get_blocks_by_range_with(
        &self,
        start: Option<u64>,
        end: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Block>, DaemonError> {
        let start = start.unwrap_or(0);
        let end = match end {
            Some(end) => end,
            None => match self.get_height().await?.checked_sub(1) {
                Some(tip) => tip,
                None => return Ok(Vec::new()),
            },
        };
        let config = &self.inner.config;
        RangeFetcher::new(config.max_request_bytes, config.headers_per_request)
            .fetch(self, start, end, cancel)
            .await
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let config = &self.inner.config;
        let request = self.inner.http.post(config.endpoint(path));
        match &config.username {
            Some(user) => request.basic_auth(user, config.password.as_deref()),
            None => request,
        }
    }

    /// Call a JSON-RPC method and return its checked `result`
    async fn json_rpc(&self, method: &str, params: Value) -> Result<Value, DaemonError> {
        let result = self.json_rpc_unchecked(method, params).await?;
        check_status(&result)?;
        Ok(result)
    }

    async fn json_rpc_unchecked(&self, method: &str, params: Value) -> Result<Value, DaemonError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.inner.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        log::debug!("json_rpc {}", method);
        let response: JsonRpcResponse = self
            .request("json_rpc")
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        rpc_result(response)
    }

    /// POST to a plain JSON endpoint and return the checked body
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, DaemonError> {
        let response = self.post_json_unchecked(path, body).await?;
        check_status(&response)?;
        Ok(response)
    }

    async fn post_json_unchecked(&self, path: &str, body: Value) -> Result<Value, DaemonError> {
        log::debug!("POST /{}", path);
        Ok(self
            .request(path)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// POST portable storage to a binary endpoint and decode the reply
    async fn post_binary(&self, path: &str, body: &WireValue) -> Result<WireValue, DaemonError> {
        let payload = self.inner.provider.encode_storage(body)?;
        log::debug!("POST /{} ({} bytes)", path, payload.len());
        let bytes: Bytes = self
            .request(path)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let reply = self.inner.provider.decode_storage(bytes)?;
        if let Some(status) = reply.get("status").and_then(WireValue::as_str) {
            if status != "OK" {
                return Err(DaemonError::Status(status.to_string()));
            }
        }
        Ok(reply)
    }

    async fn get_transactions(&self, hashes: &[String], prune: bool) -> Result<Value, DaemonError> {
        let response = self
            .post_json(
                "get_transactions",
                json!({"txs_hashes": hashes, "decode_as_json": true, "prune": prune}),
            )
            .await?;
        if let Some(missed) = response.get("missed_tx").and_then(Value::as_array) {
            if !missed.is_empty() {
                log::debug!("Node does not know {} of {} transaction(s)", missed.len(), hashes.len());
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl Daemon for RpcDaemon {
    async fn get_height(&self) -> Result<u64, DaemonError> {
        let response = self.post_json("get_height", json!({})).await?;
        response
            .get("height")
            .and_then(Value::as_u64)
            .ok_or_else(|| DaemonError::InvalidResponse("get_height without height".to_string()))
    }

    async fn get_last_block_header(&self) -> Result<BlockHeader, DaemonError> {
        let result = self.json_rpc("get_last_block_header", json!({})).await?;
        Ok(header_of(&result)?)
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, DaemonError> {
        let result = self.json_rpc_unchecked("on_get_block_hash", json!([height])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DaemonError::InvalidResponse("block hash is not a string".to_string()))
    }

    async fn get_block_header_by_hash(&self, hash: &str) -> Result<BlockHeader, DaemonError> {
        let result = self.json_rpc("get_block_header_by_hash", json!({"hash": hash})).await?;
        Ok(header_of(&result)?)
    }

    async fn get_block_header_by_height(&self, height: u64) -> Result<BlockHeader, DaemonError> {
        let result = self.json_rpc("get_block_header_by_height", json!({"height": height})).await?;
        Ok(header_of(&result)?)
    }

    async fn get_block_headers_by_range(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError> {
        let result = self
            .json_rpc("get_block_headers_range", json!({"start_height": start, "end_height": end}))
            .await?;
        Ok(headers_of(&result)?)
    }

    async fn get_block_by_hash(&self, hash: &str) -> Result<Block, DaemonError> {
        let result = self.json_rpc("get_block", json!({"hash": hash})).await?;
        Ok(Block::from_rpc(&result)?)
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block, DaemonError> {
        let result = self.json_rpc("get_block", json!({"height": height})).await?;
        Ok(Block::from_rpc(&result)?)
    }

    async fn get_blocks_by_height(&self, heights: &[u64]) -> Result<Vec<Block>, DaemonError> {
        if heights.is_empty() {
            return Ok(Vec::new());
        }
        let request = WireValue::map().with(
            "heights",
            heights.iter().map(|h| WireValue::U64(*h)).collect::<Vec<_>>(),
        );
        let reply = self.post_binary("get_blocks_by_height.bin", &request).await?;
        let batch = blocks_batch_from_value(&reply)?;
        if batch.len() != heights.len() {
            return Err(DaemonError::InvalidResponse(format!(
                "{} blocks returned for {} heights",
                batch.len(),
                heights.len()
            )));
        }
        batch
            .blocks
            .iter()
            .zip(&batch.transactions_per_block)
            .zip(heights)
            .map(|((block, txs), height)| {
                Block::from_batch_entry(block, txs, Some(*height)).map_err(DaemonError::from)
            })
            .collect()
    }

    async fn get_blocks_by_range(&self, start: Option<u64>, end: Option<u64>) -> Result<Vec<Block>, DaemonError> {
        self.get_blocks_by_range_with(start, end, &CancellationToken::new()).await
    }

    async fn get_txs(&self, hashes: &[String], prune: bool) -> Result<Vec<Option<Transaction>>, DaemonError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.get_transactions(hashes, prune).await?;
        let mut txs = transactions_from_rpc(&response)?;

        if txs.iter().any(|tx| tx.in_tx_pool == Some(true)) {
            let pool = self.get_tx_pool().await?;
            fold_pool_observations(&mut txs, pool)?;
        }

        let keyed = txs.into_iter().filter_map(|tx| tx.hash.clone().map(|hash| (hash, tx)));
        Ok(align_by_hash(hashes, keyed))
    }

    async fn get_tx_hexes(&self, hashes: &[String], prune: bool) -> Result<Vec<Option<String>>, DaemonError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.get_transactions(hashes, prune).await?;
        let key = if prune { "pruned_as_hex" } else { "as_hex" };
        let entries = match response.get("txs") {
            Some(entries) => array_of("txs", entries)?.as_slice(),
            None => &[],
        };
        let keyed = entries
            .iter()
            .map(|entry| -> Result<(String, String), DaemonError> {
                let field = |name: &str| {
                    entry
                        .get(name)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| DaemonError::InvalidResponse(format!("transaction without {}", name)))
                };
                Ok((field("tx_hash")?, field(key)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(align_by_hash(hashes, keyed))
    }

    async fn get_tx_pool(&self) -> Result<Vec<Transaction>, DaemonError> {
        let response = self.post_json("get_transaction_pool", json!({})).await?;
        Ok(pool_from_rpc(&response)?)
    }

    async fn get_tx_pool_hashes(&self) -> Result<Vec<String>, DaemonError> {
        let response = self.post_json("get_transaction_pool_hashes", json!({})).await?;
        match response.get("tx_hashes") {
            None => Ok(Vec::new()),
            Some(list) => Ok(string_list_of("tx_hashes", list)?),
        }
    }

    async fn get_tx_pool_stats(&self) -> Result<TxPoolStats, DaemonError> {
        let response = self.post_json("get_transaction_pool_stats", json!({})).await?;
        let stats = response
            .get("pool_stats")
            .ok_or_else(|| DaemonError::InvalidResponse("missing pool_stats".to_string()))?;
        Ok(TxPoolStats::from_rpc(stats)?)
    }

    async fn get_tx_pool_backlog(&self) -> Result<Vec<PoolBacklogEntry>, DaemonError> {
        let result = self.json_rpc("get_txpool_backlog", json!({})).await?;
        Ok(PoolBacklogEntry::list_from_rpc(result.get("backlog").unwrap_or(&Value::Null))?)
    }

    async fn flush_tx_pool(&self, hashes: &[String]) -> Result<(), DaemonError> {
        self.json_rpc("flush_txpool", json!({"txids": hashes})).await?;
        if hashes.is_empty() {
            log::info!("Flushed the transaction pool");
        } else {
            log::info!("Flushed {} pool transaction(s)", hashes.len());
        }
        Ok(())
    }

    async fn get_key_image_spent_statuses(&self, key_images: &[String]) -> Result<Vec<KeyImageSpentStatus>, DaemonError> {
        if key_images.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.post_json("is_key_image_spent", json!({"key_images": key_images})).await?;
        let statuses = KeyImageSpentStatus::list_from_rpc(&response)?;
        if statuses.len() != key_images.len() {
            return Err(DaemonError::InvalidResponse(format!(
                "{} statuses for {} key images",
                statuses.len(),
                key_images.len()
            )));
        }
        Ok(statuses)
    }

    async fn get_fee_estimate(&self, grace_blocks: Option<u64>) -> Result<FeeEstimate, DaemonError> {
        let params = match grace_blocks {
            Some(blocks) => json!({"grace_blocks": blocks}),
            None => json!({}),
        };
        let result = self.json_rpc("get_fee_estimate", params).await?;
        Ok(FeeEstimate::from_rpc(&result)?)
    }

    async fn submit_tx_hex(&self, hex: &str, do_not_relay: bool) -> Result<SubmitTxResult, DaemonError> {
        // A rejected transaction is reported through the result, not the status
        let response = self
            .post_json_unchecked(
                "send_raw_transaction",
                json!({"tx_as_hex": hex, "do_not_relay": do_not_relay}),
            )
            .await?;
        let result = SubmitTxResult::from_rpc(&response)?;
        if result.is_good != Some(true) {
            log::warn!("Transaction rejected: {}", result.reason.as_deref().unwrap_or("no reason given"));
        }
        Ok(result)
    }

    async fn relay_txs_by_hash(&self, hashes: &[String]) -> Result<(), DaemonError> {
        self.json_rpc("relay_tx", json!({"txids": hashes})).await?;
        Ok(())
    }

    async fn get_info(&self) -> Result<DaemonInfo, DaemonError> {
        let result = self.json_rpc("get_info", json!({})).await?;
        Ok(DaemonInfo::from_rpc(&result)?)
    }

    async fn get_sync_info(&self) -> Result<SyncInfo, DaemonError> {
        let result = self.json_rpc("sync_info", json!({})).await?;
        Ok(SyncInfo::from_rpc(&result)?)
    }

    async fn get_hard_fork_info(&self) -> Result<HardForkInfo, DaemonError> {
        let result = self.json_rpc("hard_fork_info", json!({})).await?;
        Ok(HardForkInfo::from_rpc(&result)?)
    }

    async fn get_version(&self) -> Result<Version, DaemonError> {
        let result = self.json_rpc("get_version", json!({})).await?;
        Ok(Version::from_rpc(&result)?)
    }

    async fn is_trusted(&self) -> Result<bool, DaemonError> {
        let response = self.post_json("get_height", json!({})).await?;
        Ok(!response.get("untrusted").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn get_peers(&self) -> Result<Vec<Peer>, DaemonError> {
        let result = self.json_rpc("get_connections", json!({})).await?;
        let Some(connections) = result.get("connections") else {
            return Ok(Vec::new());
        };
        let peers = array_of("connections", connections)?
            .iter()
            .map(|c| -> Result<Peer, EntityError> {
                let mut peer = Peer::from_rpc(c)?;
                peer.is_online = Some(true);
                Ok(peer)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(peers)
    }

    async fn get_known_peers(&self) -> Result<Vec<Peer>, DaemonError> {
        let response = self.post_json("get_peer_list", json!({})).await?;
        Ok(Peer::known_from_rpc(&response)?)
    }

    async fn get_peer_bans(&self) -> Result<Vec<Ban>, DaemonError> {
        let result = self.json_rpc("get_bans", json!({})).await?;
        let Some(bans) = result.get("bans") else {
            return Ok(Vec::new());
        };
        Ok(array_of("bans", bans)?
            .iter()
            .map(Ban::from_rpc)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn set_peer_bans(&self, bans: &[Ban]) -> Result<(), DaemonError> {
        let entries: Vec<Value> = bans.iter().map(Ban::to_rpc).collect();
        self.json_rpc("set_bans", json!({"bans": entries})).await?;
        Ok(())
    }

    fn add_block_listener(&self, listener: Arc<dyn BlockListener>) {
        if self.inner.poller.notifier().add(listener) == 1 {
            let source = PollSource {
                inner: Arc::downgrade(&self.inner),
            };
            self.inner.poller.start(Arc::new(source));
        }
    }

    fn remove_block_listener(&self, listener: &Arc<dyn BlockListener>) -> bool {
        let notifier = self.inner.poller.notifier();
        let removed = notifier.remove(listener);
        if removed && notifier.is_empty() {
            self.inner.poller.stop();
        }
        removed
    }
}

/// Weak view of a daemon for the poller task
///
/// The task must not keep the daemon alive: once every [`RpcDaemon`] handle
/// is gone, requests fail with [`DaemonError::Cancelled`] and the task ends.
struct PollSource {
    inner: Weak<Inner>,
}

impl PollSource {
    fn daemon(&self) -> Result<RpcDaemon, DaemonError> {
        self.inner
            .upgrade()
            .map(|inner| RpcDaemon { inner })
            .ok_or(DaemonError::Cancelled)
    }
}

#[async_trait]
impl RangeSource for PollSource {
    async fn tip_header(&self) -> Result<BlockHeader, DaemonError> {
        self.daemon()?.get_last_block_header().await
    }

    async fn headers(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError> {
        self.daemon()?.get_block_headers_by_range(start, end).await
    }

    async fn blocks(&self, heights: &[u64]) -> Result<Vec<Block>, DaemonError> {
        self.daemon()?.get_blocks_by_height(heights).await
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

/// Place hash-keyed results at the positions of the requested hashes
///
/// Hashes with no result map to `None`; a repeated hash gets the same result
/// at each of its positions. Results for hashes never requested are dropped.
fn align_by_hash<T: Clone>(hashes: &[String], results: impl IntoIterator<Item = (String, T)>) -> Vec<Option<T>> {
    let mut by_hash = HashMap::new();
    for (hash, item) in results {
        if !hashes.contains(&hash) {
            log::warn!("Dropping unrequested transaction {}", hash);
            continue;
        }
        by_hash.entry(hash).or_insert(item);
    }
    hashes.iter().map(|hash| by_hash.get(hash).cloned()).collect()
}

fn rpc_result(response: JsonRpcResponse) -> Result<Value, DaemonError> {
    if let Some(error) = response.error {
        return Err(DaemonError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| DaemonError::InvalidResponse("JSON-RPC response without result".to_string()))
}

/// Fail unless the node reports `status: OK` (absent status passes)
fn check_status(response: &Value) -> Result<(), DaemonError> {
    match response.get("status").and_then(Value::as_str) {
        Some(status) if status != "OK" => Err(DaemonError::Status(status.to_string())),
        _ => Ok(()),
    }
}

/// Transactions of a `get_transactions` response
fn transactions_from_rpc(response: &Value) -> Result<Vec<Transaction>, EntityError> {
    let Some(entries) = response.get("txs") else {
        return Ok(Vec::new());
    };
    array_of("txs", entries)?
        .iter()
        .map(|entry| -> Result<Transaction, EntityError> {
            let tx = Transaction::from_rpc(entry)?;
            // Pool entries report a placeholder block height
            Ok(if tx.in_tx_pool == Some(true) {
                Transaction { block: None, ..tx }
            } else {
                tx
            })
        })
        .collect()
}

/// Transactions of a `get_transaction_pool` response
fn pool_from_rpc(response: &Value) -> Result<Vec<Transaction>, EntityError> {
    let Some(entries) = response.get("transactions") else {
        return Ok(Vec::new());
    };
    array_of("transactions", entries)?
        .iter()
        .map(|entry| -> Result<Transaction, EntityError> {
            let mut tx = Transaction {
                in_tx_pool: Some(true),
                is_confirmed: Some(false),
                is_miner_tx: Some(false),
                ..Default::default()
            };
            tx.apply_rpc(entry)?;
            Ok(tx)
        })
        .collect()
}

/// Merge pool views into the pool members of `txs`
fn fold_pool_observations(txs: &mut Vec<Transaction>, pool: Vec<Transaction>) -> Result<(), MergeError> {
    for pool_tx in pool {
        let wanted = txs
            .iter()
            .any(|tx| tx.in_tx_pool == Some(true) && tx.hash.is_some() && tx.hash == pool_tx.hash);
        if wanted {
            merge_tx(txs, pool_tx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_daemon() -> RpcDaemon {
        let config = DaemonConfig {
            timeout_ms: 2_000,
            poll_interval_ms: 10,
            ..DaemonConfig::new("http://127.0.0.1:1")
        };
        RpcDaemon::new(config).unwrap()
    }

    #[test]
    fn test_rpc_envelope() {
        let ok: JsonRpcResponse = serde_json::from_value(json!({"id": 1, "result": {"count": 3}})).unwrap();
        assert_eq!(rpc_result(ok).unwrap()["count"], 3);

        let failed: JsonRpcResponse =
            serde_json::from_value(json!({"id": 1, "error": {"code": -2, "message": "bad height"}})).unwrap();
        assert!(matches!(rpc_result(failed), Err(DaemonError::Rpc { code: -2, .. })));
    }

    #[test]
    fn test_status_check() {
        assert!(check_status(&json!({"status": "OK"})).is_ok());
        assert!(check_status(&json!({"height": 1})).is_ok());
        assert!(matches!(check_status(&json!({"status": "BUSY"})), Err(DaemonError::Status(s)) if s == "BUSY"));
    }

    #[test]
    fn test_pool_views_fold_into_results() {
        let response = json!({
            "txs": [
                {"tx_hash": "aa", "in_pool": true, "block_height": 0, "as_hex": "00"},
                {"tx_hash": "bb", "in_pool": false, "block_height": 100, "as_hex": "11"}
            ],
            "status": "OK"
        });
        let mut txs = transactions_from_rpc(&response).unwrap();
        assert_eq!(txs[0].block, None);
        assert_eq!(txs[1].height(), Some(100));

        let pool = pool_from_rpc(&json!({
            "transactions": [
                {"id_hash": "aa", "receive_time": 1700000000, "fee": 30, "relayed": true},
                {"id_hash": "cc", "receive_time": 1700000001}
            ]
        }))
        .unwrap();
        fold_pool_observations(&mut txs, pool).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].fee, Some(30));
        assert_eq!(txs[0].received_timestamp, Some(1_700_000_000));
        assert_eq!(txs[0].full_hex.as_deref(), Some("00"));
        assert_eq!(txs[1].fee, None);
    }

    #[test]
    fn test_results_align_with_requested_hashes() {
        let hashes: Vec<String> = ["bb", "missing", "aa", "bb"].iter().map(|h| h.to_string()).collect();
        let results = vec![
            ("aa".to_string(), 1),
            ("bb".to_string(), 2),
            ("zz".to_string(), 3),
        ];
        assert_eq!(align_by_hash(&hashes, results), vec![Some(2), None, Some(1), Some(2)]);
        assert_eq!(align_by_hash(&hashes, Vec::<(String, u8)>::new()), vec![None; 4]);
    }

    #[test]
    fn test_aligned_transactions_keep_missed_slots() {
        let response = json!({
            "txs": [{"tx_hash": "bb", "in_pool": false, "block_height": 7}],
            "missed_tx": ["aa"],
            "status": "OK"
        });
        let hashes = vec!["aa".to_string(), "bb".to_string()];
        let keyed = transactions_from_rpc(&response)
            .unwrap()
            .into_iter()
            .filter_map(|tx| tx.hash.clone().map(|hash| (hash, tx)));
        let txs = align_by_hash(&hashes, keyed);

        assert_eq!(txs.len(), 2);
        assert!(txs[0].is_none());
        assert_eq!(txs[1].as_ref().and_then(|tx| tx.height()), Some(7));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            RpcDaemon::new(DaemonConfig::new("node:18081")),
            Err(DaemonError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        let err = unreachable_daemon().get_height().await.unwrap_err();
        assert!(matches!(err, DaemonError::Transport(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_batches_skip_the_network() {
        let daemon = unreachable_daemon();
        assert!(daemon.get_blocks_by_height(&[]).await.unwrap().is_empty());
        assert!(daemon.get_txs(&[], false).await.unwrap().is_empty());
        assert!(daemon.get_tx_hexes(&[], false).await.unwrap().is_empty());
        assert!(daemon.get_key_image_spent_statuses(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listeners_drive_poller() {
        let daemon = unreachable_daemon();
        let listener: Arc<dyn BlockListener> = Arc::new(|_: &BlockHeader| {});
        let other: Arc<dyn BlockListener> = Arc::new(|_: &BlockHeader| {});

        daemon.add_block_listener(Arc::clone(&listener));
        daemon.add_block_listener(Arc::clone(&other));
        assert!(daemon.is_polling());

        assert!(daemon.remove_block_listener(&listener));
        assert!(daemon.is_polling());
        assert!(daemon.remove_block_listener(&other));
        assert!(!daemon.is_polling());
        assert!(!daemon.remove_block_listener(&other));
    }

    #[tokio::test]
    async fn test_dropping_daemon_ends_polling() {
        let daemon = unreachable_daemon();
        let listener: Arc<dyn BlockListener> = Arc::new(|_: &BlockHeader| {});
        daemon.add_block_listener(listener);
        assert!(daemon.is_polling());

        let inner = Arc::downgrade(&daemon.inner);
        drop(daemon);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(inner.upgrade().is_none());
    }
}
