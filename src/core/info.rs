//! Node status records: info, sync state, peers, bans, fees and versions

use crate::core::record::{
    array_of, bool_of, deserialize_rpc, loose_u16, object, opt_u128, string_of, string_or_number, u64_of,
    unknown_field, with_low64, with_top64, wide_of, EntityError, RpcEntity,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Network Type
// =============================================================================

/// Network a node or address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Stagenet,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Stagenet => "stagenet",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for NetworkType {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkType::Mainnet),
            "testnet" | "test" => Ok(NetworkType::Testnet),
            "stagenet" | "stage" => Ok(NetworkType::Stagenet),
            other => Err(EntityError::invalid("nettype", format!("unknown network '{}'", other))),
        }
    }
}

// =============================================================================
// Daemon Info
// =============================================================================

/// General node state from `get_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub version: Option<String>,
    pub height: Option<u64>,
    pub height_without_bootstrap: Option<u64>,
    pub target_height: Option<u64>,
    /// Target block time in seconds
    pub target: Option<u64>,
    pub top_block_hash: Option<String>,
    pub network_type: Option<NetworkType>,
    #[serde(default, with = "opt_u128")]
    pub difficulty: Option<u128>,
    #[serde(default, with = "opt_u128")]
    pub cumulative_difficulty: Option<u128>,
    pub num_alt_blocks: Option<u64>,
    pub block_size_limit: Option<u64>,
    pub block_size_median: Option<u64>,
    pub block_weight_limit: Option<u64>,
    pub block_weight_median: Option<u64>,
    pub bootstrap_daemon_address: Option<String>,
    pub free_space: Option<u64>,
    pub database_size: Option<u64>,
    pub num_offline_peers: Option<u64>,
    pub num_online_peers: Option<u64>,
    pub num_incoming_connections: Option<u64>,
    pub num_outgoing_connections: Option<u64>,
    pub num_rpc_connections: Option<u64>,
    pub num_txs: Option<u64>,
    pub num_txs_pool: Option<u64>,
    pub start_timestamp: Option<u64>,
    pub adjusted_timestamp: Option<u64>,
    pub is_offline: Option<bool>,
    pub is_busy_syncing: Option<bool>,
    pub is_synchronized: Option<bool>,
    pub is_restricted: Option<bool>,
    pub update_available: Option<bool>,
    pub was_bootstrap_ever_used: Option<bool>,
    pub credits: Option<u64>,
}

impl RpcEntity for DaemonInfo {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut info = DaemonInfo::default();
        let mut flagged_network = None;
        for (key, val) in object("daemon info", value)? {
            let key = key.as_str();
            match key {
                "version" => info.version = Some(string_of(key, val)?),
                "height" => info.height = Some(u64_of(key, val)?),
                "height_without_bootstrap" => info.height_without_bootstrap = Some(u64_of(key, val)?),
                "target_height" => info.target_height = Some(u64_of(key, val)?),
                "target" => info.target = Some(u64_of(key, val)?),
                "top_block_hash" => info.top_block_hash = Some(string_of(key, val)?),
                // `fakechain` (regtest) has no address network
                "nettype" => info.network_type = string_of(key, val)?.parse().ok(),
                "mainnet" | "testnet" | "stagenet" => {
                    if bool_of(key, val)? {
                        flagged_network = Some(key.parse::<NetworkType>()?);
                    }
                }
                "difficulty" => info.difficulty = with_low64(info.difficulty, u64_of(key, val)?),
                "difficulty_top64" => info.difficulty = with_top64(info.difficulty, u64_of(key, val)?),
                "wide_difficulty" => info.difficulty = Some(wide_of(key, val)?),
                "cumulative_difficulty" => {
                    info.cumulative_difficulty = with_low64(info.cumulative_difficulty, u64_of(key, val)?)
                }
                "cumulative_difficulty_top64" => {
                    info.cumulative_difficulty = with_top64(info.cumulative_difficulty, u64_of(key, val)?)
                }
                "wide_cumulative_difficulty" => info.cumulative_difficulty = Some(wide_of(key, val)?),
                "alt_blocks_count" => info.num_alt_blocks = Some(u64_of(key, val)?),
                "block_size_limit" => info.block_size_limit = Some(u64_of(key, val)?),
                "block_size_median" => info.block_size_median = Some(u64_of(key, val)?),
                "block_weight_limit" => info.block_weight_limit = Some(u64_of(key, val)?),
                "block_weight_median" => info.block_weight_median = Some(u64_of(key, val)?),
                "bootstrap_daemon_address" => {
                    let addr = string_of(key, val)?;
                    info.bootstrap_daemon_address = (!addr.is_empty()).then_some(addr);
                }
                "free_space" => info.free_space = Some(u64_of(key, val)?),
                "database_size" => info.database_size = Some(u64_of(key, val)?),
                "grey_peerlist_size" => info.num_offline_peers = Some(u64_of(key, val)?),
                "white_peerlist_size" => info.num_online_peers = Some(u64_of(key, val)?),
                "incoming_connections_count" => info.num_incoming_connections = Some(u64_of(key, val)?),
                "outgoing_connections_count" => info.num_outgoing_connections = Some(u64_of(key, val)?),
                "rpc_connections_count" => info.num_rpc_connections = Some(u64_of(key, val)?),
                "tx_count" => info.num_txs = Some(u64_of(key, val)?),
                "tx_pool_size" => info.num_txs_pool = Some(u64_of(key, val)?),
                "start_time" => info.start_timestamp = Some(u64_of(key, val)?),
                "adjusted_time" => info.adjusted_timestamp = Some(u64_of(key, val)?),
                "offline" => info.is_offline = Some(bool_of(key, val)?),
                "busy_syncing" => info.is_busy_syncing = Some(bool_of(key, val)?),
                "synchronized" => info.is_synchronized = Some(bool_of(key, val)?),
                "restricted" => info.is_restricted = Some(bool_of(key, val)?),
                "update_available" => info.update_available = Some(bool_of(key, val)?),
                "was_bootstrap_ever_used" => info.was_bootstrap_ever_used = Some(bool_of(key, val)?),
                "credits" => info.credits = Some(u64_of(key, val)?),
                "status" | "untrusted" | "top_hash" => {}
                _ => unknown_field("daemon info", key),
            }
        }
        if info.network_type.is_none() {
            info.network_type = flagged_network;
        }
        Ok(info)
    }
}

// =============================================================================
// Sync Info
// =============================================================================

/// A block span being downloaded from a peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpan {
    pub connection_id: Option<String>,
    #[serde(alias = "nblocks")]
    pub num_blocks: Option<u64>,
    pub rate: Option<u64>,
    pub remote_address: Option<String>,
    pub size: Option<u64>,
    pub speed: Option<u64>,
    pub start_height: Option<u64>,
}

/// Synchronization progress from `sync_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub height: Option<u64>,
    pub target_height: Option<u64>,
    pub next_needed_pruning_seed: Option<u64>,
    pub overview: Option<String>,
    pub peers: Option<Vec<Peer>>,
    pub spans: Option<Vec<ConnectionSpan>>,
    pub credits: Option<u64>,
}

impl RpcEntity for SyncInfo {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut info = SyncInfo::default();
        for (key, val) in object("sync info", value)? {
            let key = key.as_str();
            match key {
                "height" => info.height = Some(u64_of(key, val)?),
                "target_height" => info.target_height = Some(u64_of(key, val)?),
                "next_needed_pruning_seed" => info.next_needed_pruning_seed = Some(u64_of(key, val)?),
                "overview" => info.overview = Some(string_of(key, val)?),
                "credits" => info.credits = Some(u64_of(key, val)?),
                "peers" => {
                    // Each entry wraps the connection under `info`
                    let peers = array_of(key, val)?
                        .iter()
                        .map(|p| Peer::from_rpc(p.get("info").unwrap_or(p)))
                        .collect::<Result<Vec<_>, _>>()?;
                    info.peers = Some(peers);
                }
                "spans" => {
                    let spans = array_of(key, val)?
                        .iter()
                        .map(|s| deserialize_rpc("connection span", s))
                        .collect::<Result<Vec<_>, _>>()?;
                    info.spans = Some(spans);
                }
                "status" | "untrusted" | "top_hash" => {}
                _ => unknown_field("sync info", key),
            }
        }
        Ok(info)
    }
}

// =============================================================================
// Peers and Bans
// =============================================================================

/// A peer, either a live connection or an entry of the known-peer list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(default, alias = "peer_id", deserialize_with = "string_or_number::deserialize")]
    pub id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "loose_u16::deserialize")]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "loose_u16::deserialize")]
    pub rpc_port: Option<u16>,
    #[serde(default, alias = "incoming")]
    pub is_incoming: Option<bool>,
    #[serde(default, alias = "local_ip")]
    pub is_local: Option<bool>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub live_time: Option<u64>,
    #[serde(default)]
    pub last_seen: Option<u64>,
    #[serde(default)]
    pub avg_download: Option<u64>,
    #[serde(default)]
    pub avg_upload: Option<u64>,
    #[serde(default)]
    pub current_download: Option<u64>,
    #[serde(default)]
    pub current_upload: Option<u64>,
    #[serde(default, alias = "recv_count")]
    pub num_receives: Option<u64>,
    #[serde(default, alias = "send_count")]
    pub num_sends: Option<u64>,
    #[serde(default, alias = "recv_idle_time")]
    pub receive_idle_time: Option<u64>,
    #[serde(default)]
    pub send_idle_time: Option<u64>,
    #[serde(default)]
    pub pruning_seed: Option<u64>,
    #[serde(default)]
    pub connection_id: Option<String>,
}

impl RpcEntity for Peer {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        deserialize_rpc("peer", value)
    }
}

impl Peer {
    /// Known peers from `/get_peer_list`: `white_list` entries are online,
    /// `gray_list` entries offline
    pub fn known_from_rpc(value: &Value) -> Result<Vec<Peer>, EntityError> {
        let mut peers = Vec::new();
        for (list, online) in [("white_list", true), ("gray_list", false)] {
            if let Some(entries) = value.get(list) {
                for entry in array_of(list, entries)? {
                    let mut peer = Peer::from_rpc(entry)?;
                    peer.is_online = Some(online);
                    peers.push(peer);
                }
            }
        }
        Ok(peers)
    }
}

/// A ban on a host or IP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ban {
    #[serde(default)]
    pub host: Option<String>,
    /// IPv4 address as a little-endian integer
    #[serde(default)]
    pub ip: Option<u32>,
    #[serde(default, alias = "ban")]
    pub is_banned: Option<bool>,
    /// Remaining ban duration
    #[serde(default)]
    pub seconds: Option<u64>,
}

impl RpcEntity for Ban {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut ban: Ban = deserialize_rpc("ban", value)?;
        // `get_bans` only lists active bans
        if ban.is_banned.is_none() {
            ban.is_banned = Some(true);
        }
        Ok(ban)
    }
}

impl Ban {
    /// Node representation for `set_bans`
    pub fn to_rpc(&self) -> Value {
        let mut entry = json!({});
        if let Some(host) = &self.host {
            entry["host"] = json!(host);
        }
        if let Some(ip) = self.ip {
            entry["ip"] = json!(ip);
        }
        if let Some(ban) = self.is_banned {
            entry["ban"] = json!(ban);
        }
        if let Some(seconds) = self.seconds {
            entry["seconds"] = json!(seconds);
        }
        entry
    }
}

// =============================================================================
// Fees, Key Images and Submission
// =============================================================================

/// Fee estimate from `get_fee_estimate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Fee per byte
    pub fee: Option<u64>,
    /// Per-priority fees
    #[serde(default)]
    pub fees: Option<Vec<u64>>,
    #[serde(default)]
    pub quantization_mask: Option<u64>,
}

impl RpcEntity for FeeEstimate {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        deserialize_rpc("fee estimate", value)
    }
}

/// Spent state of a key image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyImageSpentStatus {
    NotSpent,
    Confirmed,
    TxPool,
}

impl KeyImageSpentStatus {
    pub fn from_code(code: u64) -> Result<Self, EntityError> {
        match code {
            0 => Ok(KeyImageSpentStatus::NotSpent),
            1 => Ok(KeyImageSpentStatus::Confirmed),
            2 => Ok(KeyImageSpentStatus::TxPool),
            other => Err(EntityError::invalid("spent_status", format!("unknown code {}", other))),
        }
    }

    /// Parse the `spent_status` list of `is_key_image_spent`
    pub fn list_from_rpc(value: &Value) -> Result<Vec<Self>, EntityError> {
        let codes = value
            .get("spent_status")
            .ok_or_else(|| EntityError::invalid("spent_status", "missing"))?;
        array_of("spent_status", codes)?
            .iter()
            .map(|c| Self::from_code(u64_of("spent_status", c)?))
            .collect()
    }
}

/// Outcome of `send_raw_transaction`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitTxResult {
    pub is_good: Option<bool>,
    pub is_relayed: Option<bool>,
    pub is_double_spend_seen: Option<bool>,
    pub is_fee_too_low: Option<bool>,
    pub is_mixin_too_low: Option<bool>,
    pub has_invalid_input: Option<bool>,
    pub has_invalid_output: Option<bool>,
    pub has_too_few_outputs: Option<bool>,
    pub is_overspend: Option<bool>,
    pub is_too_big: Option<bool>,
    pub sanity_check_failed: Option<bool>,
    pub is_tx_extra_too_big: Option<bool>,
    pub is_nonzero_unlock_time: Option<bool>,
    pub reason: Option<String>,
    pub credits: Option<u64>,
}

impl RpcEntity for SubmitTxResult {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        let mut result = SubmitTxResult::default();
        for (key, val) in object("submit result", value)? {
            let key = key.as_str();
            match key {
                "status" => result.is_good = Some(string_of(key, val)? == "OK"),
                "not_relayed" => result.is_relayed = Some(!bool_of(key, val)?),
                "double_spend" => result.is_double_spend_seen = Some(bool_of(key, val)?),
                "fee_too_low" => result.is_fee_too_low = Some(bool_of(key, val)?),
                "low_mixin" => result.is_mixin_too_low = Some(bool_of(key, val)?),
                "invalid_input" => result.has_invalid_input = Some(bool_of(key, val)?),
                "invalid_output" => result.has_invalid_output = Some(bool_of(key, val)?),
                "too_few_outputs" => result.has_too_few_outputs = Some(bool_of(key, val)?),
                "overspend" => result.is_overspend = Some(bool_of(key, val)?),
                "too_big" => result.is_too_big = Some(bool_of(key, val)?),
                "sanity_check_failed" => result.sanity_check_failed = Some(bool_of(key, val)?),
                "tx_extra_too_big" => result.is_tx_extra_too_big = Some(bool_of(key, val)?),
                "nonzero_unlock_time" => result.is_nonzero_unlock_time = Some(bool_of(key, val)?),
                "reason" => {
                    let reason = string_of(key, val)?;
                    result.reason = (!reason.is_empty()).then_some(reason);
                }
                "credits" => result.credits = Some(u64_of(key, val)?),
                "untrusted" | "top_hash" => {}
                _ => unknown_field("submit result", key),
            }
        }
        Ok(result)
    }
}

// =============================================================================
// Hard Fork and Version
// =============================================================================

/// Hard fork voting state from `hard_fork_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardForkInfo {
    #[serde(default)]
    pub earliest_height: Option<u64>,
    #[serde(default, alias = "enabled")]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub state: Option<u32>,
    #[serde(default)]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default, alias = "votes")]
    pub num_votes: Option<u32>,
    #[serde(default)]
    pub voting: Option<u32>,
    #[serde(default)]
    pub window: Option<u32>,
    #[serde(default)]
    pub credits: Option<u64>,
}

impl RpcEntity for HardForkInfo {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        deserialize_rpc("hard fork info", value)
    }
}

/// Node software version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, alias = "version")]
    pub number: Option<u32>,
    #[serde(default, alias = "release")]
    pub is_release: Option<bool>,
}

impl RpcEntity for Version {
    fn from_rpc(value: &Value) -> Result<Self, EntityError> {
        deserialize_rpc("version", value)
    }
}

impl Version {
    /// `major.minor` as packed by the node (major in the high 16 bits)
    pub fn major_minor(&self) -> Option<(u16, u16)> {
        self.number.map(|n| ((n >> 16) as u16, (n & 0xffff) as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_type_parse() {
        assert_eq!("Stagenet".parse::<NetworkType>().unwrap(), NetworkType::Stagenet);
        assert!("regtest".parse::<NetworkType>().is_err());
        assert_eq!(NetworkType::Testnet.to_string(), "testnet");
    }

    #[test]
    fn test_daemon_info_from_rpc() {
        let info = DaemonInfo::from_rpc(&json!({
            "height": 3_000_000u64,
            "nettype": "mainnet",
            "white_peerlist_size": 1000,
            "grey_peerlist_size": 5000,
            "difficulty": 10,
            "difficulty_top64": 0,
            "synchronized": true,
            "bootstrap_daemon_address": "",
            "status": "OK"
        }))
        .unwrap();
        assert_eq!(info.network_type, Some(NetworkType::Mainnet));
        assert_eq!(info.num_online_peers, Some(1000));
        assert_eq!(info.num_offline_peers, Some(5000));
        assert_eq!(info.difficulty, Some(10));
        assert_eq!(info.bootstrap_daemon_address, None);
    }

    #[test]
    fn test_daemon_info_network_from_flags() {
        let info = DaemonInfo::from_rpc(&json!({"mainnet": false, "stagenet": true, "testnet": false})).unwrap();
        assert_eq!(info.network_type, Some(NetworkType::Stagenet));
    }

    #[test]
    fn test_peer_aliases() {
        let peer = Peer::from_rpc(&json!({
            "peer_id": "a1b2",
            "host": "10.0.0.1",
            "port": 18080,
            "incoming": true,
            "recv_count": 10,
            "unknown_extra": 1
        }))
        .unwrap();
        assert_eq!(peer.id.as_deref(), Some("a1b2"));
        assert_eq!(peer.is_incoming, Some(true));
        assert_eq!(peer.num_receives, Some(10));
    }

    #[test]
    fn test_known_peers() {
        let peers = Peer::known_from_rpc(&json!({
            "white_list": [{"id": 12345u64, "host": "1.2.3.4", "port": 18080, "last_seen": 5}],
            "gray_list": [{"id": 7, "host": "5.6.7.8", "port": 18080}]
        }))
        .unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].id.as_deref(), Some("12345"));
        assert_eq!(peers[0].is_online, Some(true));
        assert_eq!(peers[1].is_online, Some(false));
    }

    #[test]
    fn test_ban_round_trip_to_rpc() {
        let ban = Ban::from_rpc(&json!({"host": "1.2.3.4", "seconds": 60})).unwrap();
        assert_eq!(ban.is_banned, Some(true));
        assert_eq!(ban.to_rpc(), json!({"host": "1.2.3.4", "ban": true, "seconds": 60}));
    }

    #[test]
    fn test_key_image_statuses() {
        let statuses = KeyImageSpentStatus::list_from_rpc(&json!({"spent_status": [0, 1, 2]})).unwrap();
        assert_eq!(
            statuses,
            vec![
                KeyImageSpentStatus::NotSpent,
                KeyImageSpentStatus::Confirmed,
                KeyImageSpentStatus::TxPool
            ]
        );
        assert!(KeyImageSpentStatus::from_code(3).is_err());
    }

    #[test]
    fn test_submit_result() {
        let result = SubmitTxResult::from_rpc(&json!({
            "status": "Failed",
            "not_relayed": true,
            "double_spend": true,
            "reason": "double spend"
        }))
        .unwrap();
        assert_eq!(result.is_good, Some(false));
        assert_eq!(result.is_relayed, Some(false));
        assert_eq!(result.is_double_spend_seen, Some(true));
    }

    #[test]
    fn test_version_packing() {
        let version = Version::from_rpc(&json!({"version": 0x0003_0010u32, "release": true})).unwrap();
        assert_eq!(version.major_minor(), Some((3, 16)));
        assert_eq!(version.is_release, Some(true));
    }
}
