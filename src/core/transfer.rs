//! Wallet transfers attached to a transaction

use serde::{Deserialize, Serialize};

/// Value received by one subaddress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingTransfer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_suggested_confirmations: Option<u64>,
}

impl IncomingTransfer {
    /// Identity within a transaction
    pub fn key(&self) -> (Option<u32>, Option<u32>) {
        (self.account_index, self.subaddress_index)
    }
}

/// Value sent from one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTransfer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_index: Option<u32>,
    /// Subaddresses the funds were spent from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_indices: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<Destination>>,
}

/// Recipient of an outgoing transfer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

/// Borrowed view over either transfer direction
#[derive(Debug, Clone, Copy)]
pub enum TransferRef<'a> {
    Incoming(&'a IncomingTransfer),
    Outgoing(&'a OutgoingTransfer),
}

impl<'a> TransferRef<'a> {
    pub fn is_incoming(&self) -> bool {
        matches!(self, TransferRef::Incoming(_))
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            TransferRef::Incoming(t) => t.amount,
            TransferRef::Outgoing(t) => t.amount,
        }
    }

    pub fn account_index(&self) -> Option<u32> {
        match self {
            TransferRef::Incoming(t) => t.account_index,
            TransferRef::Outgoing(t) => t.account_index,
        }
    }
}
