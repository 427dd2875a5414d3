//! Transaction inputs and outputs
//!
//! The node describes spent inputs (`vin`) and created outputs (`vout`) with
//! different shapes; both map onto [`Output`].

use crate::core::record::{object, string_of, u32_of, u64_list_of, u64_of, unknown_field, EntityError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transaction output, or the output an input spends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Global output index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Ring member offsets (inputs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_output_indices: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_spent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_frozen: Option<bool>,
}

impl Output {
    /// Build from a `vin` entry: `{"key": {amount, key_offsets, k_image}}`
    pub(crate) fn from_rpc_input(value: &Value) -> Result<Output, EntityError> {
        let entry = object("input", value)?;
        let key = match entry.get("key") {
            Some(key) => key,
            None => {
                return Err(EntityError::invalid(
                    "vin",
                    format!("unsupported input kind: {:?}", entry.keys().collect::<Vec<_>>()),
                ))
            }
        };

        let mut output = Output::default();
        for (field, val) in object("input key", key)? {
            match field.as_str() {
                "amount" => output.amount = Some(u64_of(field, val)?),
                "key_offsets" => output.ring_output_indices = Some(u64_list_of(field, val)?),
                "k_image" => output.key_image = Some(string_of(field, val)?),
                _ => unknown_field("input", field),
            }
        }
        Ok(output)
    }

    /// Build from a `vout` entry: `{amount, target: {key | tagged_key}}`
    pub(crate) fn from_rpc_output(value: &Value) -> Result<Output, EntityError> {
        let mut output = Output::default();
        for (field, val) in object("output", value)? {
            match field.as_str() {
                "amount" => output.amount = Some(u64_of(field, val)?),
                "target" => {
                    let target = object("output target", val)?;
                    if let Some(key) = target.get("key") {
                        output.stealth_public_key = Some(string_of("key", key)?);
                    } else if let Some(tagged) = target.get("tagged_key") {
                        let tagged = object("tagged key", tagged)?;
                        if let Some(key) = tagged.get("key") {
                            output.stealth_public_key = Some(string_of("key", key)?);
                        }
                        if let Some(tag) = tagged.get("view_tag") {
                            output.view_tag = Some(string_of("view_tag", tag)?);
                        }
                    } else {
                        unknown_field("output target", &format!("{:?}", target.keys().collect::<Vec<_>>()));
                    }
                }
                _ => unknown_field("output", field),
            }
        }
        Ok(output)
    }

    /// Wallet-side output record (`incoming_transfers` style)
    pub fn from_wallet(value: &Value) -> Result<Output, EntityError> {
        let mut output = Output::default();
        for (field, val) in object("output", value)? {
            match field.as_str() {
                "amount" => output.amount = Some(u64_of(field, val)?),
                "global_index" => output.index = Some(u64_of(field, val)?),
                "key_image" => output.key_image = Some(string_of(field, val)?),
                "pubkey" => output.stealth_public_key = Some(string_of(field, val)?),
                "spent" => output.is_spent = Some(crate::core::record::bool_of(field, val)?),
                "frozen" => output.is_frozen = Some(crate::core::record::bool_of(field, val)?),
                "subaddr_index" => {
                    let idx = object("subaddr_index", val)?;
                    if let Some(major) = idx.get("major") {
                        output.account_index = Some(u32_of("major", major)?);
                    }
                    if let Some(minor) = idx.get("minor") {
                        output.subaddress_index = Some(u32_of("minor", minor)?);
                    }
                }
                _ => unknown_field("output", field),
            }
        }
        Ok(output)
    }
}
