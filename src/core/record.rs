//! Helpers shared by entity constructors
//!
//! Every entity reads node JSON through the same typed accessors so that RPC
//! responses and decoded wire maps go through one field-name mapping.

use crate::codec::{wire_to_json, CodecError, WireValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Entity construction errors
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl EntityError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        EntityError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Construction Trait
// =============================================================================

/// Entities that can be built from node JSON or a decoded wire map
pub trait RpcEntity: Sized {
    /// Build from an RPC JSON object
    fn from_rpc(value: &Value) -> Result<Self, EntityError>;

    /// Build from a decoded portable storage map
    fn from_wire(value: &WireValue) -> Result<Self, EntityError> {
        Self::from_rpc(&wire_to_json(value))
    }
}

/// `from_rpc` for entities whose node names are covered by serde aliases
pub(crate) fn deserialize_rpc<T: DeserializeOwned>(
    entity: &'static str,
    value: &Value,
) -> Result<T, EntityError> {
    if !value.is_object() {
        return Err(EntityError::NotAnObject(entity));
    }
    Ok(T::deserialize(value)?)
}

/// Borrow a JSON object or fail naming the entity
pub(crate) fn object<'a>(
    entity: &'static str,
    value: &'a Value,
) -> Result<&'a Map<String, Value>, EntityError> {
    value.as_object().ok_or(EntityError::NotAnObject(entity))
}

pub(crate) fn unknown_field(entity: &str, key: &str) {
    log::debug!("Ignoring unknown {} field '{}'", entity, key);
}

// =============================================================================
// Typed Accessors
// =============================================================================

pub(crate) fn u64_of(field: &str, value: &Value) -> Result<u64, EntityError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| EntityError::invalid(field, format!("expected unsigned integer, got {}", n))),
        Value::String(s) => s
            .parse()
            .map_err(|_| EntityError::invalid(field, format!("expected unsigned integer, got '{}'", s))),
        other => Err(EntityError::invalid(field, format!("expected unsigned integer, got {}", other))),
    }
}

pub(crate) fn u32_of(field: &str, value: &Value) -> Result<u32, EntityError> {
    let v = u64_of(field, value)?;
    u32::try_from(v).map_err(|_| EntityError::invalid(field, format!("{} out of range", v)))
}

pub(crate) fn bool_of(field: &str, value: &Value) -> Result<bool, EntityError> {
    match value {
        Value::Bool(b) => Ok(*b),
        // Some node builds emit flags as 0/1
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        other => Err(EntityError::invalid(field, format!("expected boolean, got {}", other))),
    }
}

pub(crate) fn string_of(field: &str, value: &Value) -> Result<String, EntityError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EntityError::invalid(field, format!("expected string, got {}", value)))
}

/// Non-empty string, or `None` for `""`
pub(crate) fn nonempty_string_of(field: &str, value: &Value) -> Result<Option<String>, EntityError> {
    let s = string_of(field, value)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

pub(crate) fn array_of<'a>(field: &str, value: &'a Value) -> Result<&'a Vec<Value>, EntityError> {
    value
        .as_array()
        .ok_or_else(|| EntityError::invalid(field, format!("expected array, got {}", value)))
}

pub(crate) fn u64_list_of(field: &str, value: &Value) -> Result<Vec<u64>, EntityError> {
    array_of(field, value)?.iter().map(|v| u64_of(field, v)).collect()
}

pub(crate) fn string_list_of(field: &str, value: &Value) -> Result<Vec<String>, EntityError> {
    array_of(field, value)?.iter().map(|v| string_of(field, v)).collect()
}

/// Parse a JSON document nested inside a string field
pub(crate) fn nested_json(field: &str, value: &Value) -> Result<Option<Value>, EntityError> {
    let text = string_of(field, value)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| EntityError::invalid(field, format!("malformed nested JSON: {}", e)))
}

/// A hash made only of zeros means "none"
pub(crate) fn is_zero_hash(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

// =============================================================================
// 128-bit Difficulty
// =============================================================================

const LOW_MASK: u128 = u64::MAX as u128;

/// Replace the low 64 bits of a difficulty
pub(crate) fn with_low64(current: Option<u128>, low: u64) -> Option<u128> {
    Some((current.unwrap_or(0) & !LOW_MASK) | low as u128)
}

/// Replace the high 64 bits of a difficulty
pub(crate) fn with_top64(current: Option<u128>, top: u64) -> Option<u128> {
    Some((current.unwrap_or(0) & LOW_MASK) | ((top as u128) << 64))
}

/// Parse a `0x`-prefixed hex difficulty
pub(crate) fn wide_of(field: &str, value: &Value) -> Result<u128, EntityError> {
    let s = string_of(field, value)?;
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u128::from_str_radix(digits, 16)
        .map_err(|_| EntityError::invalid(field, format!("bad wide difficulty '{}'", s)))
}

/// Serde adapter for `Option<u128>`: written as a decimal string, read from
/// a number or a decimal/hex string
pub mod opt_u128 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n as u128)),
            Some(Repr::Text(s)) => {
                let parsed = match s.strip_prefix("0x") {
                    Some(hex) => u128::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                parsed.map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Serde adapter accepting either a string or a number as a string
pub mod string_or_number {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected string or number, got {}",
                other
            ))),
        }
    }
}

/// Serde adapter for ports, which some endpoints send as strings
pub mod loose_u16 {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("port {} out of range", n))),
            Some(Value::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
            Some(other) => Err(serde::de::Error::custom(format!("expected port, got {}", other))),
        }
    }
}
