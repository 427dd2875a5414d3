//! Wire codec
//!
//! Portable storage binary format, JSON conversion, and batched block
//! response decoding.

pub mod batch;
pub mod json;
pub mod storage;
pub mod value;

pub use batch::{blocks_batch_from_value, decode_blocks_batch, heal_tx_json, BlocksBatch};
pub use json::{binary_to_json, json_to_binary, json_to_wire, parse_embedded_json, wire_to_json};
pub use storage::{decode, decode_with, encode, DecodeOptions, MalformedKind};
pub use value::{WireMap, WireValue};

use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Malformed wire format at offset {offset}: {kind}")]
    MalformedWireFormat { offset: usize, kind: MalformedKind },
    #[error("Sequence at '{0}' mixes element types")]
    HeterogeneousSequence(String),
    #[error("Root value must be a section")]
    RootNotSection,
    #[error("Section key too long ({} bytes): {0}", .0.len())]
    KeyTooLong(String),
    #[error("Malformed embedded JSON: {0}")]
    MalformedEmbeddedJson(String),
    #[error("JSON value at '{0}' has no wire representation")]
    UnrepresentableJson(String),
    #[error("Malformed blocks batch: {0}")]
    MalformedBatch(String),
}
