//! Batched block retrieval responses
//!
//! `get_blocks_by_height.bin` answers with a portable storage payload. Two
//! layouts are understood:
//! - JSON layout: `blocks` is a list of JSON strings and `txs` a list of lists
//!   of JSON strings (one list per block)
//! - Raw layout: `blocks` is a list of `{block: <blob>, txs: [<blob>]}`
//!   sections, yielding blob-only entries

use std::borrow::Cow;

use crate::codec::json::parse_embedded_json;
use crate::codec::storage;
use crate::codec::value::WireValue;
use crate::codec::CodecError;

/// Decoded batch of blocks with their transactions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlocksBatch {
    /// One structured value per block, in response order
    pub blocks: Vec<WireValue>,
    /// Transactions of each block; same length as `blocks`
    pub transactions_per_block: Vec<Vec<WireValue>>,
    /// Node status string, when present
    pub status: Option<String>,
}

impl BlocksBatch {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Decode a batched block response from portable storage bytes
pub fn decode_blocks_batch(bytes: &[u8]) -> Result<BlocksBatch, CodecError> {
    let root = storage::decode(bytes)?;
    blocks_batch_from_value(&root)
}

/// Interpret an already decoded batched block response
pub fn blocks_batch_from_value(root: &WireValue) -> Result<BlocksBatch, CodecError> {
    let status = root.get("status").and_then(WireValue::as_str).map(str::to_string);

    let blocks = match root.get("blocks") {
        None => &[][..],
        Some(v) => v
            .as_seq()
            .ok_or_else(|| CodecError::MalformedBatch("'blocks' is not a list".to_string()))?,
    };

    let mut batch = BlocksBatch {
        status,
        ..Default::default()
    };

    if blocks.iter().all(|b| b.as_map().is_some()) && !blocks.is_empty() {
        for entry in blocks {
            let (block, txs) = raw_entry(entry)?;
            batch.blocks.push(block);
            batch.transactions_per_block.push(txs);
        }
        return Ok(batch);
    }

    for (i, entry) in blocks.iter().enumerate() {
        let text = entry
            .as_str()
            .ok_or_else(|| CodecError::MalformedBatch(format!("block {} is not a JSON string", i)))?;
        batch.blocks.push(parse_embedded_json(text)?);
    }

    match root.get("txs") {
        None => batch.transactions_per_block = vec![Vec::new(); batch.blocks.len()],
        Some(txs) => {
            let lists = txs
                .as_seq()
                .ok_or_else(|| CodecError::MalformedBatch("'txs' is not a list".to_string()))?;
            if lists.len() != batch.blocks.len() {
                return Err(CodecError::MalformedBatch(format!(
                    "{} transaction lists for {} blocks",
                    lists.len(),
                    batch.blocks.len()
                )));
            }
            for (i, list) in lists.iter().enumerate() {
                let items = list.as_seq().ok_or_else(|| {
                    CodecError::MalformedBatch(format!("transactions of block {} are not a list", i))
                })?;
                let mut txs = Vec::with_capacity(items.len());
                for item in items {
                    let text = item.as_str().ok_or_else(|| {
                        CodecError::MalformedBatch(format!(
                            "transaction of block {} is not a JSON string",
                            i
                        ))
                    })?;
                    txs.push(parse_embedded_json(&heal_tx_json(text))?);
                }
                batch.transactions_per_block.push(txs);
            }
        }
    }

    Ok(batch)
}

/// Restore the opening brace some nodes strip from transaction JSON
///
/// A string that starts (after whitespace) with `,` gets that comma replaced
/// by `{`. A closing `}` is appended only when the result does not already
/// parse as a complete object. Anything else passes through.
pub fn heal_tx_json(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    match trimmed.strip_prefix(',') {
        Some(rest) => {
            log::debug!("Healing transaction JSON missing its opening brace");
            let opened = format!("{{{}", rest);
            if serde_json::from_str::<serde::de::IgnoredAny>(&opened).is_ok() {
                Cow::Owned(opened)
            } else {
                Cow::Owned(format!("{}}}", opened))
            }
        }
        None => Cow::Borrowed(text),
    }
}

fn raw_entry(entry: &WireValue) -> Result<(WireValue, Vec<WireValue>), CodecError> {
    let blob = entry
        .get("block")
        .and_then(WireValue::as_bytes)
        .ok_or_else(|| CodecError::MalformedBatch("block entry without 'block' blob".to_string()))?;
    let block = WireValue::map().with("blob", hex::encode(blob));

    let mut txs = Vec::new();
    if let Some(list) = entry.get("txs") {
        let items = list
            .as_seq()
            .ok_or_else(|| CodecError::MalformedBatch("'txs' of block entry is not a list".to_string()))?;
        for item in items {
            txs.push(raw_tx(item)?);
        }
    }
    Ok((block, txs))
}

fn raw_tx(item: &WireValue) -> Result<WireValue, CodecError> {
    if let Some(blob) = item.as_bytes() {
        return Ok(WireValue::map().with("as_hex", hex::encode(blob)));
    }
    // Pruned entries: {blob, prunable_hash}
    let blob = item
        .get("blob")
        .and_then(WireValue::as_bytes)
        .ok_or_else(|| CodecError::MalformedBatch("transaction entry without blob".to_string()))?;
    let mut tx = WireValue::map().with("pruned_as_hex", hex::encode(blob));
    if let Some(hash) = item.get("prunable_hash").and_then(WireValue::as_bytes) {
        tx = tx.with("prunable_hash", hex::encode(hash));
    }
    Ok(tx)
}
