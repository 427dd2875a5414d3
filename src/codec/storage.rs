//! Portable storage binary encoding
//!
//! Layout of a payload:
//! - 9 byte header (two little-endian signatures and a format version)
//! - root section: varint entry count, then `name_len | name | tag | value`
//!
//! Strings carry a varint length prefix, arrays a tag with the array flag set
//! followed by a varint element count.

use crate::codec::value::{WireMap, WireValue};
use crate::codec::CodecError;
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// First header signature
pub const SIGNATURE_A: u32 = 0x0101_1101;

/// Second header signature
pub const SIGNATURE_B: u32 = 0x0102_0101;

/// Storage format version
pub const FORMAT_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 9;

/// Default nesting limit (matches the node's own recursion limit)
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Wire type tags
pub mod tag {
    pub const INT64: u8 = 1;
    pub const INT32: u8 = 2;
    pub const INT16: u8 = 3;
    pub const INT8: u8 = 4;
    pub const UINT64: u8 = 5;
    pub const UINT32: u8 = 6;
    pub const UINT16: u8 = 7;
    pub const UINT8: u8 = 8;
    pub const DOUBLE: u8 = 9;
    pub const STRING: u8 = 10;
    pub const BOOL: u8 = 11;
    pub const OBJECT: u8 = 12;
    pub const ARRAY: u8 = 13;
    /// Set on a tag to mark an array of that element type
    pub const ARRAY_FLAG: u8 = 0x80;
}

const VARINT_MAX_1: usize = 63;
const VARINT_MAX_2: usize = 16_383;
const VARINT_MAX_4: usize = 1_073_741_823;

// =============================================================================
// Errors
// =============================================================================

/// Reason a byte stream failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    BadSignature,
    UnsupportedVersion(u8),
    Truncated { needed: usize, available: usize },
    UnknownTag(u8),
    ExpectedArray(u8),
    CountOverrun(u64),
    DepthExceeded(usize),
    DuplicateKey(String),
    InvalidKey,
    TrailingBytes(usize),
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::BadSignature => write!(f, "bad section header signature"),
            MalformedKind::UnsupportedVersion(v) => write!(f, "unsupported format version {}", v),
            MalformedKind::Truncated { needed, available } => {
                write!(f, "needed {} bytes, {} available", needed, available)
            }
            MalformedKind::UnknownTag(t) => write!(f, "unknown type tag {:#04x}", t),
            MalformedKind::ExpectedArray(t) => write!(f, "expected array tag, got {:#04x}", t),
            MalformedKind::CountOverrun(n) => write!(f, "count {} overruns the buffer", n),
            MalformedKind::DepthExceeded(limit) => write!(f, "nesting deeper than {}", limit),
            MalformedKind::DuplicateKey(k) => write!(f, "duplicate key '{}'", k),
            MalformedKind::InvalidKey => write!(f, "section key is not valid UTF-8"),
            MalformedKind::TrailingBytes(n) => write!(f, "{} trailing bytes after root", n),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decoder limits
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Maximum nesting of sections and arrays (the root section counts as 1)
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Decode a portable storage payload with default limits
pub fn decode(bytes: &[u8]) -> Result<WireValue, CodecError> {
    decode_with(bytes, &DecodeOptions::default())
}

/// Decode a portable storage payload
pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<WireValue, CodecError> {
    let mut reader = Reader {
        data: bytes,
        pos: 0,
        max_depth: options.max_depth,
    };

    reader.read_header()?;
    let root = reader.read_section(1)?;

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(reader.malformed(MalformedKind::TrailingBytes(remaining)));
    }

    Ok(WireValue::Map(root))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> Reader<'a> {
    fn malformed(&self, kind: MalformedKind) -> CodecError {
        CodecError::MalformedWireFormat {
            offset: self.pos,
            kind,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(self.malformed(MalformedKind::Truncated {
                needed: n,
                available: self.remaining(),
            }));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_header(&mut self) -> Result<(), CodecError> {
        let sig_a = u32::from_le_bytes(self.take_array::<4>()?);
        let sig_b = u32::from_le_bytes(self.take_array::<4>()?);
        if sig_a != SIGNATURE_A || sig_b != SIGNATURE_B {
            self.pos = 0;
            return Err(self.malformed(MalformedKind::BadSignature));
        }
        let version = self.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(self.malformed(MalformedKind::UnsupportedVersion(version)));
        }
        Ok(())
    }

    fn read_varint(&mut self) -> Result<u64, CodecError> {
        let first = *self.data.get(self.pos).ok_or_else(|| {
            self.malformed(MalformedKind::Truncated {
                needed: 1,
                available: 0,
            })
        })?;
        let width = match first & 0x03 {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => 8,
        };
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(self.take(width)?);
        Ok(u64::from_le_bytes(buf) >> 2)
    }

    /// Read an element count and make sure the buffer could hold that many
    /// elements (every element occupies at least one byte)
    fn read_count(&mut self) -> Result<usize, CodecError> {
        let count = self.read_varint()?;
        match usize::try_from(count) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(self.malformed(MalformedKind::CountOverrun(count))),
        }
    }

    fn enter(&self, depth: usize) -> Result<(), CodecError> {
        if depth > self.max_depth {
            return Err(self.malformed(MalformedKind::DepthExceeded(self.max_depth)));
        }
        Ok(())
    }

    fn read_section(&mut self, depth: usize) -> Result<WireMap, CodecError> {
        self.enter(depth)?;
        let count = self.read_count()?;
        let mut map = WireMap::new();

        for _ in 0..count {
            let key_len = self.read_u8()? as usize;
            let key_start = self.pos;
            let key = std::str::from_utf8(self.take(key_len)?)
                .map_err(|_| CodecError::MalformedWireFormat {
                    offset: key_start,
                    kind: MalformedKind::InvalidKey,
                })?
                .to_string();

            let entry_tag = self.read_u8()?;
            let value = if entry_tag & tag::ARRAY_FLAG != 0 {
                self.read_array_body(entry_tag & !tag::ARRAY_FLAG, depth + 1)?
            } else {
                self.read_value(entry_tag, depth)?
            };

            if map.contains_key(&key) {
                self.pos = key_start;
                return Err(self.malformed(MalformedKind::DuplicateKey(key)));
            }
            map.insert(key, value);
        }

        Ok(map)
    }

    /// Read an array whose tag byte has not been consumed yet
    fn read_array(&mut self, depth: usize) -> Result<WireValue, CodecError> {
        let array_tag = self.read_u8()?;
        if array_tag & tag::ARRAY_FLAG == 0 {
            self.pos -= 1;
            return Err(self.malformed(MalformedKind::ExpectedArray(array_tag)));
        }
        self.read_array_body(array_tag & !tag::ARRAY_FLAG, depth)
    }

    fn read_array_body(&mut self, element: u8, depth: usize) -> Result<WireValue, CodecError> {
        self.enter(depth)?;
        let count = self.read_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_value(element, depth)?);
        }
        Ok(WireValue::Seq(items))
    }

    /// Read a single value of a known tag; `depth` is the depth of the
    /// container holding it
    fn read_value(&mut self, value_tag: u8, depth: usize) -> Result<WireValue, CodecError> {
        let value = match value_tag {
            tag::INT64 => WireValue::I64(i64::from_le_bytes(self.take_array()?)),
            tag::INT32 => WireValue::I32(i32::from_le_bytes(self.take_array()?)),
            tag::INT16 => WireValue::I16(i16::from_le_bytes(self.take_array()?)),
            tag::INT8 => WireValue::I8(i8::from_le_bytes(self.take_array()?)),
            tag::UINT64 => WireValue::U64(u64::from_le_bytes(self.take_array()?)),
            tag::UINT32 => WireValue::U32(u32::from_le_bytes(self.take_array()?)),
            tag::UINT16 => WireValue::U16(u16::from_le_bytes(self.take_array()?)),
            tag::UINT8 => WireValue::U8(self.read_u8()?),
            tag::DOUBLE => WireValue::F64(f64::from_le_bytes(self.take_array()?)),
            tag::BOOL => WireValue::Bool(self.read_u8()? != 0),
            tag::STRING => {
                let len = self.read_count()?;
                let raw = self.take(len)?.to_vec();
                match String::from_utf8(raw) {
                    Ok(s) => WireValue::String(s),
                    Err(e) => WireValue::Bytes(e.into_bytes()),
                }
            }
            tag::OBJECT => WireValue::Map(self.read_section(depth + 1)?),
            tag::ARRAY => self.read_array(depth + 1)?,
            other => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.malformed(MalformedKind::UnknownTag(other)));
            }
        };
        Ok(value)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value tree; the root must be a map and every sequence homogeneous
pub fn encode(value: &WireValue) -> Result<Vec<u8>, CodecError> {
    let root = value.as_map().ok_or(CodecError::RootNotSection)?;

    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(&SIGNATURE_A.to_le_bytes());
    out.extend_from_slice(&SIGNATURE_B.to_le_bytes());
    out.push(FORMAT_VERSION);
    write_section(&mut out, root, "")?;
    Ok(out)
}

fn write_varint(out: &mut Vec<u8>, value: usize) {
    let v = value as u64;
    if value <= VARINT_MAX_1 {
        out.push((v << 2) as u8);
    } else if value <= VARINT_MAX_2 {
        out.extend_from_slice(&(((v << 2) | 1) as u16).to_le_bytes());
    } else if value <= VARINT_MAX_4 {
        out.extend_from_slice(&(((v << 2) | 2) as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&((v << 2) | 3).to_le_bytes());
    }
}

fn write_section(out: &mut Vec<u8>, map: &WireMap, path: &str) -> Result<(), CodecError> {
    write_varint(out, map.len());
    for (key, value) in map {
        let key_len = u8::try_from(key.len()).map_err(|_| CodecError::KeyTooLong(key.clone()))?;
        out.push(key_len);
        out.extend_from_slice(key.as_bytes());

        let child = format!("{}/{}", path, key);
        match value {
            WireValue::Seq(items) => {
                let element = element_tag(items, &child)?;
                out.push(element | tag::ARRAY_FLAG);
                write_array_body(out, items, &child)?;
            }
            other => {
                out.push(other.tag());
                write_value(out, other, &child)?;
            }
        }
    }
    Ok(())
}

/// Element tag of a homogeneous sequence (empty sequences use UINT8)
fn element_tag(items: &[WireValue], path: &str) -> Result<u8, CodecError> {
    let Some(first) = items.first() else {
        return Ok(tag::UINT8);
    };
    let element = first.tag();
    if items.iter().any(|item| item.tag() != element) {
        return Err(CodecError::HeterogeneousSequence(path.to_string()));
    }
    Ok(element)
}

fn write_array_body(out: &mut Vec<u8>, items: &[WireValue], path: &str) -> Result<(), CodecError> {
    write_varint(out, items.len());
    for (i, item) in items.iter().enumerate() {
        write_value(out, item, &format!("{}[{}]", path, i))?;
    }
    Ok(())
}

fn write_value(out: &mut Vec<u8>, value: &WireValue, path: &str) -> Result<(), CodecError> {
    match value {
        WireValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::U8(v) => out.push(*v),
        WireValue::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        WireValue::Bool(v) => out.push(u8::from(*v)),
        WireValue::Bytes(b) => {
            write_varint(out, b.len());
            out.extend_from_slice(b);
        }
        WireValue::String(s) => {
            write_varint(out, s.len());
            out.extend_from_slice(s.as_bytes());
        }
        WireValue::Map(map) => write_section(out, map, path)?,
        // Nested array: carries its own tag and count
        WireValue::Seq(items) => {
            let element = element_tag(items, path)?;
            out.push(element | tag::ARRAY_FLAG);
            write_array_body(out, items, path)?;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
