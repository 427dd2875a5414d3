//! Structured value tree carried by the portable storage format
//!
//! Every decoded payload is a `WireValue::Map` at the root. Scalars keep the
//! exact width and signedness they were encoded with.

use std::collections::BTreeMap;

use crate::codec::storage::tag;

/// Section (object) contents, key-sorted
pub type WireMap = BTreeMap<String, WireValue>;

/// A self-describing value decoded from (or destined for) the wire
#[derive(Debug, Clone)]
pub enum WireValue {
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    U64(u64),
    U32(u32),
    U16(u16),
    U8(u8),
    F64(f64),
    Bool(bool),
    /// Raw byte-string (may hold any byte, including zero)
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Ordered sequence; must be homogeneous to be encodable
    Seq(Vec<WireValue>),
    Map(WireMap),
}

impl WireValue {
    /// Wire type tag this value is encoded with
    pub fn tag(&self) -> u8 {
        match self {
            WireValue::I64(_) => tag::INT64,
            WireValue::I32(_) => tag::INT32,
            WireValue::I16(_) => tag::INT16,
            WireValue::I8(_) => tag::INT8,
            WireValue::U64(_) => tag::UINT64,
            WireValue::U32(_) => tag::UINT32,
            WireValue::U16(_) => tag::UINT16,
            WireValue::U8(_) => tag::UINT8,
            WireValue::F64(_) => tag::DOUBLE,
            WireValue::Bool(_) => tag::BOOL,
            WireValue::Bytes(_) | WireValue::String(_) => tag::STRING,
            WireValue::Seq(_) => tag::ARRAY,
            WireValue::Map(_) => tag::OBJECT,
        }
    }

    /// Create an empty map value
    pub fn map() -> Self {
        WireValue::Map(WireMap::new())
    }

    /// Insert a key into a map value; no-op on other variants
    pub fn with(mut self, key: &str, value: impl Into<WireValue>) -> Self {
        if let WireValue::Map(map) = &mut self {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Look up a key when this is a map
    pub fn get(&self, key: &str) -> Option<&WireValue> {
        match self {
            WireValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&WireMap> {
        match self {
            WireValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// String view; byte-strings qualify when they hold valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            WireValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Raw bytes of a string or byte-string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireValue::String(s) => Some(s.as_bytes()),
            WireValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer that fits in `u64` without loss
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            WireValue::U64(v) => Some(v),
            WireValue::U32(v) => Some(v as u64),
            WireValue::U16(v) => Some(v as u64),
            WireValue::U8(v) => Some(v as u64),
            WireValue::I64(v) => u64::try_from(v).ok(),
            WireValue::I32(v) => u64::try_from(v).ok(),
            WireValue::I16(v) => u64::try_from(v).ok(),
            WireValue::I8(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any integer that fits in `i64` without loss
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            WireValue::I64(v) => Some(v),
            WireValue::I32(v) => Some(v as i64),
            WireValue::I16(v) => Some(v as i64),
            WireValue::I8(v) => Some(v as i64),
            WireValue::U64(v) => i64::try_from(v).ok(),
            WireValue::U32(v) => Some(v as i64),
            WireValue::U16(v) => Some(v as i64),
            WireValue::U8(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            WireValue::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for WireValue {
    fn eq(&self, other: &Self) -> bool {
        use WireValue::*;
        match (self, other) {
            (I64(a), I64(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U16(a), U16(b)) => a == b,
            (U8(a), U8(b)) => a == b,
            // Bitwise, so NaN payloads and signed zeros survive comparison
            (F64(a), F64(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (String(a), String(b)) => a == b,
            // One wire tag covers both, so they are indistinguishable
            (String(a), Bytes(b)) | (Bytes(b), String(a)) => a.as_bytes() == b.as_slice(),
            (Seq(a), Seq(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for WireValue {
                fn from(v: $ty) -> Self {
                    WireValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar!(
    i64 => I64, i32 => I32, i16 => I16, i8 => I8,
    u64 => U64, u32 => U32, u16 => U16, u8 => U8,
    f64 => F64, bool => Bool, String => String, Vec<u8> => Bytes,
    Vec<WireValue> => Seq, WireMap => Map,
);

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_bytes_compare_by_content() {
        let s = WireValue::from("abc");
        let b = WireValue::Bytes(b"abc".to_vec());
        assert_eq!(s, b);
        assert_ne!(s, WireValue::Bytes(b"abd".to_vec()));
    }

    #[test]
    fn test_widths_are_distinct() {
        assert_ne!(WireValue::U8(1), WireValue::U64(1));
        assert_eq!(WireValue::U8(1).as_u64(), Some(1));
        assert_eq!(WireValue::I8(-1).as_u64(), None);
        assert_eq!(WireValue::I8(-1).as_i64(), Some(-1));
    }

    #[test]
    fn test_map_builder() {
        let v = WireValue::map().with("height", 100u64).with("ok", true);
        assert_eq!(v.get("height").and_then(WireValue::as_u64), Some(100));
        assert_eq!(v.get("ok").and_then(WireValue::as_bool), Some(true));
        assert!(v.get("missing").is_none());
    }
}
