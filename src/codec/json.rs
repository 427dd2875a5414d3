//! Conversion between wire values and JSON
//!
//! Unsigned integers map to `U64`, negative ones to `I64` and fractional
//! numbers to `F64`. Byte-strings that are not UTF-8 render as hex.

use crate::codec::storage;
use crate::codec::value::{WireMap, WireValue};
use crate::codec::CodecError;
use serde_json::{Map, Number, Value};

/// Render a wire value as JSON
///
/// Non-finite doubles have no JSON form and become `null`.
pub fn wire_to_json(value: &WireValue) -> Value {
    match value {
        WireValue::I64(v) => Value::from(*v),
        WireValue::I32(v) => Value::from(*v),
        WireValue::I16(v) => Value::from(*v),
        WireValue::I8(v) => Value::from(*v),
        WireValue::U64(v) => Value::from(*v),
        WireValue::U32(v) => Value::from(*v),
        WireValue::U16(v) => Value::from(*v),
        WireValue::U8(v) => Value::from(*v),
        WireValue::F64(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
        WireValue::Bool(v) => Value::Bool(*v),
        WireValue::String(s) => Value::String(s.clone()),
        WireValue::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::String(hex::encode(b)),
        },
        WireValue::Seq(items) => Value::Array(items.iter().map(wire_to_json).collect()),
        WireValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), wire_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Convert JSON into a wire value
///
/// `null` object members are dropped; `null` inside an array has no wire
/// form and is rejected.
pub fn json_to_wire(value: &Value) -> Result<WireValue, CodecError> {
    json_to_wire_at(value, "")
}

fn json_to_wire_at(value: &Value, path: &str) -> Result<WireValue, CodecError> {
    let wire = match value {
        Value::Null => return Err(CodecError::UnrepresentableJson(path.to_string())),
        Value::Bool(b) => WireValue::Bool(*b),
        Value::Number(n) => number_to_wire(n, path)?,
        Value::String(s) => WireValue::String(s.clone()),
        Value::Array(items) => WireValue::Seq(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| json_to_wire_at(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(members) => {
            let mut map = WireMap::new();
            for (key, member) in members {
                if member.is_null() {
                    continue;
                }
                map.insert(key.clone(), json_to_wire_at(member, &format!("{}/{}", path, key))?);
            }
            WireValue::Map(map)
        }
    };
    Ok(wire)
}

fn number_to_wire(n: &Number, path: &str) -> Result<WireValue, CodecError> {
    if let Some(v) = n.as_u64() {
        Ok(WireValue::U64(v))
    } else if let Some(v) = n.as_i64() {
        Ok(WireValue::I64(v))
    } else if let Some(v) = n.as_f64() {
        Ok(WireValue::F64(v))
    } else {
        Err(CodecError::UnrepresentableJson(path.to_string()))
    }
}

/// Parse a JSON document embedded in a wire string
pub fn parse_embedded_json(text: &str) -> Result<WireValue, CodecError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CodecError::MalformedEmbeddedJson(e.to_string()))?;
    json_to_wire(&value)
}

/// Decode portable storage bytes straight to JSON
pub fn binary_to_json(bytes: &[u8]) -> Result<Value, CodecError> {
    Ok(wire_to_json(&storage::decode(bytes)?))
}

/// Encode a JSON object as portable storage bytes
pub fn json_to_binary(value: &Value) -> Result<Vec<u8>, CodecError> {
    storage::encode(&json_to_wire(value)?)
}
