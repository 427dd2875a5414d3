//! Property tests for the portable storage codec.
//!
//! The decoder sits on a trust boundary: node responses arrive as arbitrary
//! bytes, so it must reject anything malformed without panicking and must
//! never recurse past its depth limit.

use proptest::prelude::*;

use daemon_client::codec::storage::{HEADER_SIZE, SIGNATURE_A, SIGNATURE_B};
use daemon_client::codec::{decode, decode_with, encode, CodecError, DecodeOptions, MalformedKind, WireValue};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_]{1,16}"
}

fn arb_scalar() -> impl Strategy<Value = WireValue> {
    prop_oneof![
        any::<i64>().prop_map(WireValue::I64),
        any::<i32>().prop_map(WireValue::I32),
        any::<i16>().prop_map(WireValue::I16),
        any::<i8>().prop_map(WireValue::I8),
        any::<u64>().prop_map(WireValue::U64),
        any::<u32>().prop_map(WireValue::U32),
        any::<u16>().prop_map(WireValue::U16),
        any::<u8>().prop_map(WireValue::U8),
        any::<f64>().prop_map(WireValue::F64),
        any::<bool>().prop_map(WireValue::Bool),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(WireValue::Bytes),
        ".{0,24}".prop_map(WireValue::String),
    ]
}

/// Homogeneous sequences of one scalar kind
fn arb_scalar_seq() -> impl Strategy<Value = WireValue> {
    prop_oneof![
        prop::collection::vec(any::<u64>().prop_map(WireValue::U64), 0..8),
        prop::collection::vec(any::<i32>().prop_map(WireValue::I32), 0..8),
        prop::collection::vec(any::<bool>().prop_map(WireValue::Bool), 0..8),
        prop::collection::vec(".{0,12}".prop_map(WireValue::String), 0..8),
    ]
    .prop_map(WireValue::Seq)
}

/// Value trees with a section at the root
fn arb_section() -> impl Strategy<Value = WireValue> {
    let leaf = prop_oneof![arb_scalar(), arb_scalar_seq()];
    let value = leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::btree_map(arb_key(), inner, 0..6).prop_map(WireValue::Map),
            // Sequences of sections are homogeneous whatever their contents
            prop::collection::vec(
                prop::collection::btree_map(arb_key(), arb_scalar(), 0..4).prop_map(WireValue::Map),
                0..4
            )
            .prop_map(WireValue::Seq),
        ]
    });
    prop::collection::btree_map(arb_key(), value, 0..8).prop_map(WireValue::Map)
}

/// A root section with `levels` sections nested below it
fn nested_sections(levels: usize) -> WireValue {
    let mut value = WireValue::map().with("leaf", WireValue::U8(1));
    for _ in 0..levels {
        value = WireValue::map().with("child", value);
    }
    value
}

fn header() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE);
    bytes.extend_from_slice(&SIGNATURE_A.to_le_bytes());
    bytes.extend_from_slice(&SIGNATURE_B.to_le_bytes());
    bytes.push(1);
    bytes
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Arbitrary input is rejected or decoded, never a panic.
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode(&bytes);
    }

    /// Garbage behind a valid header exercises the body parser.
    #[test]
    fn garbage_body_never_panics(body in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = header();
        bytes.extend_from_slice(&body);
        if let Ok(value) = decode(&bytes) {
            prop_assert!(value.as_map().is_some());
        }
    }

    /// Anything the encoder accepts decodes to an equal tree.
    #[test]
    fn encoded_trees_decode_equal(tree in arb_section()) {
        let bytes = encode(&tree).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), tree);
    }

    /// Every strict prefix of a valid payload is an error.
    #[test]
    fn truncated_payloads_are_rejected(tree in arb_section(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&tree).unwrap();
        let len = cut.index(bytes.len());
        prop_assert!(decode(&bytes[..len]).is_err());
    }

    /// Extra bytes after the root section are reported, not ignored.
    #[test]
    fn trailing_bytes_are_rejected(tree in arb_section(), extra in prop::collection::vec(any::<u8>(), 1..16)) {
        let mut bytes = encode(&tree).unwrap();
        bytes.extend_from_slice(&extra);
        let is_trailing = matches!(
            decode(&bytes),
            Err(CodecError::MalformedWireFormat { kind: MalformedKind::TrailingBytes(n), .. }) if n == extra.len()
        );
        prop_assert!(is_trailing);
    }

    /// Nesting is accepted exactly up to the configured depth.
    #[test]
    fn depth_limit_is_exact(levels in 0usize..40, max_depth in 1usize..40) {
        let bytes = encode(&nested_sections(levels)).unwrap();
        let result = decode_with(&bytes, &DecodeOptions { max_depth });
        // The root section sits at depth 1
        if levels + 1 <= max_depth {
            prop_assert!(result.is_ok());
        } else {
            let is_depth_error = matches!(
                result,
                Err(CodecError::MalformedWireFormat { kind: MalformedKind::DepthExceeded(_), .. })
            );
            prop_assert!(is_depth_error);
        }
    }

    /// Mixing element kinds in one sequence cannot be encoded.
    #[test]
    fn mixed_sequences_are_rejected(n in any::<u64>(), s in ".{0,8}") {
        let tree = WireValue::map().with("mixed", WireValue::Seq(vec![WireValue::U64(n), WireValue::String(s)]));
        prop_assert_eq!(encode(&tree), Err(CodecError::HeterogeneousSequence("/mixed".to_string())));
    }
}

#[test]
fn deep_input_fails_without_overflowing_the_stack() {
    // A section containing a section containing ... built directly as bytes
    let mut bytes = header();
    for _ in 0..10_000 {
        bytes.extend_from_slice(&[0x04, 0x01, b'a', 0x0c]);
    }
    bytes.push(0x00);

    let is_depth_error = matches!(
        decode(&bytes),
        Err(CodecError::MalformedWireFormat { kind: MalformedKind::DepthExceeded(_), .. })
    );
    assert!(is_depth_error);
}
