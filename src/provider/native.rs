//! Pure-Rust provider
//!
//! Storage goes through the in-crate codec. Addresses are checked by
//! decoding their block-wise base58 form, verifying the Keccak-256 checksum
//! and matching the network prefix.

use crate::codec::{self, WireValue};
use crate::core::NetworkType;
use crate::provider::{CryptoProvider, ProviderError};
use bytes::Bytes;
use sha3::{Digest, Keccak256};

// =============================================================================
// Constants
// =============================================================================

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded length of a block of `i` bytes
const ENCODED_BLOCK_SIZES: [usize; FULL_BLOCK_SIZE + 1] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

const CHECKSUM_SIZE: usize = 4;
const KEY_SIZE: usize = 32;
const PAYMENT_ID_SIZE: usize = 8;

/// prefix + spend key + view key + checksum
const STANDARD_ADDRESS_SIZE: usize = 1 + 2 * KEY_SIZE + CHECKSUM_SIZE;
const INTEGRATED_ADDRESS_SIZE: usize = STANDARD_ADDRESS_SIZE + PAYMENT_ID_SIZE;

// =============================================================================
// Address Types
// =============================================================================

/// Kind of address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Standard,
    Integrated,
    Subaddress,
}

/// Address prefixes per network: (standard, integrated, subaddress)
fn prefixes(network: NetworkType) -> [(u8, AddressType); 3] {
    let (standard, integrated, subaddress) = match network {
        NetworkType::Mainnet => (18, 19, 42),
        NetworkType::Testnet => (53, 54, 63),
        NetworkType::Stagenet => (24, 25, 36),
    };
    [
        (standard, AddressType::Standard),
        (integrated, AddressType::Integrated),
        (subaddress, AddressType::Subaddress),
    ]
}

/// Fields of a decoded address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub network: NetworkType,
    pub address_type: AddressType,
    pub public_spend_key: String,
    pub public_view_key: String,
    pub payment_id: Option<String>,
}

/// Decode and check an address for any network
pub fn decode_address(address: &str) -> Result<DecodedAddress, ProviderError> {
    let raw = base58_decode(address)?;
    if raw.len() != STANDARD_ADDRESS_SIZE && raw.len() != INTEGRATED_ADDRESS_SIZE {
        return Err(ProviderError::InvalidAddress(format!(
            "decoded length {} is not an address",
            raw.len()
        )));
    }

    let (body, checksum) = raw.split_at(raw.len() - CHECKSUM_SIZE);
    let digest = Keccak256::digest(body);
    if digest[..CHECKSUM_SIZE] != *checksum {
        return Err(ProviderError::InvalidAddress("checksum mismatch".to_string()));
    }

    let prefix = body[0];
    let (network, address_type) = [NetworkType::Mainnet, NetworkType::Testnet, NetworkType::Stagenet]
        .into_iter()
        .find_map(|network| {
            prefixes(network)
                .into_iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, kind)| (network, kind))
        })
        .ok_or_else(|| ProviderError::InvalidAddress(format!("unknown prefix {}", prefix)))?;

    let expected_size = match address_type {
        AddressType::Integrated => INTEGRATED_ADDRESS_SIZE,
        _ => STANDARD_ADDRESS_SIZE,
    };
    if raw.len() != expected_size {
        return Err(ProviderError::InvalidAddress(format!(
            "{:?} address has wrong length {}",
            address_type,
            raw.len()
        )));
    }

    let spend = &body[1..1 + KEY_SIZE];
    let view = &body[1 + KEY_SIZE..1 + 2 * KEY_SIZE];
    let payment_id = (address_type == AddressType::Integrated)
        .then(|| hex::encode(&body[1 + 2 * KEY_SIZE..]));

    Ok(DecodedAddress {
        network,
        address_type,
        public_spend_key: hex::encode(spend),
        public_view_key: hex::encode(view),
        payment_id,
    })
}

// =============================================================================
// Block-wise Base58
// =============================================================================

/// Decode the block-wise base58 used by addresses
///
/// Every 8-byte block encodes to exactly 11 characters; a shorter final
/// block uses the size from `ENCODED_BLOCK_SIZES`.
pub fn base58_decode(text: &str) -> Result<Vec<u8>, ProviderError> {
    let bytes = text.as_bytes();
    let last_encoded = bytes.len() % FULL_ENCODED_BLOCK_SIZE;
    let last_size = ENCODED_BLOCK_SIZES
        .iter()
        .position(|&n| n == last_encoded)
        .ok_or_else(|| ProviderError::InvalidAddress(format!("invalid length {}", text.len())))?;

    let mut out = Vec::with_capacity(bytes.len() / FULL_ENCODED_BLOCK_SIZE * FULL_BLOCK_SIZE + last_size);
    for chunk in bytes.chunks(FULL_ENCODED_BLOCK_SIZE) {
        let size = if chunk.len() == FULL_ENCODED_BLOCK_SIZE {
            FULL_BLOCK_SIZE
        } else {
            last_size
        };
        decode_block(chunk, size, &mut out)?;
    }
    Ok(out)
}

fn decode_block(chunk: &[u8], size: usize, out: &mut Vec<u8>) -> Result<(), ProviderError> {
    let digits = bs58::decode(chunk)
        .into_vec()
        .map_err(|e| ProviderError::InvalidAddress(e.to_string()))?;
    // Leading '1's decode to zero bytes; only the numeric value matters
    let first = digits.iter().position(|&b| b != 0).unwrap_or(digits.len());
    let value = &digits[first..];
    if value.len() > size {
        return Err(ProviderError::InvalidAddress("base58 block overflow".to_string()));
    }
    out.extend(std::iter::repeat(0u8).take(size - value.len()));
    out.extend_from_slice(value);
    Ok(())
}

/// Encode bytes with block-wise base58
pub fn base58_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() / FULL_BLOCK_SIZE * FULL_ENCODED_BLOCK_SIZE + FULL_ENCODED_BLOCK_SIZE);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        let width = ENCODED_BLOCK_SIZES[block.len()];
        let first = block.iter().position(|&b| b != 0).unwrap_or(block.len());
        let digits = bs58::encode(&block[first..]).into_string();
        out.extend(std::iter::repeat('1').take(width - digits.len()));
        out.push_str(&digits);
    }
    out
}

// =============================================================================
// Provider
// =============================================================================

/// Provider implemented entirely in this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProvider;

impl CryptoProvider for NativeProvider {
    fn validate_address(&self, address: &str, network: NetworkType) -> Result<(), ProviderError> {
        let decoded = decode_address(address)?;
        if decoded.network != network {
            return Err(ProviderError::InvalidAddress(format!(
                "address is for {}, expected {}",
                decoded.network, network
            )));
        }
        Ok(())
    }

    fn decode_storage(&self, bytes: Bytes) -> Result<WireValue, ProviderError> {
        Ok(codec::decode(&bytes)?)
    }

    fn encode_storage(&self, value: &WireValue) -> Result<Bytes, ProviderError> {
        Ok(Bytes::from(codec::encode(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_address(prefix: u8, payment_id: Option<[u8; 8]>) -> String {
        let mut body = vec![prefix];
        body.extend_from_slice(&[0x11; KEY_SIZE]);
        body.extend_from_slice(&[0x22; KEY_SIZE]);
        if let Some(id) = payment_id {
            body.extend_from_slice(&id);
        }
        let digest = Keccak256::digest(&body);
        body.extend_from_slice(&digest[..CHECKSUM_SIZE]);
        base58_encode(&body)
    }

    #[test]
    fn test_base58_blocks() {
        for data in [vec![], vec![0u8], vec![0u8; 8], vec![0xff; 8], (0u8..21).collect::<Vec<_>>()] {
            let encoded = base58_encode(&data);
            assert_eq!(base58_decode(&encoded).unwrap(), data);
        }
        assert_eq!(base58_encode(&[0u8; 8]), "11111111111");
        assert!(base58_decode("1").is_err());
    }

    #[test]
    fn test_block_overflow_rejected() {
        // 'z' x 11 exceeds 2^64
        assert!(base58_decode("zzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_address_lengths() {
        assert_eq!(make_address(18, None).len(), 95);
        assert_eq!(make_address(19, Some([7; 8])).len(), 106);
    }

    #[test]
    fn test_validate_networks() {
        let provider = NativeProvider;
        let mainnet = make_address(18, None);
        assert!(provider.validate_address(&mainnet, NetworkType::Mainnet).is_ok());
        assert!(provider.validate_address(&mainnet, NetworkType::Testnet).is_err());

        let stagenet_sub = make_address(36, None);
        assert!(provider.validate_address(&stagenet_sub, NetworkType::Stagenet).is_ok());
        assert_eq!(decode_address(&stagenet_sub).unwrap().address_type, AddressType::Subaddress);
    }

    #[test]
    fn test_integrated_address() {
        let address = make_address(54, Some([0xab; 8]));
        let decoded = decode_address(&address).unwrap();
        assert_eq!(decoded.network, NetworkType::Testnet);
        assert_eq!(decoded.address_type, AddressType::Integrated);
        assert_eq!(decoded.payment_id.as_deref(), Some("abababababababab"));
    }

    #[test]
    fn test_corruption_detected() {
        let address = make_address(18, None);
        let mut chars: Vec<char> = address.chars().collect();
        chars[50] = if chars[50] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();
        assert!(decode_address(&corrupted).is_err());

        // Integrated prefix with a standard-length body
        assert!(decode_address(&make_address(19, None)).is_err());
        assert!(decode_address(&make_address(99, None)).is_err());
    }

    #[test]
    fn test_storage_round_trip() {
        let provider = NativeProvider;
        let value = WireValue::map().with("height", 7u64);
        let bytes = provider.encode_storage(&value).unwrap();
        assert_eq!(provider.decode_storage(bytes).unwrap(), value);
        assert!(provider.decode_storage(Bytes::from_static(b"junk")).is_err());
    }
}
