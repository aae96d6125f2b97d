use ethereum_types::U256;
use hex::FromHexError;

use crate::error::TxError;

/// Rejects integer fields whose byte representation starts with a zero byte.
/// The canonical zero is the empty byte string, so any leading zero means a
/// non-canonical encoding.
pub fn validate_no_leading_zeroes(fields: &[(&'static str, &[u8])]) -> Result<(), TxError> {
    for (field, bytes) in fields {
        if !bytes.is_empty() && bytes[0] == 0 {
            return Err(TxError::MalformedField {
                field,
                reason: "leading zero bytes are not canonical".to_string(),
            });
        }
    }
    Ok(())
}

/// Parses a minimal big-endian unsigned integer of at most 8 bytes.
pub fn u64_from_big_endian(field: &'static str, bytes: &[u8]) -> Result<u64, TxError> {
    if bytes.len() > 8 {
        return Err(TxError::BoundsExceeded {
            field,
            reason: "exceeds 2^64 - 1".to_string(),
        });
    }
    let mut padded = [0u8; 8];
    padded[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(padded))
}

/// Parses a minimal big-endian unsigned integer of at most 32 bytes.
pub fn u256_from_big_endian(field: &'static str, bytes: &[u8]) -> Result<U256, TxError> {
    if bytes.len() > 32 {
        return Err(TxError::BoundsExceeded {
            field,
            reason: "exceeds 2^256 - 1".to_string(),
        });
    }
    Ok(U256::from_big_endian(bytes))
}

/// Narrows a 256-bit value into 64 bits.
pub fn u256_to_u64(field: &'static str, value: U256) -> Result<u64, TxError> {
    if value > U256::from(u64::MAX) {
        return Err(TxError::BoundsExceeded {
            field,
            reason: "does not fit in 64 bits".to_string(),
        });
    }
    Ok(value.as_u64())
}

/// Minimal big-endian representation; zero is the empty byte string.
pub fn u256_to_minimal_be(value: U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    match bytes.iter().position(|&byte| byte != 0) {
        Some(first) => bytes[first..].to_vec(),
        None => Vec::new(),
    }
}

/// Minimal big-endian representation; zero is the empty byte string.
pub fn u64_to_minimal_be(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    match bytes.iter().position(|&byte| byte != 0) {
        Some(first) => bytes[first..].to_vec(),
        None => Vec::new(),
    }
}

pub fn decode_hex(hex: &str) -> Result<Vec<u8>, FromHexError> {
    let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
    hex::decode(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_detection() {
        assert!(validate_no_leading_zeroes(&[("nonce", &[0x09])]).is_ok());
        assert!(validate_no_leading_zeroes(&[("nonce", &[])]).is_ok());
        let err = validate_no_leading_zeroes(&[("nonce", &[0x00])]).unwrap_err();
        assert!(matches!(
            err,
            TxError::MalformedField { field: "nonce", .. }
        ));
        assert!(validate_no_leading_zeroes(&[("value", &[0x00, 0x01])]).is_err());
    }

    #[test]
    fn u64_bounds() {
        assert_eq!(u64_from_big_endian("nonce", &[]).unwrap(), 0);
        assert_eq!(u64_from_big_endian("nonce", &[0x09]).unwrap(), 9);
        assert_eq!(
            u64_from_big_endian("nonce", &[0xff; 8]).unwrap(),
            u64::MAX
        );
        assert!(u64_from_big_endian("nonce", &[0x01; 9]).is_err());
    }

    #[test]
    fn u256_narrowing() {
        assert_eq!(u256_to_u64("gas", U256::from(21000)).unwrap(), 21000);
        assert!(u256_to_u64("gas", U256::from(u64::MAX) + U256::one()).is_err());
    }

    #[test]
    fn minimal_be_roundtrip() {
        assert!(u256_to_minimal_be(U256::zero()).is_empty());
        assert_eq!(u256_to_minimal_be(U256::from(0x0400)), vec![0x04, 0x00]);
        assert_eq!(u64_to_minimal_be(9), vec![0x09]);
        let bytes = u256_to_minimal_be(U256::MAX);
        assert_eq!(bytes.len(), 32);
        assert_eq!(
            u256_from_big_endian("value", &bytes).unwrap(),
            U256::MAX
        );
    }

    #[test]
    fn hex_decoding_accepts_prefix() {
        assert_eq!(decode_hex("0x0102").unwrap(), vec![0x01, 0x02]);
        assert_eq!(decode_hex("0102").unwrap(), vec![0x01, 0x02]);
        assert!(decode_hex("0xzz").is_err());
    }
}
