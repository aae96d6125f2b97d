use bytes::Bytes;
use ethereum_types::{H160, H256, U256};

use crate::constants::RLP_NULL;
use crate::error::RLPDecodeError;

pub trait RLPDecode: Sized {
    /// Decodes one RLP item from the start of `rlp`, returning the value and
    /// the remaining undecoded bytes.
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    /// Decodes an RLP item that spans the whole input.
    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (value, rest) = Self::decode_unfinished(rlp)?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(value)
    }
}

/// Splits the next RLP byte-string item into its payload and the remaining input.
/// Rejects non-canonical encodings: a single byte below [`RLP_NULL`] wrapped in a
/// length prefix, and long-form lengths that fit the short form.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_item(data)?;
    if is_list {
        return Err(RLPDecodeError::UnexpectedList);
    }
    Ok((payload, rest))
}

/// Splits the next RLP list item into its payload and the remaining input.
pub fn decode_list_payload(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_item(data)?;
    if !is_list {
        return Err(RLPDecodeError::UnexpectedString);
    }
    Ok((payload, rest))
}

/// Parses the header of the next RLP item: returns whether it is a list, its
/// payload, and the input remaining after it.
pub fn decode_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let first = *data.first().ok_or(RLPDecodeError::InvalidLength)?;
    match first {
        // Single byte, its own encoding
        0x00..=0x7f => Ok((false, &data[..1], &data[1..])),
        // Short string
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            let payload = data.get(1..1 + len).ok_or(RLPDecodeError::InvalidLength)?;
            if len == 1 && payload[0] < RLP_NULL {
                return Err(RLPDecodeError::MalformedData);
            }
            Ok((false, payload, &data[1 + len..]))
        }
        // Long string
        0xb8..=0xbf => {
            let (len, header_len) = decode_long_length(data, first - 0xb7)?;
            let payload = data
                .get(header_len..header_len + len)
                .ok_or(RLPDecodeError::InvalidLength)?;
            Ok((false, payload, &data[header_len + len..]))
        }
        // Short list
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            let payload = data.get(1..1 + len).ok_or(RLPDecodeError::InvalidLength)?;
            Ok((true, payload, &data[1 + len..]))
        }
        // Long list
        0xf8..=0xff => {
            let (len, header_len) = decode_long_length(data, first - 0xf7)?;
            let payload = data
                .get(header_len..header_len + len)
                .ok_or(RLPDecodeError::InvalidLength)?;
            Ok((true, payload, &data[header_len + len..]))
        }
    }
}

fn decode_long_length(data: &[u8], len_of_len: u8) -> Result<(usize, usize), RLPDecodeError> {
    let len_of_len = len_of_len as usize;
    let len_bytes = data
        .get(1..1 + len_of_len)
        .ok_or(RLPDecodeError::InvalidLength)?;
    if len_bytes[0] == 0 {
        return Err(RLPDecodeError::MalformedData);
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RLPDecodeError::InvalidLength);
    }
    let mut len: usize = 0;
    for byte in len_bytes {
        len = (len << 8) | *byte as usize;
    }
    if len < 56 {
        // Must have used the short form
        return Err(RLPDecodeError::MalformedData);
    }
    Ok((len, 1 + len_of_len))
}

/// Whether the next RLP item is a byte string (as opposed to a list).
pub fn is_encoded_as_bytes(rlp: &[u8]) -> Result<bool, RLPDecodeError> {
    let first = rlp.first().ok_or(RLPDecodeError::InvalidLength)?;
    Ok(*first < 0xc0)
}

/// Payload of the byte-string item at the start of `rlp`.
pub fn get_rlp_bytes_item_payload(rlp: &[u8]) -> Result<&[u8], RLPDecodeError> {
    decode_bytes(rlp).map(|(payload, _)| payload)
}

fn decode_uint_bytes(data: &[u8], max_len: usize) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (payload, rest) = decode_bytes(data)?;
    if payload.first() == Some(&0) {
        return Err(RLPDecodeError::MalformedUint);
    }
    if payload.len() > max_len {
        return Err(RLPDecodeError::InvalidLength);
    }
    Ok((payload, rest))
}

impl RLPDecode for bool {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first = *rlp.first().ok_or(RLPDecodeError::InvalidLength)?;
        match first {
            RLP_NULL => Ok((false, &rlp[1..])),
            0x01 => Ok((true, &rlp[1..])),
            _ => Err(RLPDecodeError::MalformedBoolean),
        }
    }
}

macro_rules! impl_decode_for_uint {
    ($t:ty) => {
        impl RLPDecode for $t {
            fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                const SIZE: usize = std::mem::size_of::<$t>();
                let (payload, rest) = decode_uint_bytes(rlp, SIZE)?;
                let mut padded = [0u8; SIZE];
                padded[SIZE - payload.len()..].copy_from_slice(payload);
                Ok((<$t>::from_be_bytes(padded), rest))
            }
        }
    };
}

impl_decode_for_uint!(u8);
impl_decode_for_uint!(u16);
impl_decode_for_uint!(u32);
impl_decode_for_uint!(u64);
impl_decode_for_uint!(u128);
impl_decode_for_uint!(usize);

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_uint_bytes(rlp, 32)?;
        Ok((U256::from_big_endian(payload), rest))
    }
}

impl RLPDecode for H160 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        if payload.len() != 20 {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok((H160::from_slice(payload), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        if payload.len() != 32 {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok((H256::from_slice(payload), rest))
    }
}

impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        let array: [u8; N] = payload
            .try_into()
            .map_err(|_| RLPDecodeError::InvalidLength)?;
        Ok((array, rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(payload), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        let value = String::from_utf8(payload.to_vec())
            .map_err(|_| RLPDecodeError::MalformedData)?;
        Ok((value, rest))
    }
}

// Mirrors the encode side: `Vec<T>` is always an RLP list, byte strings
// decode through `Bytes` or fixed arrays.
impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (mut payload, rest) = decode_list_payload(rlp)?;
        let mut items = Vec::new();
        while !payload.is_empty() {
            let (item, next) = T::decode_unfinished(payload)?;
            items.push(item);
            payload = next;
        }
        Ok((items, rest))
    }
}

impl<A: RLPDecode, B: RLPDecode> RLPDecode for (A, B) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_list_payload(rlp)?;
        let (first, payload) = A::decode_unfinished(payload)?;
        let (second, payload) = B::decode_unfinished(payload)?;
        if !payload.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(((first, second), rest))
    }
}

impl<A: RLPDecode, B: RLPDecode, C: RLPDecode> RLPDecode for (A, B, C) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_list_payload(rlp)?;
        let (first, payload) = A::decode_unfinished(payload)?;
        let (second, payload) = B::decode_unfinished(payload)?;
        let (third, payload) = C::decode_unfinished(payload)?;
        if !payload.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(((first, second, third), rest))
    }
}
