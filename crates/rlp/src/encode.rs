use bytes::BufMut;
use ethereum_types::{H160, H256, U256};

use crate::constants::{RLP_EMPTY_LIST, RLP_NULL};

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Writes the RLP prefix for a byte string of the given length.
/// Single bytes below [`RLP_NULL`] carry no prefix and must be handled by the caller.
pub fn encode_length(total_len: usize, buf: &mut dyn BufMut) {
    if total_len < 56 {
        buf.put_u8(RLP_NULL + total_len as u8);
    } else {
        let len_bytes = minimal_be_bytes(total_len as u64);
        buf.put_u8(0xb7 + len_bytes.len() as u8);
        buf.put_slice(&len_bytes);
    }
}

/// Writes the RLP encoding of an arbitrary byte string.
pub fn encode_bytes(bytes: &[u8], buf: &mut dyn BufMut) {
    if bytes.len() == 1 && bytes[0] < RLP_NULL {
        buf.put_u8(bytes[0]);
    } else {
        encode_length(bytes.len(), buf);
        buf.put_slice(bytes);
    }
}

/// Writes the RLP prefix for a list whose encoded payload has the given length.
pub fn encode_list_prefix(payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len < 56 {
        buf.put_u8(RLP_EMPTY_LIST + payload_len as u8);
    } else {
        let len_bytes = minimal_be_bytes(payload_len as u64);
        buf.put_u8(0xf7 + len_bytes.len() as u8);
        buf.put_slice(&len_bytes);
    }
}

fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

impl RLPEncode for bool {
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }
}

macro_rules! impl_encode_for_uint {
    ($t:ty) => {
        impl RLPEncode for $t {
            fn encode(&self, buf: &mut dyn BufMut) {
                if *self == 0 {
                    buf.put_u8(RLP_NULL);
                } else {
                    let bytes = self.to_be_bytes();
                    let first = bytes
                        .iter()
                        .position(|&b| b != 0)
                        .unwrap_or(bytes.len() - 1);
                    encode_bytes(&bytes[first..], buf);
                }
            }
        }
    };
}

impl_encode_for_uint!(u8);
impl_encode_for_uint!(u16);
impl_encode_for_uint!(u32);
impl_encode_for_uint!(u64);
impl_encode_for_uint!(u128);
impl_encode_for_uint!(usize);

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(31);
        if self.is_zero() {
            buf.put_u8(RLP_NULL);
        } else {
            encode_bytes(&bytes[first..], buf);
        }
    }
}

impl RLPEncode for H160 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for &[u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for bytes::Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for &str {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for String {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

// Byte strings encode through `Bytes`, `&[u8]` or fixed arrays; a `Vec<T>`
// is always an RLP list.
impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_list_prefix(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

impl<T: RLPEncode> RLPEncode for &T {
    fn encode(&self, buf: &mut dyn BufMut) {
        (*self).encode(buf);
    }
}

impl<A: RLPEncode, B: RLPEncode> RLPEncode for (A, B) {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        self.0.encode(&mut payload);
        self.1.encode(&mut payload);
        encode_list_prefix(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

impl<A: RLPEncode, B: RLPEncode, C: RLPEncode> RLPEncode for (A, B, C) {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        self.0.encode(&mut payload);
        self.1.encode(&mut payload);
        self.2.encode(&mut payload);
        encode_list_prefix(payload.len(), buf);
        buf.put_slice(&payload);
    }
}
