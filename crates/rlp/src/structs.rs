use bytes::BufMut;

use crate::{
    decode::{decode_list_payload, RLPDecode},
    encode::{encode_list_prefix, RLPEncode},
    error::RLPDecodeError,
};

/// Builder for the RLP encoding of a list, field by field.
///
/// ```
/// # use ethtx_rlp::structs::Encoder;
/// let mut buf = vec![];
/// Encoder::new(&mut buf)
///     .encode_field(&1u64)
///     .encode_field(&"hello")
///     .finish();
/// ```
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    payload: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            payload: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode>(mut self, value: &T) -> Self {
        value.encode(&mut self.payload);
        self
    }

    /// Encodes the value if present, writes nothing otherwise.
    /// Only valid for trailing fields: RLP lists carry no field markers.
    pub fn encode_optional_field<T: RLPEncode>(mut self, value: &Option<T>) -> Self {
        if let Some(value) = value {
            value.encode(&mut self.payload);
        }
        self
    }

    /// Appends pre-encoded RLP to the list payload as-is.
    pub fn encode_raw(mut self, raw: &[u8]) -> Self {
        self.payload.extend_from_slice(raw);
        self
    }

    /// Writes the list prefix and accumulated payload into the output buffer.
    pub fn finish(self) {
        encode_list_prefix(self.payload.len(), self.buf);
        self.buf.put_slice(&self.payload);
    }
}

/// Consumes the RLP encoding of a list field by field, in order.
///
/// Each `decode_field` returns the decoded value along with the decoder
/// advanced past it; `finish` asserts the list payload was fully consumed
/// and returns the input remaining after the list.
#[derive(Debug)]
pub struct Decoder<'a> {
    payload: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(rlp: &'a [u8]) -> Result<Self, RLPDecodeError> {
        let (payload, remaining) = decode_list_payload(rlp)?;
        Ok(Self { payload, remaining })
    }

    pub fn decode_field<T: RLPDecode>(self, name: &str) -> Result<(T, Self), RLPDecodeError> {
        let (value, next) = T::decode_unfinished(self.payload).map_err(|err| {
            RLPDecodeError::Custom(format!("error decoding field '{name}': {err}"))
        })?;
        Ok((
            value,
            Self {
                payload: next,
                remaining: self.remaining,
            },
        ))
    }

    /// Decodes the next field if the list has items left, `None` otherwise.
    pub fn decode_optional_field<T: RLPDecode>(
        self,
        name: &str,
    ) -> Result<(Option<T>, Self), RLPDecodeError> {
        if self.payload.is_empty() {
            return Ok((None, self));
        }
        let (value, decoder) = self.decode_field(name)?;
        Ok((Some(value), decoder))
    }

    /// Whether every item of the list payload has been consumed.
    pub fn is_done(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if !self.payload.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(self.remaining)
    }

    /// Returns the remaining input without checking that the list payload was
    /// fully consumed.
    pub fn finish_unchecked(self) -> &'a [u8] {
        self.remaining
    }
}
