use std::cmp::min;

use bytes::Bytes;
use keccak_hash::keccak;
use once_cell::sync::OnceCell;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, SecretKey, SECP256K1,
};
use serde::{ser::SerializeStruct, Serialize};
use sha3::{Digest, Keccak256};

use ethtx_rlp::{
    constants::RLP_NULL,
    decode::{RLPDecode, get_rlp_bytes_item_payload, is_encoded_as_bytes},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{
    constants::SECP256K1_ORDER_HALF,
    error::TxError,
    types::{
        blob::BlobTransaction,
        chain_params::{ChainParams, Fork},
        tx_fields::{self, AccessList},
    },
    utils, Address, H256, U256,
};

pub use serde_impl::GenericTransaction;

/// A constructed transaction is immutable: signing yields a new instance and
/// every accessor works on value data, so instances are safe to share across
/// threads. The mutable escape hatch is [`GenericTransaction`], which can be
/// edited freely and converted through the factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Legacy(LegacyTransaction),
    EIP2930(EIP2930Transaction),
    EIP1559(EIP1559Transaction),
    Blob(BlobTransaction),
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LegacySignature {
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

/// Signature of the typed transaction generations: the recovery bit is
/// carried as-is instead of being folded into `v`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TxSignature {
    pub y_parity: bool,
    pub r: U256,
    pub s: U256,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// The recipient of the transaction.
    /// Create transactions contain a [`null`](RLP_NULL) value in this field.
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub signature: Option<LegacySignature>,
    pub(crate) params: ChainParams,
    pub(crate) inner_hash: OnceCell<H256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EIP2930Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature: Option<TxSignature>,
    pub(crate) params: ChainParams,
    pub(crate) inner_hash: OnceCell<H256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EIP1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature: Option<TxSignature>,
    pub(crate) params: ChainParams,
    pub(crate) inner_hash: OnceCell<H256>,
}

/// Construction-time options that are not part of the transaction data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    /// Skip the EIP-3860 init-code size ceiling. The init-code word gas is
    /// still charged.
    pub allow_unlimited_init_code: bool,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxType {
    #[default]
    Legacy = 0x00,
    EIP2930 = 0x01,
    EIP1559 = 0x02,
    Blob = 0x05,
}

impl TxType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Legacy),
            0x01 => Some(Self::EIP2930),
            0x02 => Some(Self::EIP1559),
            0x05 => Some(Self::Blob),
            _ => None,
        }
    }
}

impl From<TxType> for u8 {
    fn from(val: TxType) -> Self {
        val as u8
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::Legacy => write!(f, "Legacy"),
            TxType::EIP2930 => write!(f, "EIP2930"),
            TxType::EIP1559 => write!(f, "EIP1559"),
            TxType::Blob => write!(f, "Blob"),
        }
    }
}

/// The transaction's kind: call or create.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Self::Call(address) => address.encode(buf),
            Self::Create => buf.put_u8(RLP_NULL),
        }
    }
}

impl RLPDecode for TxKind {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first_byte = rlp.first().ok_or(RLPDecodeError::InvalidLength)?;
        if *first_byte == RLP_NULL {
            return Ok((Self::Create, &rlp[1..]));
        }
        Address::decode_unfinished(rlp).map(|(addr, rest)| (Self::Call(addr), rest))
    }
}

/// Protocol features a transaction may rely on, independently of its numeric
/// type discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// EIP-155 replay protection
    ReplayProtection = 155,
    /// EIP-1559 fee market
    FeeMarket = 1559,
    /// EIP-2718 typed envelope
    TypedEnvelope = 2718,
    /// EIP-2930 access lists
    AccessLists = 2930,
}

impl Transaction {
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::Legacy(_) => TxType::Legacy,
            Transaction::EIP2930(_) => TxType::EIP2930,
            Transaction::EIP1559(_) => TxType::EIP1559,
            Transaction::Blob(_) => TxType::Blob,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::Legacy(tx) => tx.nonce,
            Transaction::EIP2930(tx) => tx.nonce,
            Transaction::EIP1559(tx) => tx.nonce,
            Transaction::Blob(tx) => tx.nonce,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self {
            Transaction::Legacy(tx) => tx.gas_limit,
            Transaction::EIP2930(tx) => tx.gas_limit,
            Transaction::EIP1559(tx) => tx.gas_limit,
            Transaction::Blob(tx) => tx.gas_limit,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.value,
            Transaction::EIP2930(tx) => tx.value,
            Transaction::EIP1559(tx) => tx.value,
            Transaction::Blob(tx) => tx.value,
        }
    }

    pub fn data(&self) -> &Bytes {
        match self {
            Transaction::Legacy(tx) => &tx.data,
            Transaction::EIP2930(tx) => &tx.data,
            Transaction::EIP1559(tx) => &tx.data,
            Transaction::Blob(tx) => &tx.data,
        }
    }

    pub fn to(&self) -> TxKind {
        match self {
            Transaction::Legacy(tx) => tx.to.clone(),
            Transaction::EIP2930(tx) => tx.to.clone(),
            Transaction::EIP1559(tx) => tx.to.clone(),
            Transaction::Blob(tx) => tx.to.clone(),
        }
    }

    pub fn access_list(&self) -> &AccessList {
        static EMPTY_ACCESS_LIST: AccessList = Vec::new();
        match self {
            Transaction::Legacy(_) => &EMPTY_ACCESS_LIST,
            Transaction::EIP2930(tx) => &tx.access_list,
            Transaction::EIP1559(tx) => &tx.access_list,
            Transaction::Blob(tx) => &tx.access_list,
        }
    }

    pub fn gas_price(&self) -> Option<U256> {
        match self {
            Transaction::Legacy(tx) => Some(tx.gas_price),
            Transaction::EIP2930(tx) => Some(tx.gas_price),
            Transaction::EIP1559(_) | Transaction::Blob(_) => None,
        }
    }

    pub fn max_fee_per_gas(&self) -> Option<U256> {
        match self {
            Transaction::Legacy(_) | Transaction::EIP2930(_) => None,
            Transaction::EIP1559(tx) => Some(tx.max_fee_per_gas),
            Transaction::Blob(tx) => Some(tx.max_fee_per_gas),
        }
    }

    pub fn max_priority_fee_per_gas(&self) -> Option<U256> {
        match self {
            Transaction::Legacy(_) | Transaction::EIP2930(_) => None,
            Transaction::EIP1559(tx) => Some(tx.max_priority_fee_per_gas),
            Transaction::Blob(tx) => Some(tx.max_priority_fee_per_gas),
        }
    }

    pub fn max_fee_per_data_gas(&self) -> Option<U256> {
        match self {
            Transaction::Blob(tx) => Some(tx.max_fee_per_data_gas),
            _ => None,
        }
    }

    pub fn blob_versioned_hashes(&self) -> &[H256] {
        match self {
            Transaction::Blob(tx) => &tx.blob_versioned_hashes,
            _ => &[],
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => match &tx.signature {
                Some(sig) => derive_legacy_chain_id(sig.v),
                None => tx
                    .replay_protected()
                    .then(|| tx.params.chain_id()),
            },
            Transaction::EIP2930(tx) => Some(tx.chain_id),
            Transaction::EIP1559(tx) => Some(tx.chain_id),
            Transaction::Blob(tx) => Some(tx.chain_id),
        }
    }

    pub fn is_contract_creation(&self) -> bool {
        match self {
            Transaction::Legacy(tx) => matches!(tx.to, TxKind::Create),
            Transaction::EIP2930(tx) => matches!(tx.to, TxKind::Create),
            Transaction::EIP1559(tx) => matches!(tx.to, TxKind::Create),
            Transaction::Blob(tx) => matches!(tx.to, TxKind::Create),
        }
    }

    /// The chain configuration this transaction was built against. Owned by
    /// the transaction: mutating the registry it was cloned from has no
    /// effect here.
    pub fn params(&self) -> &ChainParams {
        match self {
            Transaction::Legacy(tx) => &tx.params,
            Transaction::EIP2930(tx) => &tx.params,
            Transaction::EIP1559(tx) => &tx.params,
            Transaction::Blob(tx) => &tx.params,
        }
    }

    pub fn is_signed(&self) -> bool {
        match self {
            Transaction::Legacy(tx) => tx.signature.is_some(),
            Transaction::EIP2930(tx) => tx.signature.is_some(),
            Transaction::EIP1559(tx) => tx.signature.is_some(),
            Transaction::Blob(tx) => tx.signature.is_some(),
        }
    }

    /// Feature availability for this transaction, independent of the numeric
    /// `type` discriminant.
    pub fn supports(&self, capability: Capability) -> bool {
        match self {
            Transaction::Legacy(tx) => match capability {
                Capability::ReplayProtection => match &tx.signature {
                    Some(sig) => derive_legacy_chain_id(sig.v).is_some(),
                    None => tx.replay_protected(),
                },
                _ => false,
            },
            Transaction::EIP2930(_) => matches!(
                capability,
                Capability::TypedEnvelope | Capability::AccessLists | Capability::ReplayProtection
            ),
            Transaction::EIP1559(_) | Transaction::Blob(_) => matches!(
                capability,
                Capability::TypedEnvelope
                    | Capability::AccessLists
                    | Capability::ReplayProtection
                    | Capability::FeeMarket
            ),
        }
    }

    fn hash_cell(&self) -> &OnceCell<H256> {
        match self {
            Transaction::Legacy(tx) => &tx.inner_hash,
            Transaction::EIP2930(tx) => &tx.inner_hash,
            Transaction::EIP1559(tx) => &tx.inner_hash,
            Transaction::Blob(tx) => &tx.inner_hash,
        }
    }

    /// Compact state summary appended to error messages.
    pub(crate) fn diagnostic(&self) -> String {
        let hash = self
            .hash_cell()
            .get()
            .map(|hash| format!(" hash={hash:#x}"))
            .unwrap_or_default();
        format!(
            "type={} nonce={} value={} signed={} fork={}{}",
            self.tx_type(),
            self.nonce(),
            self.value(),
            self.is_signed(),
            self.params().fork(),
            hash
        )
    }
}

// Wire encoding.
//
// Canonical transaction encoding per EIP-2718: either `TransactionType ||
// Transaction` (type below 0x80, payload encoded per type) or a bare RLP
// legacy transaction. Unsigned transactions encode without their signature
// fields, so the list arity distinguishes the two states.

impl RLPEncode for LegacyTransaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let encoder = Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data);
        match &self.signature {
            Some(sig) => encoder
                .encode_field(&sig.v)
                .encode_field(&sig.r)
                .encode_field(&sig.s)
                .finish(),
            None => encoder.finish(),
        }
    }
}

impl RLPDecode for LegacyTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(LegacyTransaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (signature, decoder) = if decoder.is_done() {
            (None, decoder)
        } else {
            let (v, decoder) = decoder.decode_field("v")?;
            let (r, decoder) = decoder.decode_field("r")?;
            let (s, decoder) = decoder.decode_field("s")?;
            (Some(LegacySignature { v, r, s }), decoder)
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            signature,
            params: ChainParams::default(),
            inner_hash: OnceCell::new(),
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPEncode for EIP2930Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let encoder = Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list);
        match &self.signature {
            Some(sig) => encoder
                .encode_field(&sig.y_parity)
                .encode_field(&sig.r)
                .encode_field(&sig.s)
                .finish(),
            None => encoder.finish(),
        }
    }
}

impl RLPDecode for EIP2930Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(EIP2930Transaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature, decoder) = if decoder.is_done() {
            (None, decoder)
        } else {
            let (y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
            let (r, decoder) = decoder.decode_field("signature_r")?;
            let (s, decoder) = decoder.decode_field("signature_s")?;
            (Some(TxSignature { y_parity, r, s }), decoder)
        };

        let tx = EIP2930Transaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature,
            params: ChainParams::default(),
            inner_hash: OnceCell::new(),
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPEncode for EIP1559Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let encoder = Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list);
        match &self.signature {
            Some(sig) => encoder
                .encode_field(&sig.y_parity)
                .encode_field(&sig.r)
                .encode_field(&sig.s)
                .finish(),
            None => encoder.finish(),
        }
    }
}

impl RLPDecode for EIP1559Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(EIP1559Transaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature, decoder) = if decoder.is_done() {
            (None, decoder)
        } else {
            let (y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
            let (r, decoder) = decoder.decode_field("signature_r")?;
            let (s, decoder) = decoder.decode_field("signature_s")?;
            (Some(TxSignature { y_parity, r, s }), decoder)
        };

        let tx = EIP1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature,
            params: ChainParams::default(),
            inner_hash: OnceCell::new(),
        };
        Ok((tx, decoder.finish()?))
    }
}

impl Transaction {
    /// Encodes the transaction in its canonical wire format: bare RLP for
    /// legacy transactions, `type || payload` for typed ones.
    pub fn encode_canonical(&self, buf: &mut dyn bytes::BufMut) -> Result<(), TxError> {
        match self {
            Transaction::Legacy(tx) => {
                tx.encode(buf);
                Ok(())
            }
            Transaction::EIP2930(tx) => {
                buf.put_u8(TxType::EIP2930 as u8);
                tx.encode(buf);
                Ok(())
            }
            Transaction::EIP1559(tx) => {
                buf.put_u8(TxType::EIP1559 as u8);
                tx.encode(buf);
                Ok(())
            }
            Transaction::Blob(tx) => tx.encode_canonical(buf),
        }
    }

    pub fn encode_canonical_to_vec(&self) -> Result<Vec<u8>, TxError> {
        let mut buf = Vec::new();
        self.encode_canonical(&mut buf)?;
        Ok(buf)
    }

    /// Keccak hash of the canonical encoding. Only a signed transaction has
    /// a hash; the result is memoized.
    pub fn hash(&self) -> Result<H256, TxError> {
        if !self.is_signed() {
            return Err(TxError::NotSigned(self.diagnostic()));
        }
        let cell = self.hash_cell();
        if let Some(hash) = cell.get() {
            return Ok(*hash);
        }
        let hash = keccak(self.encode_canonical_to_vec()?);
        Ok(*cell.get_or_init(|| hash))
    }
}

// Signing and signature recovery.

impl LegacyTransaction {
    /// Whether signatures for this transaction embed the chain id. True from
    /// SpuriousDragon on, or when EIP-155 was switched on explicitly for an
    /// older fork; pre-SpuriousDragon chains without it sign unprotected.
    pub(crate) fn replay_protected(&self) -> bool {
        self.params.is_activated_eip(155)
    }

    /// RLP payload whose keccak hash gets signed. With a chain id the list
    /// is extended by `[chain_id, 0, 0]` per EIP-155.
    pub fn signing_payload(&self, chain_id: Option<u64>) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = Encoder::new(&mut buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data);
        match chain_id {
            Some(chain_id) => encoder
                .encode_field(&chain_id)
                .encode_field(&0u8)
                .encode_field(&0u8)
                .finish(),
            None => encoder.finish(),
        }
        buf
    }
}

impl EIP2930Transaction {
    /// `0x01 || RLP` of the eight unsigned fields.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut buf = vec![TxType::EIP2930 as u8];
        Encoder::new(&mut buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .finish();
        buf
    }
}

impl EIP1559Transaction {
    /// `0x02 || RLP` of the nine unsigned fields.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut buf = vec![TxType::EIP1559 as u8];
        Encoder::new(&mut buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .finish();
        buf
    }
}

/// Chain id embedded in a legacy `v` value per EIP-155, if any.
/// `v` of 27/28 carries none; anything else below 35 is not a valid
/// replay-protected value.
pub fn derive_legacy_chain_id(v: U256) -> Option<u64> {
    if v > U256::from(u64::MAX) {
        return None;
    }
    let v = v.as_u64();
    if v >= 35 {
        Some((v - 35) / 2)
    } else {
        None
    }
}

/// Address of the account behind an uncompressed secp256k1 public key.
pub fn address_from_public_key(public_key: &[u8; 64]) -> Address {
    let hash = Keccak256::new_with_prefix(public_key).finalize();
    Address::from_slice(&hash[12..])
}

fn recover_public_key(
    signature: &[u8; 65],
    message_hash: H256,
) -> Result<[u8; 64], secp256k1::Error> {
    let signature = RecoverableSignature::from_compact(
        &signature[..64],
        RecoveryId::from_i32(signature[64] as i32)?,
    )?;
    let public = SECP256K1.recover_ecdsa(
        &Message::from_digest(message_hash.to_fixed_bytes()),
        &signature,
    )?;
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&public.serialize_uncompressed()[1..]);
    Ok(bytes)
}

impl Transaction {
    /// Signs with the given 32-byte secp256k1 private key and returns a new,
    /// signed instance carrying the same chain configuration. ECDSA here is
    /// deterministic (RFC 6979), so re-signing yields identical output.
    pub fn sign(&self, private_key: &[u8]) -> Result<Transaction, TxError> {
        if private_key.len() != 32 {
            return Err(TxError::InvalidKeyLength(private_key.len()));
        }
        let key = SecretKey::from_slice(private_key)?;
        let message_hash = self.sign_message_hash()?;
        let signature = SECP256K1.sign_ecdsa_recoverable(
            &Message::from_digest(message_hash.to_fixed_bytes()),
            &key,
        );
        let (recovery_id, data) = signature.serialize_compact();
        let r = U256::from_big_endian(&data[..32]);
        let s = U256::from_big_endian(&data[32..]);
        Ok(self.with_signature(recovery_id.to_i32() == 1, r, s))
    }

    /// Hash of the message a signer commits to, derived from the chain
    /// configuration (legacy transactions pick EIP-155 protection here).
    pub fn sign_message_hash(&self) -> Result<H256, TxError> {
        match self {
            Transaction::Legacy(tx) => {
                let chain_id = tx.replay_protected().then(|| tx.params.chain_id());
                Ok(keccak(tx.signing_payload(chain_id)))
            }
            Transaction::EIP2930(tx) => Ok(keccak(tx.signing_payload())),
            Transaction::EIP1559(tx) => Ok(keccak(tx.signing_payload())),
            Transaction::Blob(tx) => tx.sign_message_hash(),
        }
    }

    /// Hash of the message an existing signature committed to. For signed
    /// legacy transactions the chain id comes from `v`, not the registry.
    fn recovery_message_hash(&self) -> Result<H256, TxError> {
        match self {
            Transaction::Legacy(tx) => {
                let sig = tx
                    .signature
                    .as_ref()
                    .ok_or_else(|| TxError::NotSigned(self.diagnostic()))?;
                Ok(keccak(tx.signing_payload(derive_legacy_chain_id(sig.v))))
            }
            _ => self.sign_message_hash(),
        }
    }

    fn with_signature(&self, y_parity: bool, r: U256, s: U256) -> Transaction {
        match self {
            Transaction::Legacy(tx) => {
                let v = if tx.replay_protected() {
                    U256::from(tx.params.chain_id() as u128 * 2 + 35 + y_parity as u128)
                } else {
                    U256::from(27u8 + y_parity as u8)
                };
                Transaction::Legacy(LegacyTransaction {
                    signature: Some(LegacySignature { v, r, s }),
                    inner_hash: OnceCell::new(),
                    ..tx.clone()
                })
            }
            Transaction::EIP2930(tx) => Transaction::EIP2930(EIP2930Transaction {
                signature: Some(TxSignature { y_parity, r, s }),
                inner_hash: OnceCell::new(),
                ..tx.clone()
            }),
            Transaction::EIP1559(tx) => Transaction::EIP1559(EIP1559Transaction {
                signature: Some(TxSignature { y_parity, r, s }),
                inner_hash: OnceCell::new(),
                ..tx.clone()
            }),
            Transaction::Blob(tx) => Transaction::Blob(BlobTransaction {
                signature: Some(TxSignature { y_parity, r, s }),
                inner_hash: OnceCell::new(),
                ..tx.clone()
            }),
        }
    }

    /// Signature as 64 compact bytes plus the recovery bit, after validating
    /// the variant's `v`/parity rules and the EIP-2 low-s bound.
    fn recovery_signature(&self) -> Result<[u8; 65], TxError> {
        let (recovery_bit, r, s) = match self {
            Transaction::Legacy(tx) => {
                let sig = tx
                    .signature
                    .as_ref()
                    .ok_or_else(|| TxError::NotSigned(self.diagnostic()))?;
                (self.validate_legacy_v(sig.v)?, sig.r, sig.s)
            }
            Transaction::EIP2930(tx) => {
                let sig = tx
                    .signature
                    .as_ref()
                    .ok_or_else(|| TxError::NotSigned(self.diagnostic()))?;
                (sig.y_parity as u8, sig.r, sig.s)
            }
            Transaction::EIP1559(tx) => {
                let sig = tx
                    .signature
                    .as_ref()
                    .ok_or_else(|| TxError::NotSigned(self.diagnostic()))?;
                (sig.y_parity as u8, sig.r, sig.s)
            }
            Transaction::Blob(tx) => {
                let sig = tx
                    .signature
                    .as_ref()
                    .ok_or_else(|| TxError::NotSigned(self.diagnostic()))?;
                (sig.y_parity as u8, sig.r, sig.s)
            }
        };
        self.check_low_s(s)?;
        let mut bytes = [0u8; 65];
        r.to_big_endian(&mut bytes[..32]);
        s.to_big_endian(&mut bytes[32..64]);
        bytes[64] = recovery_bit;
        Ok(bytes)
    }

    /// Signatures with `s` above half the curve order are malleable and
    /// rejected from Homestead on (EIP-2).
    pub(crate) fn check_low_s(&self, s: U256) -> Result<(), TxError> {
        if self.params().fork() >= Fork::Homestead && s > SECP256K1_ORDER_HALF {
            return Err(TxError::InvalidSignature(format!(
                "s value is greater than secp256k1n/2 ({})",
                self.diagnostic()
            )));
        }
        Ok(())
    }

    /// Validates a legacy `v` against EIP-155: 27/28 for unprotected
    /// signatures, `chain_id * 2 + 35/36` for protected ones. Returns the
    /// recovery bit.
    pub(crate) fn validate_legacy_v(&self, v: U256) -> Result<u8, TxError> {
        if v > U256::from(u64::MAX) {
            return Err(TxError::InvalidSignature(format!(
                "v value out of range ({})",
                self.diagnostic()
            )));
        }
        let v = v.as_u64();
        match v {
            27 | 28 => Ok((v - 27) as u8),
            35.. => {
                let chain_id = (v - 35) / 2;
                if chain_id != self.params().chain_id() {
                    return Err(TxError::InvalidSignature(format!(
                        "v {} encodes chain id {}, expected {} ({})",
                        v,
                        chain_id,
                        self.params().chain_id(),
                        self.diagnostic()
                    )));
                }
                Ok(((v - 35) % 2) as u8)
            }
            _ => Err(TxError::InvalidSignature(format!(
                "v must be 27, 28 or at least 35 per EIP-155, got {v} ({})",
                self.diagnostic()
            ))),
        }
    }

    /// Public key of the signer, recovered from the signature.
    pub fn sender_public_key(&self) -> Result<[u8; 64], TxError> {
        let signature = self.recovery_signature()?;
        let message_hash = self.recovery_message_hash()?;
        recover_public_key(&signature, message_hash).map_err(|err| {
            TxError::InvalidSignature(format!("recovery failed: {err} ({})", self.diagnostic()))
        })
    }

    /// Address of the signer.
    pub fn sender(&self) -> Result<Address, TxError> {
        Ok(address_from_public_key(&self.sender_public_key()?))
    }

    /// Whether the signature recovers to a valid public key. Unsigned
    /// transactions verify as false.
    pub fn verify_signature(&self) -> bool {
        match self.sender_public_key() {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("signature verification failed: {err}");
                false
            }
        }
    }
}

// Fee and gas accounting.

impl Transaction {
    /// Gas charged for the calldata alone: the per-byte costs plus, for
    /// contract creations under EIP-3860, the init-code word cost.
    pub fn data_fee(&self) -> Result<u64, TxError> {
        let params = self.params();
        let zero_cost = params.param("gas", "txDataZero")?;
        let non_zero_cost = params.param("gas", "txDataNonZero")?;

        let data_len = self.data().len() as u64;
        let non_zero_count = self.data().iter().filter(|&&byte| byte != 0).count() as u64;
        let zero_count = data_len - non_zero_count;

        let mut gas: u64 = 0;
        gas = gas
            .checked_add(
                non_zero_count
                    .checked_mul(non_zero_cost)
                    .ok_or(TxError::GasOverflow)?,
            )
            .ok_or(TxError::GasOverflow)?;
        gas = gas
            .checked_add(
                zero_count
                    .checked_mul(zero_cost)
                    .ok_or(TxError::GasOverflow)?,
            )
            .ok_or(TxError::GasOverflow)?;

        if self.is_contract_creation() && params.is_activated_eip(3860) {
            let word_cost = params.param("gas", "initCodeWordCost")?;
            // Length in 32-byte words, rounded up
            let words = data_len.div_ceil(32);
            gas = gas
                .checked_add(words.checked_mul(word_cost).ok_or(TxError::GasOverflow)?)
                .ok_or(TxError::GasOverflow)?;
        }

        Ok(gas)
    }

    /// Minimum gas the transaction burns before any execution: the base
    /// per-transaction cost, the data fee, the contract-creation surcharge
    /// and the declared access list.
    pub fn intrinsic_gas(&self) -> Result<u64, TxError> {
        let params = self.params();
        let mut gas = params.param("gas", "tx")?;

        gas = gas
            .checked_add(self.data_fee()?)
            .ok_or(TxError::GasOverflow)?;

        if self.is_contract_creation() && params.fork() >= Fork::Homestead {
            gas = gas
                .checked_add(params.param("gas", "txCreation")?)
                .ok_or(TxError::GasOverflow)?;
        }

        gas = gas
            .checked_add(tx_fields::access_list_cost(self.access_list(), params)?)
            .ok_or(TxError::GasOverflow)?;

        Ok(gas)
    }

    /// Gas price actually paid under the given base fee. `None` when the
    /// transaction cannot be included (fee cap below the base fee).
    pub fn effective_gas_price(&self, base_fee_per_gas: Option<U256>) -> Option<U256> {
        match self {
            Transaction::Legacy(tx) => Some(tx.gas_price),
            Transaction::EIP2930(tx) => Some(tx.gas_price),
            Transaction::EIP1559(_) | Transaction::Blob(_) => {
                let max_fee = self.max_fee_per_gas()?;
                let base_fee = base_fee_per_gas?;
                if max_fee < base_fee {
                    return None;
                }
                let priority_fee = min(
                    self.max_priority_fee_per_gas()?,
                    max_fee.saturating_sub(base_fee),
                );
                priority_fee.checked_add(base_fee)
            }
        }
    }

    /// Maximum wei the sender account must hold up front:
    /// `gas_limit * price + value`, where the price of fee-market
    /// transactions is `min(max_priority_fee, max_fee - base_fee) + base_fee`.
    pub fn upfront_cost(&self, base_fee_per_gas: Option<U256>) -> Result<U256, TxError> {
        let price = match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::EIP2930(tx) => tx.gas_price,
            Transaction::EIP1559(_) | Transaction::Blob(_) => {
                let base_fee = base_fee_per_gas.unwrap_or_default();
                let max_fee = self.max_fee_per_gas().unwrap_or_default();
                let priority_fee = min(
                    self.max_priority_fee_per_gas().unwrap_or_default(),
                    max_fee.saturating_sub(base_fee),
                );
                priority_fee
                    .checked_add(base_fee)
                    .ok_or(TxError::GasOverflow)?
            }
        };
        price
            .checked_mul(U256::from(self.gas_limit()))
            .and_then(|gas_cost| gas_cost.checked_add(self.value()))
            .ok_or(TxError::GasOverflow)
    }
}

// Validation.

impl Transaction {
    /// Human-readable rule violations: intrinsic gas above the gas limit,
    /// and a signature that does not verify.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self.intrinsic_gas() {
            Ok(intrinsic) if self.gas_limit() < intrinsic => errors.push(format!(
                "gas limit {} is below the intrinsic gas of {}",
                self.gas_limit(),
                intrinsic
            )),
            Err(err) => errors.push(format!("intrinsic gas: {err}")),
            _ => {}
        }
        if self.is_signed() && !self.verify_signature() {
            errors.push("signature does not verify".to_string());
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }

    /// Construction-time invariants. Every factory path runs this before a
    /// transaction is handed out; a violation means no instance exists.
    pub(crate) fn validate_new(&self, opts: &TxOptions) -> Result<(), TxError> {
        let params = self.params();

        // EIP-2681: nonce must stay strictly below 2^64 - 1
        if self.nonce() == u64::MAX {
            return Err(TxError::BoundsExceeded {
                field: "nonce",
                reason: "must be strictly less than 2^64 - 1".to_string(),
            });
        }

        let fee_per_gas = match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::EIP2930(tx) => tx.gas_price,
            Transaction::EIP1559(tx) => tx.max_fee_per_gas,
            Transaction::Blob(tx) => tx.max_fee_per_gas,
        };
        if fee_per_gas
            .checked_mul(U256::from(self.gas_limit()))
            .is_none()
        {
            return Err(TxError::BoundsExceeded {
                field: "gasLimit",
                reason: "gas limit times fee per gas exceeds 2^256 - 1".to_string(),
            });
        }

        match self {
            Transaction::Legacy(tx) => {
                if let Some(sig) = &tx.signature {
                    self.validate_legacy_v(sig.v)?;
                    self.check_low_s(sig.s)?;
                }
            }
            Transaction::EIP2930(tx) => {
                if !params.is_activated_eip(2930) {
                    return Err(TxError::FeatureNotActive { eip: 2930 });
                }
                if let Some(sig) = &tx.signature {
                    self.check_low_s(sig.s)?;
                }
            }
            Transaction::EIP1559(tx) => {
                if !params.is_activated_eip(1559) {
                    return Err(TxError::FeatureNotActive { eip: 1559 });
                }
                if tx.max_fee_per_gas < tx.max_priority_fee_per_gas {
                    return Err(TxError::MalformedField {
                        field: "maxPriorityFeePerGas",
                        reason: "cannot be greater than maxFeePerGas".to_string(),
                    });
                }
                if let Some(sig) = &tx.signature {
                    self.check_low_s(sig.s)?;
                }
            }
            Transaction::Blob(tx) => {
                tx.validate_fields()?;
                if let Some(sig) = &tx.signature {
                    self.check_low_s(sig.s)?;
                }
            }
        }

        if self.is_contract_creation()
            && params.is_activated_eip(3860)
            && !opts.allow_unlimited_init_code
        {
            let max = params.param("vm", "maxInitCodeSize")?;
            if self.data().len() as u64 > max {
                return Err(TxError::InitCodeSizeExceeded {
                    size: self.data().len(),
                    max,
                });
            }
        }

        Ok(())
    }
}

// Serialization.
// JSON representation used over RPC: numeric fields as 0x-prefixed hex,
// fields a variant does not carry omitted entirely.

mod serde_impl {
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::HashMap;

    use crate::types::tx_fields::AccessListEntry;

    use super::*;

    impl Serialize for TxKind {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            match self {
                TxKind::Call(address) => serializer.serialize_str(&format!("{address:#x}")),
                TxKind::Create => serializer.serialize_none(),
            }
        }
    }

    impl<'de> Deserialize<'de> for TxKind {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            use std::str::FromStr;
            let str_option = Option::<String>::deserialize(deserializer)?;
            match str_option {
                Some(str) if !str.is_empty() => Ok(TxKind::Call(
                    Address::from_str(str.trim_start_matches("0x")).map_err(|_| {
                        D::Error::custom(format!("Failed to deserialize hex value {str}"))
                    })?,
                )),
                _ => Ok(TxKind::Create),
            }
        }
    }

    impl Serialize for TxType {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(&format!("{:#x}", *self as u8))
        }
    }

    impl<'de> Deserialize<'de> for TxType {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let str = String::deserialize(deserializer)?;
            let tx_num = u8::from_str_radix(str.trim_start_matches("0x"), 16).map_err(|_| {
                D::Error::custom(format!("Failed to deserialize hex value {str}"))
            })?;
            TxType::from_u8(tx_num)
                .ok_or_else(|| D::Error::custom(format!("Invalid transaction type {tx_num}")))
        }
    }

    impl Serialize for Transaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            match self {
                Transaction::Legacy(tx) => tx.serialize(serializer),
                Transaction::EIP2930(tx) => tx.serialize(serializer),
                Transaction::EIP1559(tx) => tx.serialize(serializer),
                Transaction::Blob(tx) => tx.serialize(serializer),
            }
        }
    }

    impl Serialize for LegacyTransaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let chain_id = self
                .signature
                .as_ref()
                .and_then(|sig| derive_legacy_chain_id(sig.v));
            let mut len = 7 + usize::from(chain_id.is_some());
            if self.signature.is_some() {
                len += 3;
            }
            let mut state = serializer.serialize_struct("LegacyTransaction", len)?;
            state.serialize_field("type", &TxType::Legacy)?;
            state.serialize_field("nonce", &format!("{:#x}", self.nonce))?;
            state.serialize_field("to", &self.to)?;
            state.serialize_field("gas", &format!("{:#x}", self.gas_limit))?;
            state.serialize_field("value", &self.value)?;
            state.serialize_field("input", &format!("0x{:x}", self.data))?;
            state.serialize_field("gasPrice", &self.gas_price)?;
            if let Some(chain_id) = chain_id {
                state.serialize_field("chainId", &format!("{chain_id:#x}"))?;
            }
            if let Some(sig) = &self.signature {
                state.serialize_field("v", &sig.v)?;
                state.serialize_field("r", &sig.r)?;
                state.serialize_field("s", &sig.s)?;
            }
            state.end()
        }
    }

    fn serialize_typed_signature<S: SerializeStruct>(
        state: &mut S,
        signature: &Option<TxSignature>,
    ) -> Result<(), S::Error> {
        if let Some(sig) = signature {
            state.serialize_field("yParity", &format!("{:#x}", sig.y_parity as u8))?;
            state.serialize_field("v", &format!("{:#x}", sig.y_parity as u8))?;
            state.serialize_field("r", &sig.r)?;
            state.serialize_field("s", &sig.s)?;
        }
        Ok(())
    }

    impl Serialize for EIP2930Transaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let len = 9 + if self.signature.is_some() { 4 } else { 0 };
            let mut state = serializer.serialize_struct("Eip2930Transaction", len)?;
            state.serialize_field("type", &TxType::EIP2930)?;
            state.serialize_field("chainId", &format!("{:#x}", self.chain_id))?;
            state.serialize_field("nonce", &format!("{:#x}", self.nonce))?;
            state.serialize_field("to", &self.to)?;
            state.serialize_field("gas", &format!("{:#x}", self.gas_limit))?;
            state.serialize_field("value", &self.value)?;
            state.serialize_field("input", &format!("0x{:x}", self.data))?;
            state.serialize_field("gasPrice", &self.gas_price)?;
            state.serialize_field("accessList", &tx_fields::entries(&self.access_list))?;
            serialize_typed_signature(&mut state, &self.signature)?;
            state.end()
        }
    }

    impl Serialize for EIP1559Transaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let len = 10 + if self.signature.is_some() { 4 } else { 0 };
            let mut state = serializer.serialize_struct("Eip1559Transaction", len)?;
            state.serialize_field("type", &TxType::EIP1559)?;
            state.serialize_field("chainId", &format!("{:#x}", self.chain_id))?;
            state.serialize_field("nonce", &format!("{:#x}", self.nonce))?;
            state.serialize_field("to", &self.to)?;
            state.serialize_field("gas", &format!("{:#x}", self.gas_limit))?;
            state.serialize_field("value", &self.value)?;
            state.serialize_field("input", &format!("0x{:x}", self.data))?;
            state.serialize_field(
                "maxPriorityFeePerGas",
                &self.max_priority_fee_per_gas,
            )?;
            state.serialize_field("maxFeePerGas", &self.max_fee_per_gas)?;
            state.serialize_field("accessList", &tx_fields::entries(&self.access_list))?;
            serialize_typed_signature(&mut state, &self.signature)?;
            state.end()
        }
    }

    /// Structured transaction input: every field optional, numerics as hex
    /// strings. This is the mutable builder counterpart of [`Transaction`];
    /// the factory turns it into a validated, immutable instance.
    #[derive(Deserialize, Debug, PartialEq, Clone, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct GenericTransaction {
        #[serde(default, rename = "type")]
        pub tx_type: Option<TxType>,
        #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
        pub nonce: Option<u64>,
        #[serde(default)]
        pub to: TxKind,
        #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
        pub gas: Option<u64>,
        #[serde(default)]
        pub value: U256,
        #[serde(default)]
        pub gas_price: Option<U256>,
        #[serde(default)]
        pub max_priority_fee_per_gas: Option<U256>,
        #[serde(default)]
        pub max_fee_per_gas: Option<U256>,
        #[serde(default)]
        pub max_fee_per_data_gas: Option<U256>,
        #[serde(default)]
        pub access_list: Vec<AccessListEntry>,
        #[serde(default)]
        pub blob_versioned_hashes: Vec<H256>,
        #[serde(default, with = "crate::serde_utils::bytes::vec")]
        pub blobs: Vec<Bytes>,
        #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
        pub chain_id: Option<u64>,
        #[serde(default, alias = "yParity")]
        pub v: Option<U256>,
        #[serde(default)]
        pub r: Option<U256>,
        #[serde(default)]
        pub s: Option<U256>,
        // The calldata arrives as either `data` or `input`; the flatten +
        // custom deserializer accepts both names (and both at once when they
        // agree).
        #[serde(flatten, deserialize_with = "deserialize_input")]
        pub input: Bytes,
    }

    fn deserialize_input<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let variables = HashMap::<String, Value>::deserialize(deserializer)?;
        let data = variables.get("data");
        let input = variables.get("input");
        let value = match (data, input) {
            (None, None) => return Ok(Bytes::new()),
            (None, Some(val)) => val,
            (Some(val), None) => val,
            (Some(val_a), Some(val_b)) => {
                if val_a == val_b {
                    val_a
                } else {
                    return Err(D::Error::custom(
                        "Transaction has both `data` and `input` fields with different values",
                    ));
                }
            }
        };
        let value = String::deserialize(value).map_err(D::Error::custom)?;
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| D::Error::custom(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    impl GenericTransaction {
        /// Signature triple for the legacy layout: all three or none.
        pub(crate) fn legacy_signature(&self) -> Result<Option<LegacySignature>, TxError> {
            match (self.v, self.r, self.s) {
                (Some(v), Some(r), Some(s)) => Ok(Some(LegacySignature { v, r, s })),
                (None, None, None) => Ok(None),
                _ => Err(TxError::MalformedField {
                    field: "signature",
                    reason: "v, r and s must either all be present or all be absent".to_string(),
                }),
            }
        }

        /// Signature triple for the typed layout. `v` doubles as the
        /// y-parity and must be exactly 0 or 1; 0 is a valid, present value.
        pub(crate) fn typed_signature(&self) -> Result<Option<TxSignature>, TxError> {
            match (self.v, self.r, self.s) {
                (Some(v), Some(r), Some(s)) => {
                    let y_parity = match v {
                        v if v.is_zero() => false,
                        v if v == U256::one() => true,
                        v => {
                            return Err(TxError::InvalidSignature(format!(
                                "y-parity must be 0 or 1, got {v}"
                            )))
                        }
                    };
                    Ok(Some(TxSignature { y_parity, r, s }))
                }
                (None, None, None) => Ok(None),
                _ => Err(TxError::MalformedField {
                    field: "signature",
                    reason: "v, r and s must either all be present or all be absent".to_string(),
                }),
            }
        }
    }

    impl From<&Transaction> for GenericTransaction {
        fn from(tx: &Transaction) -> Self {
            let (v, r, s) = match tx {
                Transaction::Legacy(tx) => match &tx.signature {
                    Some(sig) => (Some(sig.v), Some(sig.r), Some(sig.s)),
                    None => (None, None, None),
                },
                Transaction::EIP2930(tx) => typed_signature_triple(&tx.signature),
                Transaction::EIP1559(tx) => typed_signature_triple(&tx.signature),
                Transaction::Blob(tx) => typed_signature_triple(&tx.signature),
            };
            Self {
                tx_type: Some(tx.tx_type()),
                nonce: Some(tx.nonce()),
                to: tx.to(),
                gas: Some(tx.gas_limit()),
                value: tx.value(),
                gas_price: tx.gas_price(),
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas(),
                max_fee_per_gas: tx.max_fee_per_gas(),
                max_fee_per_data_gas: tx.max_fee_per_data_gas(),
                access_list: tx_fields::entries(tx.access_list()),
                blob_versioned_hashes: tx.blob_versioned_hashes().to_vec(),
                blobs: Vec::new(),
                chain_id: tx.chain_id(),
                v,
                r,
                s,
                input: tx.data().clone(),
            }
        }
    }

    fn typed_signature_triple(
        signature: &Option<TxSignature>,
    ) -> (Option<U256>, Option<U256>, Option<U256>) {
        match signature {
            Some(sig) => (
                Some(U256::from(sig.y_parity as u64)),
                Some(sig.r),
                Some(sig.s),
            ),
            None => (None, None, None),
        }
    }
}

// Structured-data constructors, dispatched to by the factory.

impl LegacyTransaction {
    /// Field tuple of the wire encoding: six entries unsigned, nine signed,
    /// integers in their minimal big-endian form.
    pub fn values(&self) -> Vec<Bytes> {
        let mut values = vec![
            Bytes::from(utils::u64_to_minimal_be(self.nonce)),
            Bytes::from(utils::u256_to_minimal_be(self.gas_price)),
            Bytes::from(utils::u64_to_minimal_be(self.gas_limit)),
            match &self.to {
                TxKind::Call(address) => Bytes::copy_from_slice(address.as_bytes()),
                TxKind::Create => Bytes::new(),
            },
            Bytes::from(utils::u256_to_minimal_be(self.value)),
            self.data.clone(),
        ];
        if let Some(sig) = &self.signature {
            values.push(Bytes::from(utils::u256_to_minimal_be(sig.v)));
            values.push(Bytes::from(utils::u256_to_minimal_be(sig.r)));
            values.push(Bytes::from(utils::u256_to_minimal_be(sig.s)));
        }
        values
    }

    /// Builds from an already-split field tuple, enforcing canonical
    /// encodings and field bounds the same way the wire decoder does.
    pub fn from_values(
        values: &[Bytes],
        params: ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        if values.len() != 6 && values.len() != 9 {
            return Err(TxError::MalformedField {
                field: "values",
                reason: format!(
                    "legacy transactions carry 6 or 9 fields, got {}",
                    values.len()
                ),
            });
        }
        utils::validate_no_leading_zeroes(&[
            ("nonce", &values[0]),
            ("gasPrice", &values[1]),
            ("gasLimit", &values[2]),
            ("value", &values[4]),
        ])?;
        let to = match values[3].len() {
            0 => TxKind::Create,
            20 => TxKind::Call(Address::from_slice(&values[3])),
            len => {
                return Err(TxError::MalformedField {
                    field: "to",
                    reason: format!("must be empty or exactly 20 bytes, got {len}"),
                })
            }
        };
        let signature = if values.len() == 9 {
            utils::validate_no_leading_zeroes(&[
                ("v", &values[6]),
                ("r", &values[7]),
                ("s", &values[8]),
            ])?;
            Some(LegacySignature {
                v: utils::u256_from_big_endian("v", &values[6])?,
                r: utils::u256_from_big_endian("r", &values[7])?,
                s: utils::u256_from_big_endian("s", &values[8])?,
            })
        } else {
            None
        };
        let tx = Transaction::Legacy(LegacyTransaction {
            nonce: utils::u64_from_big_endian("nonce", &values[0])?,
            gas_price: utils::u256_from_big_endian("gasPrice", &values[1])?,
            gas_limit: utils::u64_from_big_endian("gasLimit", &values[2])?,
            to,
            value: utils::u256_from_big_endian("value", &values[4])?,
            data: values[5].clone(),
            signature,
            params,
            inner_hash: OnceCell::new(),
        });
        tx.validate_new(opts)?;
        Ok(tx)
    }

    pub fn from_tx_data(
        data: &GenericTransaction,
        params: ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        let tx = Transaction::Legacy(LegacyTransaction {
            nonce: data.nonce.unwrap_or_default(),
            gas_price: data.gas_price.unwrap_or_default(),
            gas_limit: data.gas.unwrap_or_default(),
            to: data.to.clone(),
            value: data.value,
            data: data.input.clone(),
            signature: data.legacy_signature()?,
            params,
            inner_hash: OnceCell::new(),
        });
        tx.validate_new(opts)?;
        Ok(tx)
    }
}

impl EIP2930Transaction {
    pub fn from_tx_data(
        data: &GenericTransaction,
        params: ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        let tx = Transaction::EIP2930(EIP2930Transaction {
            chain_id: data.chain_id.unwrap_or_else(|| params.chain_id()),
            nonce: data.nonce.unwrap_or_default(),
            gas_price: data.gas_price.unwrap_or_default(),
            gas_limit: data.gas.unwrap_or_default(),
            to: data.to.clone(),
            value: data.value,
            data: data.input.clone(),
            access_list: tx_fields::from_entries(&data.access_list),
            signature: data.typed_signature()?,
            params,
            inner_hash: OnceCell::new(),
        });
        tx.validate_new(opts)?;
        Ok(tx)
    }
}

impl EIP1559Transaction {
    pub fn from_tx_data(
        data: &GenericTransaction,
        params: ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        if data.gas_price.is_some() {
            return Err(TxError::MalformedField {
                field: "gasPrice",
                reason: "cannot be used together with maxFeePerGas/maxPriorityFeePerGas"
                    .to_string(),
            });
        }
        let tx = Transaction::EIP1559(EIP1559Transaction {
            chain_id: data.chain_id.unwrap_or_else(|| params.chain_id()),
            nonce: data.nonce.unwrap_or_default(),
            max_priority_fee_per_gas: data.max_priority_fee_per_gas.unwrap_or_default(),
            max_fee_per_gas: data.max_fee_per_gas.unwrap_or_default(),
            gas_limit: data.gas.unwrap_or_default(),
            to: data.to.clone(),
            value: data.value,
            data: data.input.clone(),
            access_list: tx_fields::from_entries(&data.access_list),
            signature: data.typed_signature()?,
            params,
            inner_hash: OnceCell::new(),
        });
        tx.validate_new(opts)?;
        Ok(tx)
    }
}

// Block-body helpers: a transaction inside a block body is either an RLP
// byte string holding a typed envelope, or a bare legacy field list.

pub(crate) fn split_block_body_item(rlp: &[u8]) -> Result<(bool, &[u8]), RLPDecodeError> {
    if is_encoded_as_bytes(rlp)? {
        Ok((true, get_rlp_bytes_item_payload(rlp)?))
    } else {
        Ok((false, rlp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factory::TxRegistry;
    use hex_literal::hex;

    fn spurious_dragon_params() -> ChainParams {
        ChainParams::new(1, Fork::SpuriousDragon)
    }

    fn eip155_example() -> Transaction {
        Transaction::Legacy(LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21000,
            to: TxKind::Call(Address::from_slice(&hex!(
                "3535353535353535353535353535353535353535"
            ))),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Bytes::new(),
            signature: None,
            params: spurious_dragon_params(),
            inner_hash: OnceCell::new(),
        })
    }

    #[test]
    fn eip155_reference_vector() {
        // Example from the EIP-155 specification: chain id 1, private key
        // 0x4646...46
        let tx = eip155_example();
        let signed = tx.sign(&[0x46; 32]).unwrap();

        let Transaction::Legacy(inner) = &signed else {
            panic!("expected a legacy transaction");
        };
        let sig = inner.signature.as_ref().unwrap();
        assert_eq!(sig.v, U256::from(37));
        assert_eq!(
            sig.r,
            U256::from_dec_str(
                "18515461264373351373200002665853028612451056578545711640558177340181847433846"
            )
            .unwrap()
        );
        assert_eq!(
            sig.s,
            U256::from_dec_str(
                "46948507304638947509940763649030358759909902576025900602547168820602576006531"
            )
            .unwrap()
        );

        let expected = hex!(
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.encode_canonical_to_vec().unwrap(), expected);

        let sender = signed.sender().unwrap();
        assert_eq!(
            sender,
            Address::from_slice(&hex!("9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f"))
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let tx = eip155_example();
        let first = tx.sign(&[0x46; 32]).unwrap();
        let second = tx.sign(&[0x46; 32]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash().unwrap(), second.hash().unwrap());
        assert_eq!(
            first.encode_canonical_to_vec().unwrap(),
            second.encode_canonical_to_vec().unwrap()
        );
    }

    #[test]
    fn sign_rejects_bad_key_length() {
        let tx = eip155_example();
        assert!(matches!(
            tx.sign(&[0x46; 31]),
            Err(TxError::InvalidKeyLength(31))
        ));
        assert!(matches!(
            tx.sign(&[0x46; 33]),
            Err(TxError::InvalidKeyLength(33))
        ));
    }

    #[test]
    fn unsigned_has_no_hash() {
        let tx = eip155_example();
        assert!(!tx.is_signed());
        assert!(matches!(tx.hash(), Err(TxError::NotSigned(_))));
        assert!(matches!(
            tx.sender_public_key(),
            Err(TxError::NotSigned(_))
        ));
    }

    #[test]
    fn hash_is_memoized() {
        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        let first = signed.hash().unwrap();
        let second = signed.hash().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn pre_spurious_dragon_signs_without_replay_protection() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.params = ChainParams::new(1, Fork::Homestead);
        }
        let signed = tx.sign(&[0x46; 32]).unwrap();
        let Transaction::Legacy(inner) = &signed else {
            panic!("expected a legacy transaction");
        };
        let v = inner.signature.as_ref().unwrap().v.as_u64();
        assert!(v == 27 || v == 28);
        assert_eq!(signed.chain_id(), None);
        assert!(signed.verify_signature());
    }

    #[test]
    fn explicit_eip155_activation_protects_older_fork() {
        let mut params = ChainParams::new(1, Fork::Homestead);
        params.set_eips(vec![155]).unwrap();
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.params = params;
        }
        let signed = tx.sign(&[0x46; 32]).unwrap();
        assert_eq!(signed.chain_id(), Some(1));
        assert!(signed.supports(Capability::ReplayProtection));
    }

    #[test]
    fn legacy_roundtrip_via_factory() {
        let registry = TxRegistry::new();
        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        let encoded = signed.encode_canonical_to_vec().unwrap();
        let decoded = registry
            .from_serialized(&encoded, &spurious_dragon_params(), &TxOptions::default())
            .unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn unsigned_legacy_roundtrip() {
        let registry = TxRegistry::new();
        let tx = eip155_example();
        let encoded = tx.encode_canonical_to_vec().unwrap();
        let decoded = registry
            .from_serialized(&encoded, &spurious_dragon_params(), &TxOptions::default())
            .unwrap();
        assert!(!decoded.is_signed());
        assert_eq!(decoded, tx);
    }

    #[test]
    fn legacy_rlp_decode() {
        let encoded_tx = hex::decode(
            "f86d80843baa0c4082f618946177843db3138ae69679a54b95cf345ed759450d870aa87bee538000808360306ba0151ccc02146b9b11adf516e6787b59acae3e76544fdcd75e77e67c6b598ce65da064c5dd5aae2fbb535830ebbdad0234975cd7ece3562013b63ea18cc0df6c97d4",
        )
        .unwrap();
        let tx = LegacyTransaction::decode(&encoded_tx).unwrap();
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.gas_price, U256::from(1_001_000_000u64));
        assert_eq!(tx.gas_limit, 63000);
        assert_eq!(
            tx.to,
            TxKind::Call(Address::from_slice(&hex!(
                "6177843db3138ae69679a54b95cf345ed759450d"
            )))
        );
        assert_eq!(tx.value, U256::from(3_000_000_000_000_000u64));
        assert!(tx.data.is_empty());
        let sig = tx.signature.as_ref().unwrap();
        assert_eq!(sig.v, U256::from(6303851));
        // v = 6303851 encodes chain id (6303851 - 35) / 2
        assert_eq!(derive_legacy_chain_id(sig.v), Some(3151908));
    }

    #[test]
    fn eip1559_rlp_roundtrip() {
        let params = ChainParams::new(3151908, Fork::London);
        let tx = Transaction::EIP1559(EIP1559Transaction {
            chain_id: 3151908,
            nonce: 0,
            max_priority_fee_per_gas: U256::from(17),
            max_fee_per_gas: U256::from(78),
            gas_limit: 63000,
            to: TxKind::Call(Address::from_slice(&hex!(
                "6177843db3138ae69679a54b95cf345ed759450d"
            ))),
            value: U256::from(3_000_000_000_000_000u64),
            data: Bytes::new(),
            access_list: vec![],
            signature: Some(TxSignature {
                y_parity: false,
                r: U256::from_str_radix(
                    "151ccc02146b9b11adf516e6787b59acae3e76544fdcd75e77e67c6b598ce65d",
                    16,
                )
                .unwrap(),
                s: U256::from_str_radix(
                    "64c5dd5aae2fbb535830ebbdad0234975cd7ece3562013b63ea18cc0df6c97d4",
                    16,
                )
                .unwrap(),
            }),
            params: params.clone(),
            inner_hash: OnceCell::new(),
        });

        let encoded = tx.encode_canonical_to_vec().unwrap();
        assert_eq!(encoded[0], 0x02);
        let decoded = TxRegistry::new()
            .from_serialized(&encoded, &params, &TxOptions::default())
            .unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn eip2930_roundtrip_with_access_list() {
        let params = ChainParams::new(1, Fork::Berlin);
        let tx = Transaction::EIP2930(EIP2930Transaction {
            chain_id: 1,
            nonce: 7,
            gas_price: U256::from(0x2dbf1f9au64),
            gas_limit: 100_000,
            to: TxKind::Call(Address::from_slice(&hex!(
                "7dcd17433742f4c0ca53122ab541d0ba67fc27df"
            ))),
            value: U256::from(2),
            data: Bytes::from_static(b"\xdbS\x06$\x8e\x03\x13\xe7emit"),
            access_list: vec![(
                Address::from_slice(&hex!("7dcd17433742f4c0ca53122ab541d0ba67fc27df")),
                vec![
                    H256::zero(),
                    H256::from_slice(&hex!(
                        "a3d07a7d68fbd49ec2f8e6befdd86c885f86c272819f6f345f365dec35ae6707"
                    )),
                ],
            )],
            signature: Some(TxSignature {
                y_parity: false,
                r: U256::from(11u64),
                s: U256::from(7u64),
            }),
            params: params.clone(),
            inner_hash: OnceCell::new(),
        });
        let encoded = tx.encode_canonical_to_vec().unwrap();
        assert_eq!(encoded[0], 0x01);
        let decoded = TxRegistry::new()
            .from_serialized(&encoded, &params, &TxOptions::default())
            .unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn nonce_bound_is_strict() {
        let params = ChainParams::mainnet();
        let data = GenericTransaction {
            nonce: Some(u64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            LegacyTransaction::from_tx_data(&data, params.clone(), &TxOptions::default()),
            Err(TxError::BoundsExceeded { field: "nonce", .. })
        ));

        let data = GenericTransaction {
            nonce: Some(u64::MAX - 1),
            ..Default::default()
        };
        assert!(
            LegacyTransaction::from_tx_data(&data, params, &TxOptions::default()).is_ok()
        );
    }

    #[test]
    fn value_parses_up_to_max_u256() {
        let max = "0x".to_string() + &"f".repeat(64);
        let json = format!(r#"{{"value":"{max}"}}"#);
        let data: GenericTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(data.value, U256::MAX);

        // 2^256 does not fit
        let over = "0x1".to_string() + &"0".repeat(64);
        let json = format!(r#"{{"value":"{over}"}}"#);
        assert!(serde_json::from_str::<GenericTransaction>(&json).is_err());
    }

    #[test]
    fn gas_times_fee_must_fit_u256() {
        let params = ChainParams::mainnet();
        let data = GenericTransaction {
            gas: Some(u64::MAX - 1),
            gas_price: Some(U256::MAX),
            ..Default::default()
        };
        assert!(matches!(
            LegacyTransaction::from_tx_data(&data, params, &TxOptions::default()),
            Err(TxError::BoundsExceeded {
                field: "gasLimit",
                ..
            })
        ));
    }

    #[test]
    fn leading_zero_field_is_rejected() {
        // a legacy list whose nonce is [0x00, 0x09]: canonical RLP forbids
        // the leading zero byte
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&[0x00u8, 0x09])
            .encode_field(&U256::from(20_000_000_000u64))
            .encode_field(&21000u64)
            .encode_field(&TxKind::Create)
            .encode_field(&U256::zero())
            .encode_field(&Bytes::new())
            .finish();
        let result = TxRegistry::new().from_serialized(
            &buf,
            &ChainParams::mainnet(),
            &TxOptions::default(),
        );
        assert!(matches!(result, Err(TxError::Rlp(_))));

        // while an empty byte string is the canonical zero
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&0u64)
            .encode_field(&U256::from(20_000_000_000u64))
            .encode_field(&21000u64)
            .encode_field(&TxKind::Create)
            .encode_field(&U256::zero())
            .encode_field(&Bytes::new())
            .finish();
        let decoded = TxRegistry::new()
            .from_serialized(&buf, &ChainParams::mainnet(), &TxOptions::default())
            .unwrap();
        assert_eq!(decoded.nonce(), 0);
    }

    #[test]
    fn high_s_is_rejected_post_homestead() {
        let params = ChainParams::new(1, Fork::Berlin);
        let tx = Transaction::EIP2930(EIP2930Transaction {
            chain_id: 1,
            nonce: 0,
            gas_price: U256::from(10u64),
            gas_limit: 21000,
            to: TxKind::Call(Address::zero()),
            value: U256::zero(),
            data: Bytes::new(),
            access_list: vec![],
            signature: Some(TxSignature {
                y_parity: false,
                r: U256::one(),
                s: SECP256K1_ORDER_HALF + U256::one(),
            }),
            params,
            inner_hash: OnceCell::new(),
        });
        assert!(matches!(
            tx.sender_public_key(),
            Err(TxError::InvalidSignature(_))
        ));
        // the factory refuses to construct it at all
        assert!(matches!(
            tx.validate_new(&TxOptions::default()),
            Err(TxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn legacy_v_must_match_chain_id() {
        let mut signed = eip155_example().sign(&[0x46; 32]).unwrap();
        // re-interpret the same signature against a different chain
        if let Transaction::Legacy(inner) = &mut signed {
            inner.params = ChainParams::new(5, Fork::SpuriousDragon);
        }
        assert!(matches!(
            signed.sender(),
            Err(TxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn invalid_legacy_v_values() {
        let mut signed = eip155_example().sign(&[0x46; 32]).unwrap();
        if let Transaction::Legacy(inner) = &mut signed {
            inner.signature.as_mut().unwrap().v = U256::from(29);
        }
        assert!(matches!(
            signed.sender(),
            Err(TxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn chain_id_derivation() {
        assert_eq!(derive_legacy_chain_id(U256::from(27)), None);
        assert_eq!(derive_legacy_chain_id(U256::from(28)), None);
        assert_eq!(derive_legacy_chain_id(U256::from(37)), Some(1));
        assert_eq!(derive_legacy_chain_id(U256::from(38)), Some(1));
        assert_eq!(derive_legacy_chain_id(U256::from(6303851)), Some(3151908));
    }

    #[test]
    fn intrinsic_gas_plain_transfer() {
        let tx = eip155_example();
        assert_eq!(tx.intrinsic_gas().unwrap(), 21000);
        assert_eq!(tx.data_fee().unwrap(), 0);
    }

    #[test]
    fn intrinsic_gas_counts_data_bytes() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.data = Bytes::from_static(&[0x01, 0x02, 0x00]);
            inner.params = ChainParams::new(1, Fork::Homestead);
        }
        // pre-Istanbul non-zero bytes cost 68
        assert_eq!(tx.intrinsic_gas().unwrap(), 21000 + 2 * 68 + 4);

        if let Transaction::Legacy(inner) = &mut tx {
            inner.params = ChainParams::new(1, Fork::Istanbul);
        }
        assert_eq!(tx.intrinsic_gas().unwrap(), 21000 + 2 * 16 + 4);
    }

    #[test]
    fn eip2930_base_fee_includes_access_list() {
        let params = ChainParams::new(1, Fork::Berlin);
        let tx = Transaction::EIP2930(EIP2930Transaction {
            chain_id: 1,
            nonce: 0,
            gas_price: U256::from(10u64),
            gas_limit: 100_000,
            to: TxKind::Call(Address::zero()),
            value: U256::zero(),
            data: Bytes::from_static(&[0x01, 0x02, 0x00]),
            access_list: vec![(Address::zero(), vec![H256::zero()])],
            signature: None,
            params,
            inner_hash: OnceCell::new(),
        });
        assert_eq!(
            tx.intrinsic_gas().unwrap(),
            21000 + 2 * 16 + 4 + 2400 + 1900
        );
    }

    #[test]
    fn creation_fee_from_homestead() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.to = TxKind::Create;
            inner.params = ChainParams::new(1, Fork::Frontier);
        }
        assert_eq!(tx.intrinsic_gas().unwrap(), 21000);

        if let Transaction::Legacy(inner) = &mut tx {
            inner.params = ChainParams::new(1, Fork::Homestead);
        }
        assert_eq!(tx.intrinsic_gas().unwrap(), 21000 + 32000);
    }

    #[test]
    fn init_code_word_cost_from_shanghai() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.to = TxKind::Create;
            inner.data = Bytes::from(vec![0x01; 64]);
            inner.params = ChainParams::new(1, Fork::Shanghai);
        }
        // 2 words of init code at 2 gas each
        assert_eq!(tx.data_fee().unwrap(), 64 * 16 + 2 * 2);
    }

    #[test]
    fn init_code_size_ceiling() {
        let params = ChainParams::new(1, Fork::Shanghai);
        let data = GenericTransaction {
            input: Bytes::from(vec![0x01; 49153]),
            ..Default::default()
        };
        assert!(matches!(
            LegacyTransaction::from_tx_data(&data, params.clone(), &TxOptions::default()),
            Err(TxError::InitCodeSizeExceeded { size: 49153, .. })
        ));

        // the escape hatch skips the ceiling but still charges the gas
        let opts = TxOptions {
            allow_unlimited_init_code: true,
        };
        let tx = LegacyTransaction::from_tx_data(&data, params, &opts).unwrap();
        let words = 49153u64.div_ceil(32);
        assert_eq!(tx.data_fee().unwrap(), 49153 * 16 + words * 2);
    }

    #[test]
    fn data_fee_follows_the_embedded_fork() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.data = Bytes::from_static(&[0x01]);
            inner.params = ChainParams::new(1, Fork::Homestead);
        }
        assert_eq!(tx.data_fee().unwrap(), 68);
        // a fresh registry copy with a later fork gives the updated cost;
        // nothing stale survives from the earlier computation
        if let Transaction::Legacy(inner) = &mut tx {
            inner.params.set_fork(Fork::Istanbul);
        }
        assert_eq!(tx.data_fee().unwrap(), 16);
    }

    #[test]
    fn upfront_cost_fee_market() {
        let params = ChainParams::new(1, Fork::London);
        let tx = Transaction::EIP1559(EIP1559Transaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: U256::from(1000),
            max_fee_per_gas: U256::from(2000),
            gas_limit: 21000,
            to: TxKind::Call(Address::zero()),
            value: U256::from(100_000),
            data: Bytes::new(),
            access_list: vec![],
            signature: None,
            params,
            inner_hash: OnceCell::new(),
        });
        // min(1000, 2000 - 500) + 500 = 1500
        assert_eq!(
            tx.upfront_cost(Some(U256::from(500))).unwrap(),
            U256::from(21000u64 * 1500 + 100_000)
        );
        // without a base fee the priority fee alone applies
        assert_eq!(
            tx.upfront_cost(None).unwrap(),
            U256::from(21000u64 * 1000 + 100_000)
        );
        assert_eq!(
            tx.effective_gas_price(Some(U256::from(500))),
            Some(U256::from(1500))
        );
        assert_eq!(tx.effective_gas_price(Some(U256::from(3000))), None);
    }

    #[test]
    fn max_priority_fee_cannot_exceed_max_fee() {
        let params = ChainParams::new(1, Fork::London);
        let data = GenericTransaction {
            max_fee_per_gas: Some(U256::from(10)),
            max_priority_fee_per_gas: Some(U256::from(11)),
            ..Default::default()
        };
        assert!(matches!(
            EIP1559Transaction::from_tx_data(&data, params, &TxOptions::default()),
            Err(TxError::MalformedField {
                field: "maxPriorityFeePerGas",
                ..
            })
        ));
    }

    #[test]
    fn eip1559_rejects_gas_price() {
        let params = ChainParams::new(1, Fork::London);
        let data = GenericTransaction {
            gas_price: Some(U256::from(10)),
            max_fee_per_gas: Some(U256::from(10)),
            ..Default::default()
        };
        assert!(matches!(
            EIP1559Transaction::from_tx_data(&data, params, &TxOptions::default()),
            Err(TxError::MalformedField {
                field: "gasPrice",
                ..
            })
        ));
    }

    #[test]
    fn eip2930_requires_berlin() {
        let params = ChainParams::new(1, Fork::Istanbul);
        let data = GenericTransaction::default();
        assert!(matches!(
            EIP2930Transaction::from_tx_data(&data, params, &TxOptions::default()),
            Err(TxError::FeatureNotActive { eip: 2930 })
        ));
    }

    #[test]
    fn explicit_eips_enable_typed_transactions_pre_berlin() {
        let mut params = ChainParams::new(1, Fork::Istanbul);
        params.set_eips(vec![2718, 2930]).unwrap();
        let data = GenericTransaction::default();
        assert!(
            EIP2930Transaction::from_tx_data(&data, params, &TxOptions::default()).is_ok()
        );
    }

    #[test]
    fn validation_reports_gas_limit_violation() {
        let mut tx = eip155_example();
        if let Transaction::Legacy(inner) = &mut tx {
            inner.gas_limit = 20000;
        }
        let errors = tx.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("below the intrinsic gas"));
        assert!(!tx.is_valid());

        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        assert!(signed.is_valid());
    }

    #[test]
    fn capabilities_per_variant() {
        let legacy = eip155_example().sign(&[0x46; 32]).unwrap();
        assert!(legacy.supports(Capability::ReplayProtection));
        assert!(!legacy.supports(Capability::TypedEnvelope));
        assert!(!legacy.supports(Capability::FeeMarket));

        let params = ChainParams::new(1, Fork::London);
        let fee_market = Transaction::EIP1559(EIP1559Transaction {
            chain_id: 1,
            params,
            ..Default::default()
        });
        assert!(fee_market.supports(Capability::TypedEnvelope));
        assert!(fee_market.supports(Capability::AccessLists));
        assert!(fee_market.supports(Capability::FeeMarket));
    }

    #[test]
    fn json_serialization_legacy() {
        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        let json: serde_json::Value =
            serde_json::to_value(&signed).expect("serialization failed");
        assert_eq!(json["type"], "0x0");
        assert_eq!(json["nonce"], "0x9");
        assert_eq!(json["gasPrice"], "0x4a817c800");
        assert_eq!(json["value"], "0xde0b6b3a7640000");
        assert_eq!(json["chainId"], "0x1");
        assert_eq!(json["to"], "0x3535353535353535353535353535353535353535");
        assert_eq!(json["v"], "0x25");
        // no fee-market or access-list fields on a legacy transaction
        assert!(json.get("maxFeePerGas").is_none());
        assert!(json.get("accessList").is_none());
    }

    #[test]
    fn json_serialization_unsigned_omits_signature() {
        let tx = eip155_example();
        let json: serde_json::Value = serde_json::to_value(&tx).expect("serialization failed");
        assert!(json.get("v").is_none());
        assert!(json.get("r").is_none());
        assert!(json.get("s").is_none());
    }

    #[test]
    fn json_serialization_eip1559() {
        let params = ChainParams::new(1, Fork::London);
        let tx = Transaction::EIP1559(EIP1559Transaction {
            chain_id: 1,
            nonce: 1,
            max_priority_fee_per_gas: U256::from(1000),
            max_fee_per_gas: U256::from(2000),
            gas_limit: 21000,
            to: TxKind::Create,
            value: U256::zero(),
            data: Bytes::from_static(&[0x03]),
            access_list: vec![(Address::zero(), vec![H256::zero()])],
            signature: Some(TxSignature {
                y_parity: true,
                r: U256::one(),
                s: U256::one(),
            }),
            params,
            inner_hash: OnceCell::new(),
        });
        let json: serde_json::Value = serde_json::to_value(&tx).expect("serialization failed");
        assert_eq!(json["type"], "0x2");
        assert_eq!(json["maxPriorityFeePerGas"], "0x3e8");
        assert_eq!(json["maxFeePerGas"], "0x7d0");
        assert_eq!(json["yParity"], "0x1");
        assert_eq!(json["accessList"][0]["address"], format!("{:#x}", Address::zero()));
        assert!(json.get("gasPrice").is_none());
        assert!(json["to"].is_null());
    }

    #[test]
    fn generic_transaction_deserializes_rpc_shape() {
        let payload = r#"{
            "type": "0x1",
            "nonce": "0x2",
            "to": "",
            "gas": "0x5208",
            "value": "0x1",
            "input": "0x010203040506",
            "gasPrice": "0x7",
            "accessList": [
                {
                    "address": "0x000f3df6d732807ef1319fb7b8bb8522d0beac02",
                    "storageKeys": [
                        "0x000000000000000000000000000000000000000000000000000000000000000c",
                        "0x000000000000000000000000000000000000000000000000000000000000200b"
                    ]
                }
            ]
        }"#;
        let data: GenericTransaction = serde_json::from_str(payload).unwrap();
        assert_eq!(data.tx_type, Some(TxType::EIP2930));
        assert_eq!(data.nonce, Some(2));
        assert_eq!(data.to, TxKind::Create);
        assert_eq!(data.gas, Some(0x5208));
        assert_eq!(data.value, U256::one());
        assert_eq!(data.gas_price, Some(U256::from(7)));
        assert_eq!(data.input, Bytes::from(hex!("010203040506").to_vec()));
        assert_eq!(data.access_list.len(), 1);
        assert_eq!(
            data.access_list[0].storage_keys,
            vec![H256::from_low_u64_be(12), H256::from_low_u64_be(8203)]
        );
    }

    #[test]
    fn generic_transaction_merges_data_and_input() {
        let payload = r#"{"data": "0x0102", "input": "0x0102"}"#;
        let data: GenericTransaction = serde_json::from_str(payload).unwrap();
        assert_eq!(data.input, Bytes::from_static(&[0x01, 0x02]));

        let conflicting = r#"{"data": "0x0102", "input": "0x0304"}"#;
        assert!(serde_json::from_str::<GenericTransaction>(conflicting).is_err());
    }

    #[test]
    fn values_array_roundtrip() {
        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        let Transaction::Legacy(inner) = &signed else {
            panic!("expected a legacy transaction");
        };
        let values = inner.values();
        assert_eq!(values.len(), 9);
        let rebuilt = LegacyTransaction::from_values(
            &values,
            spurious_dragon_params(),
            &TxOptions::default(),
        )
        .unwrap();
        assert_eq!(rebuilt, signed);
    }

    #[test]
    fn values_array_rejects_leading_zero_nonce() {
        let Transaction::Legacy(inner) = eip155_example() else {
            panic!("expected a legacy transaction");
        };
        let mut values = inner.values();
        assert_eq!(values.len(), 6);
        values[0] = Bytes::from_static(&[0x00, 0x09]);
        assert!(matches!(
            LegacyTransaction::from_values(
                &values,
                spurious_dragon_params(),
                &TxOptions::default()
            ),
            Err(TxError::MalformedField { field: "nonce", .. })
        ));

        // the empty byte string is the canonical zero and passes
        values[0] = Bytes::new();
        let rebuilt = LegacyTransaction::from_values(
            &values,
            spurious_dragon_params(),
            &TxOptions::default(),
        )
        .unwrap();
        assert_eq!(rebuilt.nonce(), 0);
    }

    #[test]
    fn values_array_arity_is_checked() {
        let Transaction::Legacy(inner) = eip155_example() else {
            panic!("expected a legacy transaction");
        };
        let mut values = inner.values();
        values.push(Bytes::new());
        assert!(matches!(
            LegacyTransaction::from_values(
                &values,
                spurious_dragon_params(),
                &TxOptions::default()
            ),
            Err(TxError::MalformedField {
                field: "values",
                ..
            })
        ));
    }

    #[test]
    fn generic_transaction_roundtrip_through_builder() {
        let signed = eip155_example().sign(&[0x46; 32]).unwrap();
        let builder = GenericTransaction::from(&signed);
        let rebuilt = LegacyTransaction::from_tx_data(
            &builder,
            spurious_dragon_params(),
            &TxOptions::default(),
        )
        .unwrap();
        assert_eq!(rebuilt, signed);
    }
}
