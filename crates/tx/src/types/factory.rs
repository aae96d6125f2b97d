use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use ethtx_rlp::{decode::RLPDecode, error::RLPDecodeError};

use crate::{
    error::TxError,
    types::{
        blob::BlobTransaction,
        chain_params::ChainParams,
        transaction::{
            split_block_body_item, EIP1559Transaction, EIP2930Transaction, GenericTransaction,
            LegacyTransaction, Transaction, TxOptions, TxType,
        },
    },
};

/// Decodes the payload of one typed-transaction envelope (the bytes after
/// the type byte) into a validated transaction.
pub type TxDecoderFn = fn(&[u8], &ChainParams, &TxOptions) -> Result<Transaction, TxError>;

/// Dispatches wire bytes and structured data to the matching transaction
/// generation. New envelope types can be registered at runtime, so forward
/// compatibility never requires touching this module.
pub struct TxRegistry {
    decoders: BTreeMap<u8, TxDecoderFn>,
}

impl Default for TxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<TxRegistry> = Lazy::new(TxRegistry::new);

/// Registry with the built-in transaction types, shared process-wide.
pub fn default_registry() -> &'static TxRegistry {
    &DEFAULT_REGISTRY
}

impl TxRegistry {
    pub fn new() -> Self {
        let mut decoders = BTreeMap::new();
        decoders.insert(TxType::EIP2930 as u8, decode_eip2930 as TxDecoderFn);
        decoders.insert(TxType::EIP1559 as u8, decode_eip1559 as TxDecoderFn);
        decoders.insert(TxType::Blob as u8, decode_blob as TxDecoderFn);
        Self { decoders }
    }

    /// Registers a decoder for an envelope type byte. Type bytes above 0x7f
    /// collide with the legacy RLP space and are rejected.
    pub fn register(&mut self, type_byte: u8, decoder: TxDecoderFn) -> Result<(), TxError> {
        if type_byte > 0x7f {
            return Err(TxError::UnsupportedType(type_byte));
        }
        if self.decoders.insert(type_byte, decoder).is_some() {
            tracing::warn!(type_byte, "overriding registered transaction type decoder");
        }
        Ok(())
    }

    /// Builds a transaction from structured data. A missing `type` selects
    /// the legacy generation.
    pub fn from_tx_data(
        &self,
        data: &GenericTransaction,
        params: &ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        match data.tx_type.unwrap_or_default() {
            TxType::Legacy => LegacyTransaction::from_tx_data(data, params.clone(), opts),
            TxType::EIP2930 => EIP2930Transaction::from_tx_data(data, params.clone(), opts),
            TxType::EIP1559 => EIP1559Transaction::from_tx_data(data, params.clone(), opts),
            TxType::Blob => BlobTransaction::from_tx_data(data, params.clone(), opts),
        }
    }

    /// Decodes canonical wire bytes: a first byte at or below 0x7f is an
    /// EIP-2718 envelope discriminant, anything else is legacy RLP.
    pub fn from_serialized(
        &self,
        bytes: &[u8],
        params: &ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        match bytes.first() {
            Some(first) if *first <= 0x7f => {
                let decoder = self
                    .decoders
                    .get(first)
                    .ok_or(TxError::UnsupportedType(*first))?;
                decoder(&bytes[1..], params, opts)
            }
            Some(_) => decode_legacy(bytes, params, opts),
            None => Err(TxError::Rlp(RLPDecodeError::InvalidLength)),
        }
    }

    /// Decodes one transaction item of a block body: an RLP byte string is
    /// a typed envelope, an RLP list is a legacy transaction's field array.
    pub fn from_block_body_item(
        &self,
        rlp: &[u8],
        params: &ChainParams,
        opts: &TxOptions,
    ) -> Result<Transaction, TxError> {
        let (is_typed, payload) = split_block_body_item(rlp)?;
        if is_typed {
            self.from_serialized(payload, params, opts)
        } else {
            decode_legacy(payload, params, opts)
        }
    }
}

fn decode_legacy(
    bytes: &[u8],
    params: &ChainParams,
    opts: &TxOptions,
) -> Result<Transaction, TxError> {
    let mut tx = LegacyTransaction::decode(bytes)?;
    tx.params = params.clone();
    let tx = Transaction::Legacy(tx);
    tx.validate_new(opts)?;
    Ok(tx)
}

fn decode_eip2930(
    payload: &[u8],
    params: &ChainParams,
    opts: &TxOptions,
) -> Result<Transaction, TxError> {
    let mut tx = EIP2930Transaction::decode(payload)?;
    tx.params = params.clone();
    let tx = Transaction::EIP2930(tx);
    tx.validate_new(opts)?;
    Ok(tx)
}

fn decode_eip1559(
    payload: &[u8],
    params: &ChainParams,
    opts: &TxOptions,
) -> Result<Transaction, TxError> {
    let mut tx = EIP1559Transaction::decode(payload)?;
    tx.params = params.clone();
    let tx = Transaction::EIP1559(tx);
    tx.validate_new(opts)?;
    Ok(tx)
}

fn decode_blob(
    payload: &[u8],
    params: &ChainParams,
    opts: &TxOptions,
) -> Result<Transaction, TxError> {
    let mut tx = BlobTransaction::decode_minimal(payload)?;
    tx.params = params.clone();
    let tx = Transaction::Blob(tx);
    tx.validate_new(opts)?;
    Ok(tx)
}
