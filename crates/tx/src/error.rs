use ethtx_rlp::error::RLPDecodeError;
use thiserror::Error;

use crate::types::{blobs_bundle::BlobsBundleError, chain_params::ChainParamsError};

/// Everything that can go wrong while building, decoding, signing or
/// inspecting a transaction. All failures are raised synchronously at the
/// point of violation; no partially-valid transaction is ever returned.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("Malformed field '{field}': {reason}")]
    MalformedField { field: &'static str, reason: String },
    #[error("Field '{field}' out of bounds: {reason}")]
    BoundsExceeded { field: &'static str, reason: String },
    #[error("EIP-{eip} must be active on the chain configuration for this transaction type")]
    FeatureNotActive { eip: u64 },
    #[error("Invalid access list: {0}")]
    InvalidAccessList(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Transaction is not signed ({0})")]
    NotSigned(String),
    #[error("Unsupported transaction type: {0:#04x}")]
    UnsupportedType(u8),
    #[error("Init code of {size} bytes exceeds the maximum of {max}")]
    InitCodeSizeExceeded { size: usize, max: u64 },
    #[error("Private key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Gas arithmetic overflow")]
    GasOverflow,
    #[error("Chain parameter registry: {0}")]
    ChainParams(#[from] ChainParamsError),
    #[error("Blob validation: {0}")]
    BlobValidation(#[from] BlobsBundleError),
    #[error("RLP decoding: {0}")]
    Rlp(#[from] RLPDecodeError),
    #[error("SSZ decoding: {0}")]
    Ssz(String),
    #[error("ECDSA: {0}")]
    Secp(#[from] secp256k1::Error),
}
