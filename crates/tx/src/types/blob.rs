use bytes::Bytes;
use keccak_hash::keccak;
use once_cell::sync::OnceCell;
use serde::{ser::SerializeStruct, Serialize};
use ssz::{Decode, Encode};

use crate::{
    constants::BYTES_PER_BLOB,
    error::TxError,
    types::{
        blobs_bundle::{BlobsBundle, BlobsBundleError},
        chain_params::ChainParams,
        transaction::{GenericTransaction, Transaction, TxKind, TxOptions, TxSignature, TxType},
        tx_fields::{self, AccessList},
    },
    Address, H256, U256,
};

/// Blob-carrying transaction (type 0x05). Unlike the RLP generations, its
/// wire format is SSZ: the block-inclusion ("minimal") form is the signed
/// transaction container alone, while the network form additionally wraps
/// the blobs, their commitments and the aggregated KZG proof.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlobTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub max_fee_per_data_gas: U256,
    pub blob_versioned_hashes: Vec<H256>,
    pub signature: Option<TxSignature>,
    pub(crate) params: ChainParams,
    pub(crate) inner_hash: OnceCell<H256>,
}

/// A blob transaction in network form: the transaction plus the sidecar it
/// was gossiped with. The sidecar never enters a block.
#[derive(Clone, Debug, PartialEq)]
pub struct WrappedBlobTransaction {
    pub tx: BlobTransaction,
    pub blobs_bundle: BlobsBundle,
}

/// SSZ containers of the blob transaction wire format.
mod wire {
    use ssz_derive::{Decode as SszDecode, Encode as SszEncode};
    use ssz_types::{typenum, FixedVector, VariableList};

    use super::{Address, H256, U256};

    pub type MaxCalldataSize = typenum::U16777216;
    pub type MaxAccessListSize = typenum::U16777216;
    pub type MaxAccessListStorageKeys = typenum::U16777216;
    pub type MaxVersionedHashesListSize = typenum::U16777216;
    pub type MaxBlobsPerBlock = typenum::U16777216;
    pub type BytesPerBlob = typenum::U131072;

    pub type BlobBytes = FixedVector<u8, BytesPerBlob>;
    pub type KzgBytes = FixedVector<u8, typenum::U48>;

    #[derive(Debug, Clone, PartialEq, SszEncode, SszDecode)]
    pub struct AccessTuple {
        pub address: Address,
        pub storage_keys: VariableList<H256, MaxAccessListStorageKeys>,
    }

    #[derive(Debug, Clone, PartialEq, SszEncode, SszDecode)]
    pub struct BlobTransactionMessage {
        pub chain_id: U256,
        pub nonce: u64,
        pub max_priority_fee_per_gas: U256,
        pub max_fee_per_gas: U256,
        pub gas: u64,
        pub to: Option<Address>,
        pub value: U256,
        pub data: VariableList<u8, MaxCalldataSize>,
        pub access_list: VariableList<AccessTuple, MaxAccessListSize>,
        pub max_fee_per_data_gas: U256,
        pub blob_versioned_hashes: VariableList<H256, MaxVersionedHashesListSize>,
    }

    #[derive(Debug, Clone, PartialEq, SszEncode, SszDecode)]
    pub struct EcdsaSignature {
        pub y_parity: bool,
        pub r: U256,
        pub s: U256,
    }

    #[derive(Debug, Clone, PartialEq, SszEncode, SszDecode)]
    pub struct SignedBlobTransaction {
        pub message: BlobTransactionMessage,
        pub signature: EcdsaSignature,
    }

    #[derive(Debug, Clone, PartialEq, SszEncode, SszDecode)]
    pub struct BlobNetworkTransactionWrapper {
        pub blobs: VariableList<BlobBytes, MaxBlobsPerBlock>,
        pub blob_kzgs: VariableList<KzgBytes, MaxBlobsPerBlock>,
        pub tx: SignedBlobTransaction,
        pub kzg_aggregated_proof: KzgBytes,
    }
}

fn ssz_err(err: impl std::fmt::Debug) -> TxError {
    TxError::Ssz(format!("{err:?}"))
}

impl BlobTransaction {
    fn to_message(&self) -> Result<wire::BlobTransactionMessage, TxError> {
        let access_list = self
            .access_list
            .iter()
            .map(|(address, keys)| {
                Ok(wire::AccessTuple {
                    address: *address,
                    storage_keys: ssz_types::VariableList::new(keys.clone()).map_err(ssz_err)?,
                })
            })
            .collect::<Result<Vec<_>, TxError>>()?;

        Ok(wire::BlobTransactionMessage {
            chain_id: U256::from(self.chain_id),
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas: self.gas_limit,
            to: match &self.to {
                TxKind::Call(address) => Some(*address),
                TxKind::Create => None,
            },
            value: self.value,
            data: ssz_types::VariableList::new(self.data.to_vec()).map_err(ssz_err)?,
            access_list: ssz_types::VariableList::new(access_list).map_err(ssz_err)?,
            max_fee_per_data_gas: self.max_fee_per_data_gas,
            blob_versioned_hashes: ssz_types::VariableList::new(
                self.blob_versioned_hashes.clone(),
            )
            .map_err(ssz_err)?,
        })
    }

    // An unsigned transaction serializes with a zeroed signature container;
    // (0, 0, 0) is not a valid ECDSA signature, so the sentinel is
    // unambiguous on decode.
    fn to_signed_container(&self) -> Result<wire::SignedBlobTransaction, TxError> {
        let signature = match &self.signature {
            Some(sig) => wire::EcdsaSignature {
                y_parity: sig.y_parity,
                r: sig.r,
                s: sig.s,
            },
            None => wire::EcdsaSignature {
                y_parity: false,
                r: U256::zero(),
                s: U256::zero(),
            },
        };
        Ok(wire::SignedBlobTransaction {
            message: self.to_message()?,
            signature,
        })
    }

    fn from_signed_container(signed: &wire::SignedBlobTransaction) -> Result<Self, TxError> {
        let message = &signed.message;
        let access_list = message
            .access_list
            .iter()
            .map(|tuple| (tuple.address, tuple.storage_keys.to_vec()))
            .collect();

        let signature = if signed.signature.r.is_zero()
            && signed.signature.s.is_zero()
            && !signed.signature.y_parity
        {
            None
        } else {
            Some(TxSignature {
                y_parity: signed.signature.y_parity,
                r: signed.signature.r,
                s: signed.signature.s,
            })
        };

        Ok(BlobTransaction {
            chain_id: crate::utils::u256_to_u64("chainId", message.chain_id)?,
            nonce: message.nonce,
            max_priority_fee_per_gas: message.max_priority_fee_per_gas,
            max_fee_per_gas: message.max_fee_per_gas,
            gas_limit: message.gas,
            to: match message.to {
                Some(address) => TxKind::Call(address),
                None => TxKind::Create,
            },
            value: message.value,
            data: Bytes::from(message.data.to_vec()),
            access_list,
            max_fee_per_data_gas: message.max_fee_per_data_gas,
            blob_versioned_hashes: message.blob_versioned_hashes.to_vec(),
            signature,
            params: ChainParams::default(),
            inner_hash: OnceCell::new(),
        })
    }

    /// `0x05 || SSZ(message)`, the bytes a signer commits to.
    pub fn signing_payload(&self) -> Result<Vec<u8>, TxError> {
        let mut buf = vec![TxType::Blob as u8];
        buf.extend_from_slice(&self.to_message()?.as_ssz_bytes());
        Ok(buf)
    }

    pub(crate) fn sign_message_hash(&self) -> Result<H256, TxError> {
        Ok(keccak(self.signing_payload()?))
    }

    /// Minimal (block-inclusion) form: `0x05 || SSZ(SignedBlobTransaction)`.
    /// Blobs, commitments and proof are deliberately absent.
    pub fn encode_canonical(&self, buf: &mut dyn bytes::BufMut) -> Result<(), TxError> {
        buf.put_u8(TxType::Blob as u8);
        buf.put_slice(&self.to_signed_container()?.as_ssz_bytes());
        Ok(())
    }

    pub fn encode_canonical_to_vec(&self) -> Result<Vec<u8>, TxError> {
        let mut buf = Vec::new();
        self.encode_canonical(&mut buf)?;
        Ok(buf)
    }

    /// Decodes the minimal form's SSZ payload (without the leading type
    /// byte). The caller supplies the chain configuration and validation.
    pub fn decode_minimal(payload: &[u8]) -> Result<Self, TxError> {
        let signed = wire::SignedBlobTransaction::from_ssz_bytes(payload).map_err(ssz_err)?;
        Self::from_signed_container(&signed)
    }

    /// Construction-time checks specific to the blob generation.
    pub(crate) fn validate_fields(&self) -> Result<(), TxError> {
        if !self.params.is_activated_eip(4844) {
            return Err(TxError::FeatureNotActive { eip: 4844 });
        }
        if self.max_fee_per_gas < self.max_priority_fee_per_gas {
            return Err(TxError::MalformedField {
                field: "maxPriorityFeePerGas",
                reason: "cannot be greater than maxFeePerGas".to_string(),
            });
        }

        let max_blobs = self.params.param("sharding", "maxBlobsPerTx")?;
        let count = self.blob_versioned_hashes.len();
        if count == 0 || count as u64 > max_blobs {
            return Err(TxError::BlobValidation(BlobsBundleError::InvalidBlobCount {
                count,
                max: max_blobs,
            }));
        }

        let version = self.params.param("sharding", "blobCommitmentVersionKzg")? as u8;
        for (index, hash) in self.blob_versioned_hashes.iter().enumerate() {
            if hash.as_bytes()[0] != version {
                return Err(TxError::BlobValidation(BlobsBundleError::InvalidVersion(
                    index, version,
                )));
            }
        }

        // Bound the calldata by the SSZ list limit so wire conversion can
        // never fail after construction.
        if self.data.len() >= 1 << 24 {
            return Err(TxError::MalformedField {
                field: "data",
                reason: "exceeds the maximum calldata size".to_string(),
            });
        }

        Ok(())
    }

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
        let tx = Transaction::Blob(BlobTransaction {
            chain_id: data.chain_id.unwrap_or_else(|| params.chain_id()),
            nonce: data.nonce.unwrap_or_default(),
            max_priority_fee_per_gas: data.max_priority_fee_per_gas.unwrap_or_default(),
            max_fee_per_gas: data.max_fee_per_gas.unwrap_or_default(),
            gas_limit: data.gas.unwrap_or_default(),
            to: data.to.clone(),
            value: data.value,
            data: data.input.clone(),
            access_list: tx_fields::from_entries(&data.access_list),
            max_fee_per_data_gas: data.max_fee_per_data_gas.unwrap_or_default(),
            blob_versioned_hashes: data.blob_versioned_hashes.clone(),
            signature: data.typed_signature()?,
            params,
            inner_hash: OnceCell::new(),
        });
        tx.validate_new(opts)?;
        Ok(tx)
    }
}

impl WrappedBlobTransaction {
    /// Deserializes and fully cross-validates the network form: lengths of
    /// blobs, commitments and declared versioned hashes must agree, every
    /// commitment must hash to its versioned hash, and the aggregated KZG
    /// proof must verify. No transaction is returned otherwise.
    pub fn from_network_serialized(
        bytes: &[u8],
        params: &ChainParams,
        opts: &TxOptions,
    ) -> Result<Self, TxError> {
        let (first, payload) = match bytes.split_first() {
            Some(split) => split,
            None => return Err(TxError::UnsupportedType(0)),
        };
        if *first != TxType::Blob as u8 {
            return Err(TxError::UnsupportedType(*first));
        }

        let wrapper =
            wire::BlobNetworkTransactionWrapper::from_ssz_bytes(payload).map_err(ssz_err)?;

        let mut tx = BlobTransaction::from_signed_container(&wrapper.tx)?;
        tx.params = params.clone();
        let tx = Transaction::Blob(tx);
        tx.validate_new(opts)?;
        let Transaction::Blob(tx) = tx else {
            unreachable!()
        };

        let mut blobs = Vec::with_capacity(wrapper.blobs.len());
        for (index, blob) in wrapper.blobs.iter().enumerate() {
            let blob: [u8; BYTES_PER_BLOB] = blob
                .to_vec()
                .try_into()
                .map_err(|_| TxError::BlobValidation(BlobsBundleError::InvalidBlobLength(index)))?;
            blobs.push(blob);
        }
        let mut commitments = Vec::with_capacity(wrapper.blob_kzgs.len());
        for kzg in wrapper.blob_kzgs.iter() {
            let commitment: [u8; 48] = kzg
                .to_vec()
                .try_into()
                .map_err(|err| ssz_err(format!("{err:?}")))?;
            commitments.push(commitment);
        }
        let aggregated_proof: [u8; 48] = wrapper
            .kzg_aggregated_proof
            .to_vec()
            .try_into()
            .map_err(|err| ssz_err(format!("{err:?}")))?;

        let blobs_bundle = BlobsBundle {
            blobs,
            commitments,
            aggregated_proof,
        };
        let version = params.param("sharding", "blobCommitmentVersionKzg")? as u8;
        blobs_bundle.validate(&tx.blob_versioned_hashes, version)?;

        Ok(WrappedBlobTransaction { tx, blobs_bundle })
    }

    /// Network form: `0x05 || SSZ(BlobNetworkTransactionWrapper)`.
    pub fn encode_network_to_vec(&self) -> Result<Vec<u8>, TxError> {
        let blobs = self
            .blobs_bundle
            .blobs
            .iter()
            .map(|blob| ssz_types::FixedVector::new(blob.to_vec()).map_err(ssz_err))
            .collect::<Result<Vec<_>, TxError>>()?;
        let blob_kzgs = self
            .blobs_bundle
            .commitments
            .iter()
            .map(|kzg| ssz_types::FixedVector::new(kzg.to_vec()).map_err(ssz_err))
            .collect::<Result<Vec<_>, TxError>>()?;

        let wrapper = wire::BlobNetworkTransactionWrapper {
            blobs: ssz_types::VariableList::new(blobs).map_err(ssz_err)?,
            blob_kzgs: ssz_types::VariableList::new(blob_kzgs).map_err(ssz_err)?,
            tx: self.tx.to_signed_container()?,
            kzg_aggregated_proof: ssz_types::FixedVector::new(
                self.blobs_bundle.aggregated_proof.to_vec(),
            )
            .map_err(ssz_err)?,
        };

        let mut buf = vec![TxType::Blob as u8];
        buf.extend_from_slice(&wrapper.as_ssz_bytes());
        Ok(buf)
    }
}

impl Serialize for BlobTransaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let len = 12 + if self.signature.is_some() { 4 } else { 0 };
        let mut state = serializer.serialize_struct("BlobTransaction", len)?;
        state.serialize_field("type", &TxType::Blob)?;
        state.serialize_field("chainId", &format!("{:#x}", self.chain_id))?;
        state.serialize_field("nonce", &format!("{:#x}", self.nonce))?;
        state.serialize_field("to", &self.to)?;
        state.serialize_field("gas", &format!("{:#x}", self.gas_limit))?;
        state.serialize_field("value", &self.value)?;
        state.serialize_field("input", &format!("0x{:x}", self.data))?;
        state.serialize_field("maxPriorityFeePerGas", &self.max_priority_fee_per_gas)?;
        state.serialize_field("maxFeePerGas", &self.max_fee_per_gas)?;
        state.serialize_field("maxFeePerDataGas", &self.max_fee_per_data_gas)?;
        state.serialize_field("accessList", &tx_fields::entries(&self.access_list))?;
        state.serialize_field("blobVersionedHashes", &self.blob_versioned_hashes)?;
        if let Some(sig) = &self.signature {
            state.serialize_field("yParity", &format!("{:#x}", sig.y_parity as u8))?;
            state.serialize_field("v", &format!("{:#x}", sig.y_parity as u8))?;
            state.serialize_field("r", &sig.r)?;
            state.serialize_field("s", &sig.s)?;
        }
        state.end()
    }
}
