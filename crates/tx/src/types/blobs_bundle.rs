use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    constants::BYTES_PER_BLOB,
    kzg::{verify_blob_kzg_proof, KzgError},
    H256,
};

pub type Blob = [u8; BYTES_PER_BLOB];
pub type Commitment = [u8; 48];
pub type Proof = [u8; 48];

#[derive(Debug, Error)]
pub enum BlobsBundleError {
    #[error(
        "Blob count {blobs}, commitment count {commitments} and versioned hash count {hashes} must match"
    )]
    LengthMismatch {
        blobs: usize,
        commitments: usize,
        hashes: usize,
    },
    #[error("Commitment at index {0} does not hash to its declared versioned hash")]
    VersionedHashMismatch(usize),
    #[error("Versioned hash at index {0} does not carry version byte {1:#04x}")]
    InvalidVersion(usize, u8),
    #[error("Aggregated KZG proof does not verify against the supplied blobs and commitments")]
    InvalidProof,
    #[error("Blob transactions must carry between 1 and {max} versioned hashes, got {count}")]
    InvalidBlobCount { count: usize, max: u64 },
    #[error("Blob at index {0} has the wrong length")]
    InvalidBlobLength(usize),
    #[cfg(feature = "c-kzg")]
    #[error("Aggregated proof generation is only supported for single-blob bundles")]
    AggregationUnsupported,
    #[error("KZG backend: {0}")]
    Kzg(#[from] KzgError),
}

/// Blob payloads of a transaction together with their KZG commitments and
/// the aggregated proof, as gossiped on the network. Never part of the
/// canonical signed payload.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobsBundle {
    pub blobs: Vec<Blob>,
    pub commitments: Vec<Commitment>,
    pub aggregated_proof: Proof,
}

impl std::fmt::Debug for BlobsBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobsBundle")
            .field("blobs", &self.blobs.len())
            .field("commitments", &self.commitments.len())
            .finish()
    }
}

/// `sha256(commitment)` with the first byte replaced by the version marker.
pub fn commitment_to_versioned_hash(commitment: &Commitment, version: u8) -> H256 {
    let mut hash: [u8; 32] = Sha256::digest(commitment).into();
    hash[0] = version;
    H256::from(hash)
}

impl BlobsBundle {
    /// Cross-validates the bundle against the versioned hashes a transaction
    /// declares: matching lengths, each commitment hashing to its declared
    /// versioned hash, and the aggregated proof verifying every blob.
    pub fn validate(&self, versioned_hashes: &[H256], version: u8) -> Result<(), BlobsBundleError> {
        if self.blobs.len() != self.commitments.len()
            || self.blobs.len() != versioned_hashes.len()
        {
            return Err(BlobsBundleError::LengthMismatch {
                blobs: self.blobs.len(),
                commitments: self.commitments.len(),
                hashes: versioned_hashes.len(),
            });
        }

        for (index, (commitment, hash)) in
            self.commitments.iter().zip(versioned_hashes).enumerate()
        {
            if commitment_to_versioned_hash(commitment, version) != *hash {
                return Err(BlobsBundleError::VersionedHashMismatch(index));
            }
        }

        for (blob, commitment) in self.blobs.iter().zip(&self.commitments) {
            if !verify_blob_kzg_proof(*blob, *commitment, self.aggregated_proof)? {
                return Err(BlobsBundleError::InvalidProof);
            }
        }

        Ok(())
    }

    /// Versioned hashes for the bundled commitments, in order.
    pub fn versioned_hashes(&self, version: u8) -> Vec<H256> {
        self.commitments
            .iter()
            .map(|commitment| commitment_to_versioned_hash(commitment, version))
            .collect()
    }

    /// Commits to the given blobs and produces the bundle, computing one
    /// commitment per blob and the aggregated proof.
    #[cfg(feature = "c-kzg")]
    pub fn create_from_blobs(blobs: &[Blob]) -> Result<Self, BlobsBundleError> {
        use crate::kzg::blob_to_kzg_commitment_and_proof;

        if blobs.len() != 1 {
            return Err(BlobsBundleError::AggregationUnsupported);
        }

        let mut commitments = Vec::with_capacity(blobs.len());
        let mut proof = [0u8; 48];
        for blob in blobs {
            let (commitment, blob_proof) = blob_to_kzg_commitment_and_proof(blob)?;
            commitments.push(commitment);
            proof = blob_proof;
        }

        Ok(Self {
            blobs: blobs.to_vec(),
            commitments,
            aggregated_proof: proof,
        })
    }
}
