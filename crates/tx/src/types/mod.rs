pub mod blob;
pub mod blobs_bundle;
pub mod chain_params;
pub mod factory;
pub mod transaction;
pub mod tx_fields;

pub use blob::{BlobTransaction, WrappedBlobTransaction};
pub use blobs_bundle::{Blob, BlobsBundle, BlobsBundleError, Commitment, Proof};
pub use chain_params::{ChainParams, ChainParamsError, Fork};
pub use factory::TxRegistry;
pub use transaction::{
    Capability, EIP1559Transaction, EIP2930Transaction, GenericTransaction, LegacySignature,
    LegacyTransaction, Transaction, TxKind, TxOptions, TxSignature, TxType,
};
pub use tx_fields::{AccessList, AccessListEntry, AccessListItem};
