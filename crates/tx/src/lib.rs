pub mod constants;
pub mod error;
pub mod kzg;
pub mod serde_utils;
pub mod types;
pub mod utils;

pub use ethereum_types::{Address, H160, H256, U256};
