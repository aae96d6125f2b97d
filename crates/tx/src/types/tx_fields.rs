use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{error::TxError, types::chain_params::ChainParams, Address, H256};

/// Access list in its raw tuple form, as carried on the wire.
pub type AccessList = Vec<AccessListItem>;
pub type AccessListItem = (Address, Vec<H256>);

/// Access list entry in its structured JSON form.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl From<&AccessListItem> for AccessListEntry {
    fn from(value: &AccessListItem) -> AccessListEntry {
        AccessListEntry {
            address: value.0,
            storage_keys: value.1.clone(),
        }
    }
}

impl From<&AccessListEntry> for AccessListItem {
    fn from(value: &AccessListEntry) -> AccessListItem {
        (value.address, value.storage_keys.clone())
    }
}

/// Structured view of a raw access list.
pub fn entries(list: &AccessList) -> Vec<AccessListEntry> {
    list.iter().map(AccessListEntry::from).collect()
}

/// Raw tuple view of a structured access list.
pub fn from_entries(entries: &[AccessListEntry]) -> AccessList {
    entries.iter().map(AccessListItem::from).collect()
}

/// Builds an access list from loose byte sequences, validating the shape:
/// addresses must be exactly 20 bytes, storage keys exactly 32.
pub fn normalize_raw(raw: &[(Bytes, Vec<Bytes>)]) -> Result<AccessList, TxError> {
    let mut list = Vec::with_capacity(raw.len());
    for (address, keys) in raw {
        if address.len() != 20 {
            return Err(TxError::InvalidAccessList(format!(
                "address must be exactly 20 bytes, got {}",
                address.len()
            )));
        }
        let mut storage_keys = Vec::with_capacity(keys.len());
        for key in keys {
            if key.len() != 32 {
                return Err(TxError::InvalidAccessList(format!(
                    "storage key must be exactly 32 bytes, got {}",
                    key.len()
                )));
            }
            storage_keys.push(H256::from_slice(key));
        }
        list.push((Address::from_slice(address), storage_keys));
    }
    Ok(list)
}

/// Gas charged for declaring the access list (EIP-2930). An empty list
/// costs nothing on any fork.
pub fn access_list_cost(list: &AccessList, params: &ChainParams) -> Result<u64, TxError> {
    if list.is_empty() {
        return Ok(0);
    }
    let address_cost = params.param("gas", "accessListAddress")?;
    let storage_key_cost = params.param("gas", "accessListStorageKey")?;
    let storage_keys: u64 = list.iter().map(|(_, keys)| keys.len() as u64).sum();

    (list.len() as u64)
        .checked_mul(address_cost)
        .and_then(|gas| storage_keys.checked_mul(storage_key_cost)?.checked_add(gas))
        .ok_or(TxError::GasOverflow)
}
