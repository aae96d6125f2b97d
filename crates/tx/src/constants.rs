use ethereum_types::U256;

// === EIP-4844 constants ===

pub const BYTES_PER_FIELD_ELEMENT: usize = 32;

pub const FIELD_ELEMENTS_PER_BLOB: usize = 4096;

/// Size of a single blob (== blob gas consumption of one blob).
pub const BYTES_PER_BLOB: usize = FIELD_ELEMENTS_PER_BLOB * BYTES_PER_FIELD_ELEMENT;

/// Version byte of a KZG-committed versioned hash.
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

// === secp256k1 constants ===

/// Order of the secp256k1 curve,
/// = 0xfffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141
pub const SECP256K1_ORDER: U256 = U256([
    0xbfd25e8cd0364141,
    0xbaaedce6af48a03b,
    0xfffffffffffffffe,
    0xffffffffffffffff,
]);

/// Half the order of the secp256k1 curve. Signatures with `s` above this
/// value are malleable and rejected from Homestead on (EIP-2).
pub const SECP256K1_ORDER_HALF: U256 = U256([
    0xdfe92f46681b20a0,
    0x5d576e7357a4501d,
    0xffffffffffffffff,
    0x7fffffffffffffff,
]);
