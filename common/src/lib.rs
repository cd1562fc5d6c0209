//! Common types shared across the trie database crates: fixed-width
//! primitives, the tagged `NodeId` handle, hex-nibble/hex-prefix path
//! encoding, and the low-level storage contract and error kinds.

mod error;
mod nibbles;
mod primitives;
mod record_store;

pub use error::StorageError;
pub use nibbles::{
    bytes_to_nibbles, common_prefix_len, compact_to_hex, hex_to_compact, nibbles_to_bytes,
    secure_hash, secure_path,
};
pub use primitives::{
    Address, Balance, Hash, Key, NodeId, NodeVariantTag, Nonce, Value, PATH_NIBBLES,
};
pub use record_store::RecordStore;
