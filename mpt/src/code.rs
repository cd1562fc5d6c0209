//! Content-addressed contract code storage (spec §4.3, "SetCode stores code
//! keyed by address in the trie's account leaf and by `Keccak(code)` in an
//! associated content store").
//!
//! This module only defines the contract and an in-memory implementation
//! suitable for tests and the `Live` state's working set; `triedb` supplies
//! the disk-backed implementation that persists under the state directory.

use std::collections::HashMap;

use alloy_primitives::{keccak256, B256};
use parking_lot::RwLock;

/// A content-addressed byte-code store, keyed by `Keccak256(code)`.
pub trait CodeStore: Send + Sync {
    fn get(&self, hash: &B256) -> Option<Vec<u8>>;
    fn put(&self, code: Vec<u8>) -> B256;
    fn contains(&self, hash: &B256) -> bool {
        self.get(hash).is_some()
    }
}

/// An in-memory [`CodeStore`], used directly by tests and by any `State`
/// backend that keeps code resident rather than paged to disk.
#[derive(Default)]
pub struct MemoryCodeStore {
    codes: RwLock<HashMap<B256, Vec<u8>>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeStore for MemoryCodeStore {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        self.codes.read().get(hash).cloned()
    }

    fn put(&self, code: Vec<u8>) -> B256 {
        let hash = keccak256(&code);
        self.codes.write().entry(hash).or_insert(code);
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryCodeStore::new();
        let hash = store.put(b"contract bytecode".to_vec());
        assert_eq!(store.get(&hash), Some(b"contract bytecode".to_vec()));
    }

    #[test]
    fn empty_code_hashes_to_keccak_empty() {
        let store = MemoryCodeStore::new();
        let hash = store.put(Vec::new());
        assert_eq!(hash, alloy_trie::KECCAK_EMPTY);
    }
}
