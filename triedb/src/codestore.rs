//! Disk-backed, content-addressed code store (spec §6 "a code store
//! (content-addressed by code hash)"). One file per distinct code hash,
//! named by its hex digest, grounded on the same content-addressing scheme
//! `code.rs`'s in-memory [`rust_eth_triedb_mpt::MemoryCodeStore`] uses.

use std::fs;
use std::path::PathBuf;

use alloy_primitives::B256;
use parking_lot::RwLock;
use rust_eth_triedb_mpt::CodeStore;

/// A [`CodeStore`] that keeps each distinct code blob as its own file under
/// `directory`, named by the hex of its Keccak256 hash. A small in-memory
/// set tracks which hashes are already on disk so `contains`/repeated
/// `put`s of the same code avoid a filesystem round trip.
pub struct DiskCodeStore {
    directory: PathBuf,
    known: RwLock<std::collections::HashSet<B256>>,
}

impl DiskCodeStore {
    /// Opens (creating if missing) a code store rooted at `directory`,
    /// indexing whatever hashes are already present.
    pub fn open(directory: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&directory)?;
        let mut known = std::collections::HashSet::new();
        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(bytes) = hex::decode(name) {
                    if bytes.len() == 32 {
                        known.insert(B256::from_slice(&bytes));
                    }
                }
            }
        }
        Ok(Self { directory, known: RwLock::new(known) })
    }

    fn path_for(&self, hash: &B256) -> PathBuf {
        self.directory.join(hex::encode(hash))
    }
}

impl CodeStore for DiskCodeStore {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        if !self.known.read().contains(hash) {
            return None;
        }
        fs::read(self.path_for(hash)).ok()
    }

    fn put(&self, code: Vec<u8>) -> B256 {
        let hash = alloy_primitives::keccak256(&code);
        if self.known.read().contains(&hash) {
            return hash;
        }
        // Content-addressed: any existing file for this hash already holds
        // identical bytes, so a concurrent write racing here is harmless.
        if fs::write(self.path_for(&hash), &code).is_ok() {
            self.known.write().insert(hash);
        }
        hash
    }

    fn contains(&self, hash: &B256) -> bool {
        self.known.read().contains(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCodeStore::open(dir.path().to_path_buf()).unwrap();
        let hash = store.put(vec![0x60, 0x01]);
        assert_eq!(store.get(&hash), Some(vec![0x60, 0x01]));
        assert!(store.contains(&hash));
    }

    #[test]
    fn reopening_rediscovers_existing_codes() {
        let dir = tempfile::tempdir().unwrap();
        let hash = {
            let store = DiskCodeStore::open(dir.path().to_path_buf()).unwrap();
            store.put(vec![0xde, 0xad, 0xbe, 0xef])
        };

        let reopened = DiskCodeStore::open(dir.path().to_path_buf()).unwrap();
        assert!(reopened.contains(&hash));
        assert_eq!(reopened.get(&hash), Some(vec![0xde, 0xad, 0xbe, 0xef]));
    }
}
