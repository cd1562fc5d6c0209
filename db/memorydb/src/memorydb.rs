//! In-memory `RecordStore` implementation.
//!
//! Keeps every record in a plain `Vec`, growing it on demand. No paging, no
//! eviction, no I/O — used as the fast backend for unit and integration
//! tests that exercise the node pool and MPT layers without touching disk.

use std::convert::Infallible;

use parking_lot::RwLock;

use rust_eth_triedb_common::RecordStore;

/// An in-memory record store of fixed-width records.
#[derive(Debug)]
pub struct MemoryStore {
    record_size: usize,
    records: RwLock<Vec<Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new, empty store of `record_size`-byte records.
    pub fn new(record_size: usize) -> Self {
        assert!(record_size > 0, "record size must be non-zero");
        Self {
            record_size,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of records ever written (matches [`RecordStore::size`]).
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True if no record has ever been written.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, index: u32) -> Result<Vec<u8>, Self::Error> {
        let records = self.records.read();
        Ok(records
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| vec![0u8; self.record_size]))
    }

    fn set(&self, index: u32, record: &[u8]) -> Result<(), Self::Error> {
        assert_eq!(record.len(), self.record_size, "record size mismatch");
        let mut records = self.records.write();
        let index = index as usize;
        if index >= records.len() {
            records.resize(index + 1, vec![0u8; self.record_size]);
        }
        records[index] = record.to_vec();
        Ok(())
    }

    fn size(&self) -> u32 {
        self.records.read().len() as u32
    }

    fn flush(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_record_reads_as_zero() {
        let store = MemoryStore::new(8);
        assert_eq!(store.get(0).unwrap(), vec![0u8; 8]);
        assert_eq!(store.get(100).unwrap(), vec![0u8; 8]);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = MemoryStore::new(4);
        store.set(10, &[1, 2, 3, 4]).unwrap();
        assert_eq!(store.get(10).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(store.get(0).unwrap(), vec![0u8; 4]);
        assert_eq!(store.size(), 11);
    }

    #[test]
    fn overwrite_replaces_record() {
        let store = MemoryStore::new(2);
        store.set(0, &[1, 1]).unwrap();
        store.set(0, &[2, 2]).unwrap();
        assert_eq!(store.get(0).unwrap(), vec![2, 2]);
    }
}
