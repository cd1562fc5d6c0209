//! In-memory `RecordStore` backend used by the node pool and MPT test suites.

mod memorydb;

pub use memorydb::MemoryStore;
