//! The storage contract shared by the paged file store and its in-memory
//! stand-in, keyed by a dense 32-bit index rather than an arbitrary byte path
//! (spec §4.1: "durable, fixed-size-record container addressable by a
//! 32-bit index").

use auto_impl::auto_impl;

/// A fixed-size-record container addressable by a 32-bit index.
///
/// Implementors back one node variant's container (spec §4.2: "four
/// independent paged stores, one per variant"). A record that was never
/// written reads back as the all-zero record ("implicit zero extension"),
/// matching spec §4.1.
#[auto_impl(Box, Arc)]
pub trait RecordStore: Send + Sync {
    /// Associated error type for storage operations.
    type Error;

    /// Reads record `index`. Returns the zero record if it was never written.
    fn get(&self, index: u32) -> Result<Vec<u8>, Self::Error>;

    /// Writes `record` at `index`, marking the backing page dirty.
    fn set(&self, index: u32, record: &[u8]) -> Result<(), Self::Error>;

    /// One past the highest index ever written.
    fn size(&self) -> u32;

    /// Writes all dirty pages back to the backing medium.
    fn flush(&self) -> Result<(), Self::Error>;

    /// Flushes, then releases any held resources.
    fn close(&self) -> Result<(), Self::Error>;
}
