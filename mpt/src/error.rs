//! Errors raised by the MPT mutation core and hashing pipeline.

use rust_eth_triedb_nodepool::NodePoolError;
use thiserror::Error;

/// Errors raised by [`crate::Trie`] and the code store.
#[derive(Debug, Error)]
pub enum MptError {
    /// The underlying node pool failed to read, write, or detected
    /// corruption. Fatal per spec §4.2/§7: callers must stop writing.
    #[error(transparent)]
    NodePool(#[from] NodePoolError),

    /// A key did not expand to the expected 64-nibble secure path.
    #[error("expected a {expected}-nibble path, got {actual}")]
    MalformedPath { expected: usize, actual: usize },
}
