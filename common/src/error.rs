//! Low-level error kinds shared by the storage layers (spec §7).
//!
//! Higher layers (`mpt`, `triedb`) wrap these with `#[from]` into their own,
//! richer error enums rather than re-declaring `Io`/`Corruption`.

use thiserror::Error;

/// Errors raised by the paged file store and the typed node pool.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A read or write against the backing medium failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk invariant was violated: a variant-tag mismatch, a dangling
    /// reference, or any other condition that must never occur in a
    /// non-corrupt store. Fatal: callers must stop writing and run `Verify`.
    #[error("corruption detected: {0}")]
    Corruption(String),
}
