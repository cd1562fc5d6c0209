//! The top-level error enum composing every lower-layer failure (spec §7).

use alloy_primitives::Address;
use rust_eth_triedb_mpt::MptError;
use thiserror::Error;

/// Errors surfaced by the [`crate::State`] contract and the `Live`/`Archive`
/// engines. Each lower-layer error type is folded in via `#[from]`, per
/// spec §7's "one tagged sum for all".
#[derive(Debug, Error)]
pub enum Error {
    /// `Update::check` detected an ordering or duplication violation.
    #[error("invalid update: {0}")]
    InvalidUpdate(#[from] crate::update::CheckError),

    /// `Apply` was called with a block not greater than `last_applied_block`.
    #[error("stale block {block}: last applied block is {last_applied}")]
    StaleBlock { block: u64, last_applied: u64 },

    /// Backing-store or node-pool failure. Read errors surface immediately;
    /// `Apply` failures leave the engine in a non-writable state (spec §7
    /// "Propagation policy").
    #[error(transparent)]
    Io(#[from] MptError),

    /// An invariant was violated at runtime: wrong node variant, dangling
    /// reference, or a stored root hash that does not match a recomputed
    /// one. Always fatal; the engine must be closed and reopened through
    /// `Verify`/recovery.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// The requested `{Variant, Schema, Archive}` combination has no
    /// factory in this build.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// An optional API (`CreateSnapshot`, `Restore`, `GetProof`,
    /// `GetSnapshotVerifier`) with no implementation in this build.
    #[error("operation not supported by this configuration")]
    SnapshotNotSupported,

    /// `Verify` found a structural or hash mismatch.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Export/import stream was malformed, truncated, or of an unknown
    /// version.
    #[error("export/import failed: {0}")]
    StreamFailed(String),

    /// No archived root exists for the requested block.
    #[error("no archived state for block {0}")]
    ArchiveBlockNotFound(u64),

    /// The addressed account does not exist (used only where the caller
    /// asked for a non-defaulting lookup; most reads return a zero default
    /// instead, per spec §7).
    #[error("account {0} not found")]
    NotFound(Address),
}
