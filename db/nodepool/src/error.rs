//! Errors raised by the typed node pool (spec §4.2 "Failure semantics").

use rust_eth_triedb_common::{NodeId, StorageError};
use thiserror::Error;

/// Errors raised by [`crate::NodePool`].
///
/// `Corruption` is fatal: per spec, the engine must refuse further writes
/// and expect the operator to run `Verify` after hitting one.
#[derive(Debug, Error)]
pub enum NodePoolError {
    /// A read or write against a variant's backing container failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A `NodeId`'s tag does not match the container it was read from.
    #[error("node {id} has the wrong variant for this container")]
    VariantMismatch { id: NodeId },

    /// A branch node had fewer than 2 non-empty children after loading —
    /// violates invariant 3 and can only mean on-disk corruption, since the
    /// mutation core never persists such a branch.
    #[error("branch node {id} has fewer than 2 non-empty children")]
    MalformedBranch { id: NodeId },

    /// `GetNode` was asked to resolve `NodeId::EMPTY`.
    #[error("cannot resolve the empty node id")]
    EmptyNodeId,
}

impl From<std::convert::Infallible> for NodePoolError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}
