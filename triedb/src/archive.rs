//! The Archive collaborator (spec §4.6): a block-indexed table of past
//! state roots, each backed by its own full copy of the reachable node
//! graph in an archive-private [`NodePool`].
//!
//! The Live engine's mutation core (`rust_eth_triedb_mpt::Trie`) updates
//! nodes in place via `NodePool::update_node` whenever a variant is
//! unchanged across a mutation (spec §4.2's allocation economy), which
//! means a `NodeId` does not carry its full history: once Live moves past a
//! block, the old version of a mutated node is gone from Live's own pool.
//! To give `GetArchiveState` a stable historical view this module keeps a
//! structurally independent snapshot per retained block rather than trying
//! to thread copy-on-write semantics through the shared mutation core. The
//! cost is a full depth-first copy of the live state graph per retained
//! block; callers that enable `ArchiveMode::Mpt` are choosing that cost in
//! exchange for a mutation core simple enough to share between Live and
//! Archive unchanged.

use std::collections::BTreeMap;

use alloy_primitives::B256;
use parking_lot::RwLock;
use rust_eth_triedb_nodepool::{AccountNode, BranchNode, Node, NodeId, NodePool, NodePoolError, RecordStore};

use crate::error::Error;

/// One retained historical root: the block it was recorded at, the root's
/// id within this archive's own pool, and the root's state hash (so
/// `ArchiveState::get_hash` never needs to recompute it).
#[derive(Debug, Clone, Copy)]
struct Entry {
    root: NodeId,
    hash: B256,
}

/// Archive-private node pool plus a block-indexed root table.
pub struct Archive<R: RecordStore> {
    pool: NodePool<R>,
    roots: RwLock<BTreeMap<u64, Entry>>,
}

impl<R: RecordStore> Archive<R>
where
    NodePoolError: From<R::Error>,
{
    pub fn open(branches: R, extensions: R, accounts: R, values: R, cache_capacity: u32) -> Self {
        Self {
            pool: NodePool::open(branches, extensions, accounts, values, cache_capacity),
            roots: RwLock::new(BTreeMap::new()),
        }
    }

    /// Copies the subtree reachable from `live_root` (read through
    /// `live_pool`) into this archive's own pool and records it as the
    /// state at `block`, alongside its already-known `state_hash`.
    pub(crate) fn snapshot(
        &self,
        live_pool: &NodePool<R>,
        live_root: NodeId,
        block: u64,
        state_hash: B256,
    ) -> Result<(), NodePoolError> {
        let archived_root = copy_subtree(live_pool, &self.pool, live_root)?;
        self.roots.write().insert(block, Entry { root: archived_root, hash: state_hash });
        Ok(())
    }

    pub(crate) fn root_at(&self, block: u64) -> Option<(NodeId, B256)> {
        self.roots.read().get(&block).map(|e| (e.root, e.hash))
    }

    pub(crate) fn pool(&self) -> &NodePool<R> {
        &self.pool
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.pool.flush().map_err(rust_eth_triedb_mpt::MptError::from)?;
        Ok(())
    }

    pub fn close(&self) -> Result<(), Error> {
        self.pool.close().map_err(rust_eth_triedb_mpt::MptError::from)?;
        Ok(())
    }
}

/// Recursively copies the node at `id` (and everything it reaches,
/// including nested storage sub-tries) from `src` into `dst`, returning the
/// id it was assigned in `dst`. Post-order: children are copied (and thus
/// assigned their new ids) before the parent that references them.
fn copy_subtree<R: RecordStore>(
    src: &NodePool<R>,
    dst: &NodePool<R>,
    id: NodeId,
) -> Result<NodeId, NodePoolError>
where
    NodePoolError: From<R::Error>,
{
    if id.is_empty() {
        return Ok(NodeId::EMPTY);
    }
    match src.get_node(id)? {
        Node::Branch(b) => {
            let mut copy = BranchNode::empty();
            for (i, child) in b.children.into_iter().enumerate() {
                copy.children[i] = copy_subtree(src, dst, child)?;
            }
            dst.create_node(Node::Branch(copy))
        }
        Node::Extension(e) => {
            let child = copy_subtree(src, dst, e.child)?;
            dst.create_node(Node::Extension(rust_eth_triedb_nodepool::ExtensionNode { path: e.path, child }))
        }
        Node::Account(a) => {
            let storage_root = copy_subtree(src, dst, a.storage_root)?;
            dst.create_node(Node::Account(AccountNode { storage_root, ..a }))
        }
        Node::Value(v) => dst.create_node(Node::Value(v)),
    }
}
