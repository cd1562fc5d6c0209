//! The typed node pool: four variant containers plus a shared bounded cache.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{error, trace};

use rust_eth_triedb_common::{NodeId, NodeVariantTag, RecordStore};

use crate::cache::{CacheStats, NodeCache};
use crate::error::NodePoolError;
use crate::node::{AccountNode, BranchNode, ExtensionNode, Node, ValueNode};

/// Fixed weights used to split a total node-cache budget across variants
/// (spec.md §9 open-question resolution: one documented split, not an
/// ad-hoc per-component coefficient).
pub const BRANCH_CACHE_WEIGHT: f64 = 0.45;
pub const EXTENSION_CACHE_WEIGHT: f64 = 0.15;
pub const ACCOUNT_CACHE_WEIGHT: f64 = 0.25;
pub const VALUE_CACHE_WEIGHT: f64 = 0.15;

struct Container<R: RecordStore> {
    store: R,
    next_index: AtomicU32,
    free_list: Mutex<Vec<u32>>,
}

impl<R: RecordStore> Container<R>
where
    NodePoolError: From<R::Error>,
{
    fn open(store: R) -> Self {
        let next_index = store.size();
        Self { store, next_index: AtomicU32::new(next_index), free_list: Mutex::new(Vec::new()) }
    }

    fn alloc(&self) -> u32 {
        if let Some(index) = self.free_list.lock().pop() {
            return index;
        }
        self.next_index.fetch_add(1, Ordering::Relaxed)
    }

    fn release(&self, index: u32) {
        self.free_list.lock().push(index);
    }

    fn get(&self, index: u32) -> Result<Vec<u8>, NodePoolError> {
        Ok(self.store.get(index)?)
    }

    fn set(&self, index: u32, record: &[u8]) -> Result<(), NodePoolError> {
        Ok(self.store.set(index, record)?)
    }

    fn flush(&self) -> Result<(), NodePoolError> {
        Ok(self.store.flush()?)
    }

    fn close(&self) -> Result<(), NodePoolError> {
        Ok(self.store.close()?)
    }
}

/// Four independent paged containers (one per non-Empty variant) plus a
/// unified, bounded, pinning node cache (spec §4.2).
pub struct NodePool<R: RecordStore> {
    branches: Container<R>,
    extensions: Container<R>,
    accounts: Container<R>,
    values: Container<R>,
    cache: Mutex<NodeCache>,
}

impl<R: RecordStore> NodePool<R>
where
    NodePoolError: From<R::Error>,
{
    /// Opens a node pool over four already-opened per-variant containers,
    /// with `cache_capacity` total nodes split across variants by the
    /// documented weights.
    pub fn open(branches: R, extensions: R, accounts: R, values: R, cache_capacity: u32) -> Self {
        trace!(target: "nodepool", cache_capacity, "opening typed node pool");
        Self {
            branches: Container::open(branches),
            extensions: Container::open(extensions),
            accounts: Container::open(accounts),
            values: Container::open(values),
            cache: Mutex::new(NodeCache::new(cache_capacity)),
        }
    }

    fn container(&self, tag: NodeVariantTag) -> &Container<R> {
        match tag {
            NodeVariantTag::Branch => &self.branches,
            NodeVariantTag::Extension => &self.extensions,
            NodeVariantTag::Account => &self.accounts,
            NodeVariantTag::Value => &self.values,
            NodeVariantTag::Empty => unreachable!("Empty has no backing container"),
        }
    }

    fn decode(tag: NodeVariantTag, record: &[u8]) -> Node {
        match tag {
            NodeVariantTag::Branch => Node::Branch(BranchNode::decode(record)),
            NodeVariantTag::Extension => Node::Extension(ExtensionNode::decode(record)),
            NodeVariantTag::Account => Node::Account(AccountNode::decode(record)),
            NodeVariantTag::Value => Node::Value(ValueNode::decode(record)),
            NodeVariantTag::Empty => unreachable!(),
        }
    }

    fn encode(node: &Node) -> Vec<u8> {
        match node {
            Node::Branch(n) => n.encode().to_vec(),
            Node::Extension(n) => n.encode().to_vec(),
            Node::Account(n) => n.encode().to_vec(),
            Node::Value(n) => n.encode().to_vec(),
        }
    }

    fn write_back(&self, id: NodeId, node: &Node) -> Result<(), NodePoolError> {
        let record = Self::encode(node);
        self.container(id.variant()).set(id.index() as u32, &record)
    }

    /// Reads a node, going through the cache. Loads from the backing
    /// container on a miss.
    pub fn get_node(&self, id: NodeId) -> Result<Node, NodePoolError> {
        if id.is_empty() {
            return Err(NodePoolError::EmptyNodeId);
        }
        {
            let mut cache = self.cache.lock();
            if let Some(node) = cache.peek(&id) {
                return Ok(node.clone());
            }
        }
        let record = self.container(id.variant()).get(id.index() as u32)?;
        let node = Self::decode(id.variant(), &record);
        if let Node::Branch(b) = &node {
            if b.non_empty_count() < 2 {
                error!(target: "nodepool", %id, "malformed branch on load");
                return Err(NodePoolError::MalformedBranch { id });
            }
        }
        self.admit(id, node.clone(), false)?;
        Ok(node)
    }

    /// Allocates a new node of the given variant, admitting it into the
    /// cache dirty (not yet persisted).
    pub fn create_node(&self, node: Node) -> Result<NodeId, NodePoolError> {
        let tag = match &node {
            Node::Branch(_) => NodeVariantTag::Branch,
            Node::Extension(_) => NodeVariantTag::Extension,
            Node::Account(_) => NodeVariantTag::Account,
            Node::Value(_) => NodeVariantTag::Value,
        };
        let index = self.container(tag).alloc();
        let id = NodeId::new(tag, index as u64);
        self.admit(id, node, true)?;
        Ok(id)
    }

    /// Replaces the node at `id` (spec's `Update(id, mutator)`, phrased as a
    /// direct replacement since nodes here are immutable values) and marks
    /// it dirty.
    pub fn update_node(&self, id: NodeId, node: Node) -> Result<(), NodePoolError> {
        self.admit(id, node, true)
    }

    fn admit(&self, id: NodeId, node: Node, dirty: bool) -> Result<(), NodePoolError> {
        let victim = self.cache.lock().insert(id, node, dirty);
        if let Some((victim_id, victim_node)) = victim {
            self.write_back(victim_id, &victim_node)?;
        }
        Ok(())
    }

    /// Pins `id` against eviction for the duration of an in-flight
    /// traversal. Must be paired with [`Self::unpin`].
    pub fn pin(&self, id: NodeId) {
        if !id.is_empty() {
            self.cache.lock().pin(id);
        }
    }

    /// Releases a pin taken by [`Self::pin`].
    pub fn unpin(&self, id: NodeId) {
        if !id.is_empty() {
            self.cache.lock().unpin(id);
        }
    }

    /// Frees `id`'s index for reuse. Caller guarantees no reachable root
    /// references it any longer.
    pub fn release(&self, id: NodeId) {
        if id.is_empty() {
            return;
        }
        self.cache.lock().remove(&id);
        self.container(id.variant()).release(id.index() as u32);
    }

    /// Writes every dirty cache entry back to its container, then flushes
    /// all four containers.
    pub fn flush(&self) -> Result<(), NodePoolError> {
        let dirty = self.cache.lock().drain_dirty();
        for (id, node) in &dirty {
            self.write_back(*id, node)?;
        }
        self.branches.flush()?;
        self.extensions.flush()?;
        self.accounts.flush()?;
        self.values.flush()?;
        Ok(())
    }

    /// Flushes, then releases the backing containers.
    pub fn close(&self) -> Result<(), NodePoolError> {
        self.flush()?;
        self.branches.close()?;
        self.extensions.close()?;
        self.accounts.close()?;
        self.values.close()?;
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Returns the memoized `(hash, rlp encoding)` for `id`, if the hasher
    /// previously computed one and no mutation has invalidated it since.
    pub fn cached_memo(&self, id: NodeId) -> Option<(alloy_primitives::B256, Vec<u8>)> {
        self.cache.lock().cached_memo(&id)
    }

    /// Memoizes the subtree `(hash, rlp encoding)` for `id`.
    pub fn set_cached_memo(&self, id: NodeId, hash: alloy_primitives::B256, rlp: Vec<u8>) {
        self.cache.lock().set_cached_memo(&id, hash, rlp);
    }
}

/// Splits a total node-cache budget across the four variants by the
/// documented fixed weights.
pub fn split_cache_capacity(total_nodes: u32) -> [u32; 4] {
    let total = total_nodes as f64;
    [
        (total * BRANCH_CACHE_WEIGHT) as u32,
        (total * EXTENSION_CACHE_WEIGHT) as u32,
        (total * ACCOUNT_CACHE_WEIGHT) as u32,
        (total * VALUE_CACHE_WEIGHT) as u32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_eth_triedb_memorydb::MemoryStore;

    fn open_pool() -> NodePool<MemoryStore> {
        NodePool::open(
            MemoryStore::new(crate::node::BRANCH_RECORD_LEN),
            MemoryStore::new(crate::node::EXTENSION_RECORD_LEN),
            MemoryStore::new(crate::node::ACCOUNT_RECORD_LEN),
            MemoryStore::new(crate::node::VALUE_RECORD_LEN),
            1024,
        )
    }

    #[test]
    fn create_then_get_round_trips() {
        let pool = open_pool();
        let value = Node::Value(ValueNode { path: vec![1, 2, 3], value: Default::default() });
        let id = pool.create_node(value.clone()).unwrap();
        assert_eq!(pool.get_node(id).unwrap(), value);
    }

    #[test]
    fn update_replaces_and_marks_dirty() {
        let pool = open_pool();
        let id = pool
            .create_node(Node::Value(ValueNode { path: vec![1], value: Default::default() }))
            .unwrap();
        let updated = Node::Value(ValueNode { path: vec![1, 2], value: Default::default() });
        pool.update_node(id, updated.clone()).unwrap();
        assert_eq!(pool.get_node(id).unwrap(), updated);
    }

    #[test]
    fn flush_persists_dirty_entries() {
        let pool = open_pool();
        let id = pool
            .create_node(Node::Branch(BranchNode::empty()))
            .unwrap();
        pool.flush().unwrap();
        // A second pool instance would see the flushed record; here we
        // simply confirm flush doesn't error and the node is still readable.
        assert_eq!(pool.get_node(id).unwrap(), Node::Branch(BranchNode::empty()));
    }

    #[test]
    fn release_frees_index_for_reuse() {
        let pool = open_pool();
        let id = pool
            .create_node(Node::Value(ValueNode { path: vec![1], value: Default::default() }))
            .unwrap();
        pool.release(id);
        let id2 = pool
            .create_node(Node::Value(ValueNode { path: vec![2], value: Default::default() }))
            .unwrap();
        assert_eq!(id.index(), id2.index());
    }

    #[test]
    fn cache_split_matches_weights() {
        let split = split_cache_capacity(1000);
        assert_eq!(split, [450, 150, 250, 150]);
    }
}
