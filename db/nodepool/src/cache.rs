//! Bounded, pinning node cache shared by all four variant containers.
//!
//! Mirrors the eviction discipline of `rust_eth_triedb_pagedstore`'s page
//! pool (manual write-back-before-evict, since `schnellru::LruMap` gives no
//! eviction callback) plus pinning: a node with a non-zero pin count is
//! never chosen as an eviction victim, since an in-flight traversal still
//! holds a reference to it (spec §4.2).

use std::collections::HashMap;

use alloy_primitives::B256;
use rust_eth_triedb_common::NodeId;
use schnellru::{ByLength, LruMap};

use crate::node::Node;

pub(crate) struct CacheEntry {
    pub(crate) node: Node,
    pub(crate) dirty: bool,
    /// Memoized `(subtree hash, subtree RLP encoding)` (spec §4.4: "memoized
    /// per node, invalidated up the dirty path"). The RLP encoding is kept
    /// alongside the hash because a parent's encoding needs to know whether
    /// this child's encoding is shorter than 32 bytes (the inline-vs-hash
    /// rule), not just its hash. `None` until the hasher computes it;
    /// cleared whenever the node becomes dirty.
    pub(crate) memo: Option<(B256, Vec<u8>)>,
}

/// Hit/miss/eviction counters, exposed to the metrics layer above
/// (`triedb`'s `TrieDbMetrics`), mirroring `PathDB::cache_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub resident: usize,
    pub capacity: u32,
}

pub(crate) struct NodeCache {
    entries: LruMap<NodeId, CacheEntry, ByLength>,
    capacity: u32,
    pins: HashMap<NodeId, u32>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl NodeCache {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            entries: LruMap::new(ByLength::new(capacity.max(1))),
            capacity: capacity.max(1),
            pins: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub(crate) fn peek(&mut self, id: &NodeId) -> Option<&Node> {
        match self.entries.get(id) {
            Some(entry) => {
                self.hits += 1;
                Some(&entry.node)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub(crate) fn pin(&mut self, id: NodeId) {
        *self.pins.entry(id).or_insert(0) += 1;
    }

    pub(crate) fn unpin(&mut self, id: NodeId) {
        if let std::collections::hash_map::Entry::Occupied(mut e) = self.pins.entry(id) {
            *e.get_mut() -= 1;
            if *e.get() == 0 {
                e.remove();
            }
        }
    }

    fn is_pinned(&self, id: &NodeId) -> bool {
        self.pins.get(id).copied().unwrap_or(0) > 0
    }

    /// Inserts a freshly loaded or created node, evicting and returning a
    /// dirty victim to write back first if the cache is at capacity and an
    /// unpinned victim can be found.
    pub(crate) fn insert(&mut self, id: NodeId, node: Node, dirty: bool) -> Option<(NodeId, Node)> {
        let mut victim = None;
        if self.entries.len() as u32 >= self.capacity && self.entries.peek(&id).is_none() {
            // Bounded search for an unpinned LRU victim: at most one full
            // pass over the map, re-inserting pinned entries we pop past.
            let attempts = self.entries.len();
            let mut held = Vec::new();
            for _ in 0..attempts {
                match self.entries.pop_oldest() {
                    Some((oid, entry)) if self.is_pinned(&oid) => held.push((oid, entry)),
                    Some((oid, entry)) => {
                        if entry.dirty {
                            victim = Some((oid, entry.node));
                        }
                        self.evictions += 1;
                        break;
                    }
                    None => break,
                }
            }
            for (oid, entry) in held {
                self.entries.insert(oid, entry);
            }
        }
        self.entries.insert(id, CacheEntry { node, dirty, memo: None });
        victim
    }

    pub(crate) fn mark_dirty(&mut self, id: &NodeId) {
        if let Some(entry) = self.entries.get(id) {
            entry.dirty = true;
            entry.memo = None;
        }
    }

    /// Returns the memoized `(hash, rlp)` pair for `id`, if present and not dirty.
    pub(crate) fn cached_memo(&mut self, id: &NodeId) -> Option<(B256, Vec<u8>)> {
        self.entries.get(id).filter(|e| !e.dirty).and_then(|e| e.memo.clone())
    }

    /// Memoizes `(hash, rlp)` for `id`. A no-op if the entry went dirty in
    /// the meantime (lost the race with a concurrent mutation).
    pub(crate) fn set_cached_memo(&mut self, id: &NodeId, hash: B256, rlp: Vec<u8>) {
        if let Some(entry) = self.entries.get(id) {
            if !entry.dirty {
                entry.memo = Some((hash, rlp));
            }
        }
    }

    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<CacheEntry> {
        self.entries.remove(id)
    }

    /// Drains every dirty entry for write-back, clearing the dirty flag.
    pub(crate) fn drain_dirty(&mut self) -> Vec<(NodeId, Node)> {
        let mut out = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if entry.dirty {
                out.push((*id, entry.node.clone()));
                entry.dirty = false;
            }
        }
        out
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            resident: self.entries.len(),
            capacity: self.capacity,
        }
    }
}
