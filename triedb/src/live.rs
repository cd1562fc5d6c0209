//! The Live engine: the current world state plus the `Apply` pipeline
//! (spec §4.3, §6).

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, B256, U256};
use rust_eth_triedb_mpt::{CodeStore, Trie};
use rust_eth_triedb_nodepool::{NodeId, NodePool, NodePoolError, RecordStore};
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::archive::Archive;
use crate::error::Error;
use crate::metrics::TrieDbMetrics;
use crate::state::State;
use crate::update::Update;

struct Head {
    root: NodeId,
    /// `None` means no block has been applied yet (the engine was just
    /// opened against an empty trie); the first `Apply` must use block 0
    /// (spec §4.3: "N > last_applied_block, or N == 0 at the initial
    /// state").
    last_applied_block: Option<u64>,
}

/// The current world state: a node pool, a code store, and the mutable
/// `(root, last_applied_block)` head the `Apply` pipeline advances.
pub struct Live<R: RecordStore> {
    pool: NodePool<R>,
    codes: Arc<dyn CodeStore>,
    head: RwLock<Head>,
    metrics: TrieDbMetrics,
    archive: Option<Archive<R>>,
}

impl<R: RecordStore> Live<R>
where
    NodePoolError: From<R::Error>,
{
    /// Opens a `Live` engine over four already-opened variant containers,
    /// an initially-empty trie, and an optional `Archive` collaborator.
    pub fn open(
        branches: R,
        extensions: R,
        accounts: R,
        values: R,
        cache_capacity: u32,
        codes: Arc<dyn CodeStore>,
        archive: Option<Archive<R>>,
    ) -> Self {
        Self {
            pool: NodePool::open(branches, extensions, accounts, values, cache_capacity),
            codes,
            head: RwLock::new(Head { root: NodeId::EMPTY, last_applied_block: None }),
            metrics: TrieDbMetrics::new_with_labels(&[("instance", "live")]),
            archive,
        }
    }

    /// Resumes a `Live` engine whose head was persisted at `root` /
    /// `last_applied_block` by a previous session's metadata record.
    pub fn resume(
        branches: R,
        extensions: R,
        accounts: R,
        values: R,
        cache_capacity: u32,
        codes: Arc<dyn CodeStore>,
        archive: Option<Archive<R>>,
        root: NodeId,
        last_applied_block: Option<u64>,
    ) -> Self {
        Self {
            pool: NodePool::open(branches, extensions, accounts, values, cache_capacity),
            codes,
            head: RwLock::new(Head { root, last_applied_block }),
            metrics: TrieDbMetrics::new_with_labels(&[("instance", "live")]),
            archive,
        }
    }

    fn trie(&self) -> Trie<'_, R> {
        Trie::new(&self.pool)
    }

    /// Current account-trie root `NodeId` (for metadata persistence).
    pub fn root_id(&self) -> NodeId {
        self.head.read().root
    }

    pub fn last_applied_block(&self) -> Option<u64> {
        self.head.read().last_applied_block
    }

    pub fn cache_stats(&self) -> rust_eth_triedb_nodepool::CacheStats {
        self.pool.cache_stats()
    }

    pub(crate) fn pool(&self) -> &NodePool<R> {
        &self.pool
    }

    pub(crate) fn codes(&self) -> &Arc<dyn CodeStore> {
        &self.codes
    }

    /// Overwrites the current root without touching `last_applied_block`,
    /// for use by `Import` (spec §4.7), which replaces the whole trie from
    /// an export stream rather than applying a block.
    pub(crate) fn set_root(&self, root: NodeId) {
        self.head.write().root = root;
    }

    /// Applies one block's mutation set (spec §4.3): validates `update`,
    /// checks block-number monotonicity, then mutates in the fixed order
    /// deletes -> creates -> balances -> nonces -> codes -> slots. On
    /// success the head advances and, if an `Archive` is configured, the
    /// resulting state is additionally snapshotted under `block`.
    #[instrument(skip(self, update), fields(block))]
    pub fn apply(&self, block: u64, update: &Update) -> Result<(), Error> {
        let started = Instant::now();
        update.check()?;

        let mut head = self.head.write();
        match head.last_applied_block {
            None if block != 0 => return Err(Error::StaleBlock { block, last_applied: 0 }),
            Some(prev) if block <= prev => return Err(Error::StaleBlock { block, last_applied: prev }),
            _ => {}
        }

        let trie = self.trie();
        let mut root = head.root;
        for address in &update.deleted_accounts {
            root = trie.delete_account(root, address)?;
        }
        for address in &update.created_accounts {
            root = trie.create_account(root, address)?;
        }
        for (address, balance) in &update.balances {
            root = trie.set_balance(root, address, *balance)?;
        }
        for (address, nonce) in &update.nonces {
            root = trie.set_nonce(root, address, *nonce)?;
        }
        for (address, code) in &update.codes {
            root = trie.set_code(root, address, code.clone(), self.codes.as_ref())?;
        }
        for (address, key, value) in &update.slots {
            root = trie.set_storage(root, address, key, *value)?;
        }

        head.root = root;
        head.last_applied_block = Some(block);

        if let Some(archive) = &self.archive {
            let state_hash = trie.hash(root)?;
            archive
                .snapshot(&self.pool, root, block, state_hash)
                .map_err(rust_eth_triedb_mpt::MptError::from)?;
        }

        self.metrics.record_apply_duration(started.elapsed().as_secs_f64());
        debug!(block, root = %root, "applied update");
        Ok(())
    }

    /// A read-only handle fixed at `block`'s historical state, if an
    /// `Archive` is configured and that block was recorded.
    pub fn get_archive_state(&self, block: u64) -> Result<ArchiveState<'_, R>, Error> {
        let archive = self.archive.as_ref().ok_or(Error::SnapshotNotSupported)?;
        let (root, hash) = archive.root_at(block).ok_or(Error::ArchiveBlockNotFound(block))?;
        Ok(ArchiveState { pool: archive.pool(), codes: self.codes.clone(), root, hash })
    }

    pub fn flush(&self) -> Result<(), Error> {
        let started = Instant::now();
        self.pool.flush().map_err(rust_eth_triedb_mpt::MptError::from)?;
        if let Some(archive) = &self.archive {
            archive.flush()?;
        }
        self.metrics.record_flush_duration(started.elapsed().as_secs_f64());
        self.metrics.record_cache_stats(self.pool.cache_stats());
        Ok(())
    }

    pub fn close(&self) -> Result<(), Error> {
        self.pool.close().map_err(rust_eth_triedb_mpt::MptError::from)?;
        if let Some(archive) = &self.archive {
            archive.close()?;
        }
        Ok(())
    }
}

impl<R: RecordStore> State for Live<R>
where
    NodePoolError: From<R::Error>,
{
    // Each reader holds `head`'s read guard for the duration of its own
    // trie traversal, not just long enough to copy out `root`. `apply`
    // mutates nodes in place and can reuse a released `NodeId`'s slot for
    // a different variant (`pool.rs`'s free list), so a traversal that
    // outlives the snapshot it read `root` under could walk into a slot
    // `apply` has since overwritten. Holding the guard across the whole
    // call makes `apply`'s write-lock acquisition wait for every
    // in-flight reader to finish, and vice versa (spec §5 thread safety).
    fn exists(&self, address: &Address) -> Result<bool, Error> {
        let head = self.head.read();
        Ok(self.trie().exists(head.root, address)?)
    }

    fn get_balance(&self, address: &Address) -> Result<U256, Error> {
        let head = self.head.read();
        Ok(self.trie().get_balance(head.root, address)?)
    }

    fn get_nonce(&self, address: &Address) -> Result<u64, Error> {
        let head = self.head.read();
        Ok(self.trie().get_nonce(head.root, address)?)
    }

    fn get_storage(&self, address: &Address, key: &B256) -> Result<B256, Error> {
        let head = self.head.read();
        Ok(self.trie().get_storage(head.root, address, key)?)
    }

    fn get_code(&self, address: &Address) -> Result<Vec<u8>, Error> {
        let hash = self.get_code_hash(address)?;
        Ok(self.codes.get(&hash).unwrap_or_default())
    }

    fn get_code_size(&self, address: &Address) -> Result<usize, Error> {
        Ok(self.get_code(address)?.len())
    }

    fn get_code_hash(&self, address: &Address) -> Result<B256, Error> {
        let head = self.head.read();
        Ok(self.trie().get_code_hash(head.root, address)?)
    }

    fn get_hash(&self) -> Result<B256, Error> {
        let started = Instant::now();
        let head = self.head.read();
        let hash = self.trie().hash(head.root)?;
        drop(head);
        self.metrics.record_hash_duration(started.elapsed().as_secs_f64());
        Ok(hash)
    }
}

/// A read-only handle onto one Archive-retained historical block. Returned
/// by [`Live::get_archive_state`]; carries no `Apply`/`Flush`/`Close` — spec
/// §6 scopes mutation and lifecycle to `Live` alone.
pub struct ArchiveState<'a, R: RecordStore> {
    pool: &'a NodePool<R>,
    codes: Arc<dyn CodeStore>,
    root: NodeId,
    hash: B256,
}

impl<'a, R: RecordStore> State for ArchiveState<'a, R>
where
    NodePoolError: From<R::Error>,
{
    fn exists(&self, address: &Address) -> Result<bool, Error> {
        Ok(Trie::new(self.pool).exists(self.root, address)?)
    }

    fn get_balance(&self, address: &Address) -> Result<U256, Error> {
        Ok(Trie::new(self.pool).get_balance(self.root, address)?)
    }

    fn get_nonce(&self, address: &Address) -> Result<u64, Error> {
        Ok(Trie::new(self.pool).get_nonce(self.root, address)?)
    }

    fn get_storage(&self, address: &Address, key: &B256) -> Result<B256, Error> {
        Ok(Trie::new(self.pool).get_storage(self.root, address, key)?)
    }

    fn get_code(&self, address: &Address) -> Result<Vec<u8>, Error> {
        let hash = self.get_code_hash(address)?;
        Ok(self.codes.get(&hash).unwrap_or_default())
    }

    fn get_code_size(&self, address: &Address) -> Result<usize, Error> {
        Ok(self.get_code(address)?.len())
    }

    fn get_code_hash(&self, address: &Address) -> Result<B256, Error> {
        Ok(Trie::new(self.pool).get_code_hash(self.root, address)?)
    }

    fn get_hash(&self) -> Result<B256, Error> {
        // Recorded at snapshot time rather than recomputed, fixing the
        // teacher's historic archive-state hash bug (always returning the
        // live trie's zero-initialized hash instead of the archived root's).
        Ok(self.hash)
    }
}
