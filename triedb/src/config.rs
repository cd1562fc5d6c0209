//! Engine configuration (spec §5 "Resource shares", §9 cache-capacity
//! resolution, §9 REDESIGN FLAGS "explicit, immutable configuration table").

use std::path::PathBuf;

/// Average resident size of one cached node, in bytes, used to convert a
/// byte budget into a node count (spec §9: "derive cache capacity from a
/// single documented function of bytes-per-node", replacing the historic
/// ad-hoc `/512` coefficient). Sized around the largest fixed record
/// (`ACCOUNT_RECORD_LEN`) plus the in-memory `Node` enum and cache
/// bookkeeping overhead.
pub const AVG_NODE_SIZE_BYTES: u64 = 256;

/// Which historical-state collaborator, if any, backs this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveMode {
    /// No historical state is retained; only the Live trie exists.
    #[default]
    None,
    /// An MPT-backed Archive records a root per applied block (spec §4.6).
    Mpt,
}

/// Schema selector. This build ships exactly one concrete strategy (spec
/// §9: "model the State contract as a capability set; implement the
/// MPT-schema-5 variant as the one required concrete strategy").
pub const SUPPORTED_SCHEMA: u32 = 5;

/// Engine configuration, constructed directly by the embedding application
/// (spec §9 REDESIGN FLAGS: no dynamic registry, no env/file parsing).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; `live/` and, if `archive != None`, `archive/` are
    /// created beneath it (spec §6 "On-disk layout").
    pub directory: PathBuf,
    /// Approximate RAM cap for the Live node cache, in bytes.
    pub live_cache_bytes: u64,
    /// Approximate RAM cap for the Archive node cache, in bytes. Ignored
    /// when `archive == ArchiveMode::None`.
    pub archive_cache_bytes: u64,
    /// `0` disables periodic background flushing.
    pub background_flush_period_ms: u64,
    /// Which historical-state collaborator to enable.
    pub archive: ArchiveMode,
    /// Schema selector; only [`SUPPORTED_SCHEMA`] has a factory in this
    /// build (spec §7 `UnsupportedConfiguration`).
    pub schema: u32,
}

impl Config {
    /// A configuration rooted at `directory` with reasonable defaults and
    /// no Archive.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            live_cache_bytes: 256 * 1024 * 1024,
            archive_cache_bytes: 64 * 1024 * 1024,
            background_flush_period_ms: 0,
            archive: ArchiveMode::None,
            schema: SUPPORTED_SCHEMA,
        }
    }

    pub fn with_archive(mut self, archive: ArchiveMode) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_live_cache_bytes(mut self, bytes: u64) -> Self {
        self.live_cache_bytes = bytes;
        self
    }

    pub fn with_archive_cache_bytes(mut self, bytes: u64) -> Self {
        self.archive_cache_bytes = bytes;
        self
    }

    /// Live node-cache capacity, in nodes, split across the four variants.
    pub fn live_cache_split(&self) -> [u32; 4] {
        rust_eth_triedb_nodepool::split_cache_capacity(self.node_count(self.live_cache_bytes))
    }

    /// Archive node-cache capacity, in nodes, split across the four variants.
    pub fn archive_cache_split(&self) -> [u32; 4] {
        rust_eth_triedb_nodepool::split_cache_capacity(self.node_count(self.archive_cache_bytes))
    }

    fn node_count(&self, bytes: u64) -> u32 {
        (bytes / AVG_NODE_SIZE_BYTES).min(u32::MAX as u64) as u32
    }

    pub fn live_dir(&self) -> PathBuf {
        self.directory.join("live")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.directory.join("archive")
    }
}
