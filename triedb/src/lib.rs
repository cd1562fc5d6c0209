//! Ethereum-compatible world-state storage engine: a typed node pool over
//! a paged file store, an MPT mutation/hashing core, Live and Archive
//! state, and a block-oriented `Apply` pipeline (spec §1).

pub mod archive;
pub mod codestore;
pub mod config;
pub mod error;
pub mod export;
pub mod live;
mod metadata;
pub mod metrics;
pub mod state;
pub mod update;

pub use archive::Archive;
pub use codestore::DiskCodeStore;
pub use config::{ArchiveMode, Config, AVG_NODE_SIZE_BYTES, SUPPORTED_SCHEMA};
pub use error::Error;
pub use export::{export, import, verify, VerifyReport, EXPORT_FORMAT_VERSION, EXPORT_MAGIC};
pub use live::{ArchiveState, Live};
pub use rust_eth_triedb_mpt::{CodeStore, MemoryCodeStore};
pub use state::State;
pub use update::{CheckError, DecodeError, Update, UPDATE_FORMAT_VERSION};

use std::io::{Read, Write};
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use rust_eth_triedb_nodepool::{
    ACCOUNT_RECORD_LEN, BRANCH_RECORD_LEN, EXTENSION_RECORD_LEN, VALUE_RECORD_LEN,
};
use rust_eth_triedb_pagedstore::{PagedFileStore, PagedStoreConfig};

use crate::metadata::Metadata;

/// The top-level engine: a `Live` state, an optional `Archive`, all backed
/// by on-disk [`PagedFileStore`] containers under `config.directory` (spec
/// §6 "On-disk layout").
pub struct TrieDb {
    config: Config,
    live: Live<PagedFileStore>,
}

impl TrieDb {
    /// Opens (creating if missing) the engine described by `config`,
    /// resuming from its persisted metadata if present.
    pub fn open(config: Config) -> Result<Self, Error> {
        if config.schema != SUPPORTED_SCHEMA {
            return Err(Error::UnsupportedConfiguration(format!(
                "schema {} has no factory in this build (only {SUPPORTED_SCHEMA})",
                config.schema
            )));
        }

        let live_dir = config.live_dir();
        std::fs::create_dir_all(&live_dir).map_err(|e| Error::Corruption(e.to_string()))?;
        let metadata_path = live_dir.join("metadata");
        let meta = Metadata::load(&metadata_path)?.unwrap_or_else(|| Metadata::initial(config.schema));

        let codes = Arc::new(
            DiskCodeStore::open(live_dir.join("codes")).map_err(|e| Error::Corruption(e.to_string()))?,
        );

        let archive = match config.archive {
            ArchiveMode::None => None,
            ArchiveMode::Mpt => {
                let archive_dir = config.archive_dir();
                std::fs::create_dir_all(&archive_dir).map_err(|e| Error::Corruption(e.to_string()))?;
                let [b, e, a, v] = config.archive_cache_split();
                Some(Archive::open(
                    open_container(&archive_dir, "nodes_branch", BRANCH_RECORD_LEN)?,
                    open_container(&archive_dir, "nodes_extension", EXTENSION_RECORD_LEN)?,
                    open_container(&archive_dir, "nodes_account", ACCOUNT_RECORD_LEN)?,
                    open_container(&archive_dir, "nodes_value", VALUE_RECORD_LEN)?,
                    b + e + a + v,
                ))
            }
        };

        let [b, e, a, v] = config.live_cache_split();
        let live = Live::resume(
            open_container(&live_dir, "nodes_branch", BRANCH_RECORD_LEN)?,
            open_container(&live_dir, "nodes_extension", EXTENSION_RECORD_LEN)?,
            open_container(&live_dir, "nodes_account", ACCOUNT_RECORD_LEN)?,
            open_container(&live_dir, "nodes_value", VALUE_RECORD_LEN)?,
            b + e + a + v,
            codes,
            archive,
            meta.root,
            meta.last_applied_block,
        );

        Ok(Self { config, live })
    }

    pub fn apply(&self, block: u64, update: &Update) -> Result<(), Error> {
        self.live.apply(block, update)
    }

    pub fn get_archive_state(&self, block: u64) -> Result<ArchiveState<'_, PagedFileStore>, Error> {
        self.live.get_archive_state(block)
    }

    /// Flushes the node pool(s) and persists the metadata record.
    pub fn flush(&self) -> Result<(), Error> {
        self.live.flush()?;
        let meta = Metadata {
            schema: self.config.schema,
            root: self.live.root_id(),
            last_applied_block: self.live.last_applied_block(),
        };
        meta.save(&self.config.live_dir().join("metadata"))
    }

    pub fn close(&self) -> Result<(), Error> {
        self.flush()?;
        self.live.close()
    }

    /// Streams a self-contained dump of the live state (spec §4.7 `Export`).
    pub fn export_live<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        export::export(
            self.live.pool(),
            self.live.codes().as_ref(),
            self.live.root_id(),
            self.config.schema,
            writer,
        )
    }

    /// Replaces the live trie with the contents of an export stream
    /// produced by [`Self::export_live`] (spec §4.7 `Import`). Intended for
    /// a freshly opened, empty engine.
    pub fn import_live<RD: Read>(&self, reader: &mut RD) -> Result<(), Error> {
        let root = export::import(self.live.pool(), self.live.codes().as_ref(), reader)?;
        self.live.set_root(root);
        Ok(())
    }

    /// Structurally verifies the live trie against its current root hash
    /// (spec §4.7 `Verify`).
    pub fn verify_live(&self) -> Result<VerifyReport, Error> {
        let expected = self.live.get_hash()?;
        export::verify(self.live.pool(), self.live.root_id(), expected, |_| {})
    }
}

impl State for TrieDb {
    fn exists(&self, address: &Address) -> Result<bool, Error> {
        self.live.exists(address)
    }

    fn get_balance(&self, address: &Address) -> Result<U256, Error> {
        self.live.get_balance(address)
    }

    fn get_nonce(&self, address: &Address) -> Result<u64, Error> {
        self.live.get_nonce(address)
    }

    fn get_storage(&self, address: &Address, key: &B256) -> Result<B256, Error> {
        self.live.get_storage(address, key)
    }

    fn get_code(&self, address: &Address) -> Result<Vec<u8>, Error> {
        self.live.get_code(address)
    }

    fn get_code_size(&self, address: &Address) -> Result<usize, Error> {
        self.live.get_code_size(address)
    }

    fn get_code_hash(&self, address: &Address) -> Result<B256, Error> {
        self.live.get_code_hash(address)
    }

    fn get_hash(&self) -> Result<B256, Error> {
        self.live.get_hash()
    }
}

fn open_container(dir: &std::path::Path, name: &str, record_len: usize) -> Result<PagedFileStore, Error> {
    PagedFileStore::open(dir.join(name), record_len, PagedStoreConfig::default())
        .map_err(|e| Error::Corruption(e.to_string()))
}
