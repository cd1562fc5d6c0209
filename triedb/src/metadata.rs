//! The Live/Archive metadata record (spec §6 "a metadata file (version,
//! root `NodeId`, last-applied block)"): a tiny fixed-layout binary blob
//! persisted alongside the four node containers.

use std::fs;
use std::path::Path;

use rust_eth_triedb_nodepool::NodeId;

use crate::error::Error;

const METADATA_LEN: usize = 4 + 8 + 1 + 8;

/// One engine's persisted head: schema version, account-trie root, and the
/// last block successfully applied (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub schema: u32,
    pub root: NodeId,
    pub last_applied_block: Option<u64>,
}

impl Metadata {
    pub fn initial(schema: u32) -> Self {
        Self { schema, root: NodeId::EMPTY, last_applied_block: None }
    }

    pub fn encode(&self) -> [u8; METADATA_LEN] {
        let mut out = [0u8; METADATA_LEN];
        out[0..4].copy_from_slice(&self.schema.to_be_bytes());
        out[4..12].copy_from_slice(&self.root.to_raw().to_be_bytes());
        match self.last_applied_block {
            Some(block) => {
                out[12] = 1;
                out[13..21].copy_from_slice(&block.to_be_bytes());
            }
            None => out[12] = 0,
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != METADATA_LEN {
            return Err(Error::Corruption(format!(
                "metadata record is {} bytes, expected {METADATA_LEN}",
                bytes.len()
            )));
        }
        let schema = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let root = NodeId::from_raw(u64::from_be_bytes(bytes[4..12].try_into().unwrap()));
        let last_applied_block = match bytes[12] {
            0 => None,
            1 => Some(u64::from_be_bytes(bytes[13..21].try_into().unwrap())),
            other => return Err(Error::Corruption(format!("bad metadata presence flag {other}"))),
        };
        Ok(Self { schema, root, last_applied_block })
    }

    pub fn load(path: &Path) -> Result<Option<Self>, Error> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(Self::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Corruption(e.to_string())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.encode()).map_err(|e| Error::Corruption(e.to_string()))
    }
}
