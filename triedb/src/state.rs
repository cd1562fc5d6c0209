//! The `State` contract (spec §6 "External Interfaces"): the object-safe
//! read surface shared by `Live` and any historical handle returned by
//! `GetArchiveState`. Mutation (`Apply`) and lifecycle (`Flush`/`Close`)
//! are deliberately NOT part of this trait — see `live.rs` — so that a
//! `Box<dyn State>` can never be asked to apply a block or be closed out
//! from under its owner (spec §9 REDESIGN FLAGS).

use alloy_primitives::{Address, B256, U256};

use crate::error::Error;

/// Read-only view of one world state: the Live trie's current head, or one
/// Archive handle fixed at a past block.
pub trait State: Send + Sync {
    /// Whether `address` has an account leaf.
    fn exists(&self, address: &Address) -> Result<bool, Error>;

    /// `0` for an absent account (spec §7: zero default on "absent" paths).
    fn get_balance(&self, address: &Address) -> Result<U256, Error>;

    /// `0` for an absent account.
    fn get_nonce(&self, address: &Address) -> Result<u64, Error>;

    /// `B256::ZERO` for an absent account or unset slot.
    fn get_storage(&self, address: &Address, key: &B256) -> Result<B256, Error>;

    /// Empty `Vec` for an absent account or one with no code.
    fn get_code(&self, address: &Address) -> Result<Vec<u8>, Error>;

    /// `0` for an absent account or one with no code.
    fn get_code_size(&self, address: &Address) -> Result<usize, Error>;

    /// `Keccak("")` for an absent account or one with no code.
    fn get_code_hash(&self, address: &Address) -> Result<B256, Error>;

    /// The state root: `Keccak(RLP(""))` over an empty trie.
    fn get_hash(&self) -> Result<B256, Error>;

    /// Not implemented by any variant in this build.
    fn create_snapshot(&self) -> Result<(), Error> {
        Err(Error::SnapshotNotSupported)
    }

    /// Not implemented by any variant in this build.
    fn restore(&self, _snapshot: &[u8]) -> Result<(), Error> {
        Err(Error::SnapshotNotSupported)
    }

    /// Not implemented by any variant in this build.
    fn get_proof(&self, _address: &Address) -> Result<Vec<Vec<u8>>, Error> {
        Err(Error::SnapshotNotSupported)
    }

    /// Not implemented by any variant in this build.
    fn get_snapshot_verifier(&self) -> Result<(), Error> {
        Err(Error::SnapshotNotSupported)
    }
}
