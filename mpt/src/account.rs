//! State account structure and implementation.

use alloy_primitives::{keccak256, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};

/// Ethereum-compatible state account structure.
///
/// Encoded as an RLP list of four items, in order: nonce, balance,
/// storage root, code hash (spec §3 "RLP of account value"). Numeric items
/// with value 0 encode as the empty string, which `alloy-rlp`'s derive
/// already does for `u64`/`U256`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, RlpDecodable, RlpEncodable)]
pub struct StateAccount {
    /// Transactions sent (EOA) or contracts created (contract account).
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage sub-trie; `EMPTY_ROOT_HASH` when empty.
    pub storage_root: B256,
    /// Keccak-256 of the account's code; `KECCAK_EMPTY` for an EOA.
    pub code_hash: B256,
}

impl Default for StateAccount {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: alloy_trie::EMPTY_ROOT_HASH,
            code_hash: alloy_trie::KECCAK_EMPTY,
        }
    }
}

impl StateAccount {
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_storage_root(mut self, storage_root: B256) -> Self {
        self.storage_root = storage_root;
        self
    }

    pub fn with_code_hash(mut self, code_hash: B256) -> Self {
        self.code_hash = code_hash;
        self
    }

    /// Hash as committed to in the MPT, computed fresh (no memoization here;
    /// the node-level memoization lives in the hasher pipeline).
    pub fn trie_hash(&self) -> B256 {
        keccak256(self.to_rlp())
    }

    pub fn to_rlp(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    pub fn from_rlp(data: &[u8]) -> Result<Self, alloy_rlp::Error> {
        StateAccount::decode(&mut &*data)
    }
}
