//! Ethereum-compatible modified hexary Merkle-Patricia trie mutation core
//! and hashing pipeline, built over a typed [`rust_eth_triedb_nodepool`].

mod account;
mod code;
mod error;
mod hasher;
mod trie;

pub use account::StateAccount;
pub use code::{CodeStore, MemoryCodeStore};
pub use error::MptError;
pub use hasher::{empty_hash, hash_node};
pub use trie::Trie;
