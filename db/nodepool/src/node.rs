//! Node variant bodies and their fixed-size on-disk records.
//!
//! Each non-empty variant (spec: Branch/Extension/Account/Value) is encoded
//! into a flat, fixed-width byte record so it can live in a
//! [`rust_eth_triedb_pagedstore::PagedFileStore`]. Partial nibble paths
//! (Extension/Account/Value) share one packed encoding: a one-byte nibble
//! count followed by 32 bytes holding up to 64 packed nibbles.

use alloy_primitives::{B256, U256};
use rust_eth_triedb_common::NodeId;

/// Packed-nibble-path width: 1 length byte + 32 bytes of packed nibbles (up to 64).
pub const PATH_RECORD_LEN: usize = 33;

pub const BRANCH_RECORD_LEN: usize = 16 * 8;
pub const EXTENSION_RECORD_LEN: usize = PATH_RECORD_LEN + 8;
pub const ACCOUNT_RECORD_LEN: usize = PATH_RECORD_LEN + 8 + 32 + 8 + 32;
pub const VALUE_RECORD_LEN: usize = PATH_RECORD_LEN + 32;

/// Packs up to 64 nibbles into the fixed path record shape.
pub fn pack_path(nibbles: &[u8]) -> [u8; PATH_RECORD_LEN] {
    assert!(nibbles.len() <= 64, "path exceeds 64 nibbles");
    let mut out = [0u8; PATH_RECORD_LEN];
    out[0] = nibbles.len() as u8;
    for (i, chunk) in nibbles.chunks(2).enumerate() {
        let hi = chunk[0];
        let lo = chunk.get(1).copied().unwrap_or(0);
        out[1 + i] = (hi << 4) | lo;
    }
    out
}

/// Inverse of [`pack_path`].
pub fn unpack_path(record: &[u8]) -> Vec<u8> {
    let len = record[0] as usize;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let byte = record[1 + i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        out.push(nibble);
    }
    out
}

/// A 16-way branch node. The always-empty 17th (value) slot from the
/// hashing step (spec §3) is not stored; it is synthesized by the hasher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub children: [NodeId; 16],
}

impl BranchNode {
    pub fn empty() -> Self {
        Self { children: [NodeId::EMPTY; 16] }
    }

    /// Number of non-empty children, and the index of the single surviving
    /// one if exactly one remains (used by the collapse rules).
    pub fn non_empty_count(&self) -> usize {
        self.children.iter().filter(|c| !c.is_empty()).count()
    }

    pub fn sole_child(&self) -> Option<(u8, NodeId)> {
        let mut found = None;
        for (i, c) in self.children.iter().enumerate() {
            if !c.is_empty() {
                if found.is_some() {
                    return None;
                }
                found = Some((i as u8, *c));
            }
        }
        found
    }

    pub fn encode(&self) -> [u8; BRANCH_RECORD_LEN] {
        let mut out = [0u8; BRANCH_RECORD_LEN];
        for (i, c) in self.children.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&c.to_raw().to_le_bytes());
        }
        out
    }

    pub fn decode(record: &[u8]) -> Self {
        let mut children = [NodeId::EMPTY; 16];
        for i in 0..16 {
            let raw = u64::from_le_bytes(record[i * 8..i * 8 + 8].try_into().unwrap());
            children[i] = NodeId::from_raw(raw);
        }
        Self { children }
    }
}

/// A shared-nibble-path node pointing at a single child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNode {
    /// 1..=63 nibbles (spec invariant 2).
    pub path: Vec<u8>,
    pub child: NodeId,
}

impl ExtensionNode {
    pub fn encode(&self) -> [u8; EXTENSION_RECORD_LEN] {
        let mut out = [0u8; EXTENSION_RECORD_LEN];
        out[..PATH_RECORD_LEN].copy_from_slice(&pack_path(&self.path));
        out[PATH_RECORD_LEN..].copy_from_slice(&self.child.to_raw().to_le_bytes());
        out
    }

    pub fn decode(record: &[u8]) -> Self {
        let path = unpack_path(&record[..PATH_RECORD_LEN]);
        let raw = u64::from_le_bytes(record[PATH_RECORD_LEN..].try_into().unwrap());
        Self { path, child: NodeId::from_raw(raw) }
    }
}

/// An account leaf: remaining partial path plus the four-field account info
/// and the account's storage sub-trie root (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountNode {
    pub path: Vec<u8>,
    pub nonce: u64,
    pub balance: U256,
    /// Root of the account's storage sub-trie, `NodeId::EMPTY` if the
    /// account has no storage.
    pub storage_root: NodeId,
    pub code_hash: B256,
}

impl AccountNode {
    pub fn encode(&self) -> [u8; ACCOUNT_RECORD_LEN] {
        let mut out = [0u8; ACCOUNT_RECORD_LEN];
        let mut off = 0;
        out[off..off + PATH_RECORD_LEN].copy_from_slice(&pack_path(&self.path));
        off += PATH_RECORD_LEN;
        out[off..off + 8].copy_from_slice(&self.nonce.to_le_bytes());
        off += 8;
        out[off..off + 32].copy_from_slice(&self.balance.to_be_bytes::<32>());
        off += 32;
        out[off..off + 8].copy_from_slice(&self.storage_root.to_raw().to_le_bytes());
        off += 8;
        out[off..off + 32].copy_from_slice(self.code_hash.as_slice());
        out
    }

    pub fn decode(record: &[u8]) -> Self {
        let mut off = 0;
        let path = unpack_path(&record[off..off + PATH_RECORD_LEN]);
        off += PATH_RECORD_LEN;
        let nonce = u64::from_le_bytes(record[off..off + 8].try_into().unwrap());
        off += 8;
        let balance = U256::from_be_bytes::<32>(record[off..off + 32].try_into().unwrap());
        off += 32;
        let storage_root =
            NodeId::from_raw(u64::from_le_bytes(record[off..off + 8].try_into().unwrap()));
        off += 8;
        let code_hash = B256::from_slice(&record[off..off + 32]);
        Self { path, nonce, balance, storage_root, code_hash }
    }
}

/// A storage-value leaf: remaining partial path plus a 32-byte value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNode {
    pub path: Vec<u8>,
    pub value: B256,
}

impl ValueNode {
    pub fn encode(&self) -> [u8; VALUE_RECORD_LEN] {
        let mut out = [0u8; VALUE_RECORD_LEN];
        out[..PATH_RECORD_LEN].copy_from_slice(&pack_path(&self.path));
        out[PATH_RECORD_LEN..].copy_from_slice(self.value.as_slice());
        out
    }

    pub fn decode(record: &[u8]) -> Self {
        let path = unpack_path(&record[..PATH_RECORD_LEN]);
        let value = B256::from_slice(&record[PATH_RECORD_LEN..]);
        Self { path, value }
    }
}

/// An in-memory node body, tagged by variant, as kept in the node cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(BranchNode),
    Extension(ExtensionNode),
    Account(AccountNode),
    Value(ValueNode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trips_even_and_odd() {
        for nibbles in [vec![], vec![0xa], vec![1, 2, 3], (0..64).map(|n| (n % 16) as u8).collect()]
        {
            let packed = pack_path(&nibbles);
            assert_eq!(unpack_path(&packed), nibbles);
        }
    }

    #[test]
    fn branch_round_trips() {
        let mut b = BranchNode::empty();
        b.children[3] = NodeId::new(rust_eth_triedb_common::NodeVariantTag::Value, 7);
        let encoded = b.encode();
        assert_eq!(BranchNode::decode(&encoded), b);
    }

    #[test]
    fn branch_sole_child_detection() {
        let mut b = BranchNode::empty();
        assert_eq!(b.non_empty_count(), 0);
        assert_eq!(b.sole_child(), None);
        b.children[5] = NodeId::new(rust_eth_triedb_common::NodeVariantTag::Branch, 1);
        assert_eq!(b.sole_child(), Some((5, b.children[5])));
        b.children[1] = NodeId::new(rust_eth_triedb_common::NodeVariantTag::Branch, 2);
        assert_eq!(b.sole_child(), None);
    }

    #[test]
    fn account_round_trips() {
        let a = AccountNode {
            path: vec![1, 2, 3, 4],
            nonce: 42,
            balance: U256::from(1_000_000u64),
            storage_root: NodeId::EMPTY,
            code_hash: alloy_trie_empty_code_hash(),
        };
        let encoded = a.encode();
        assert_eq!(AccountNode::decode(&encoded), a);
    }

    fn alloy_trie_empty_code_hash() -> B256 {
        alloy_primitives::keccak256([])
    }
}
