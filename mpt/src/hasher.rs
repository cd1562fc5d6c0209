//! RLP encoding and Keccak hashing of trie subtrees (spec §4.4).
//!
//! Every node's `(hash, rlp)` pair is memoized in the node pool's cache
//! (`NodePool::cached_memo`/`set_cached_memo`) and invalidated whenever the
//! node is replaced, so a hash request after a handful of small mutations
//! only recomputes the path from the changed leaf to the root.

use alloy_primitives::{keccak256, B256};
use alloy_rlp::Encodable;
use rayon::prelude::*;
use rust_eth_triedb_common::{hex_to_compact, NodeId, RecordStore};
use rust_eth_triedb_nodepool::{Node, NodePool, NodePoolError};

use crate::error::MptError;

/// Encodes a child reference the way its parent embeds it: the raw RLP
/// bytes inline if shorter than 32 bytes, otherwise the 32-byte hash as an
/// RLP string (spec §4.4, "inline-vs-hash child rule").
fn child_ref(hash: &B256, rlp: &[u8], out: &mut Vec<u8>) {
    if rlp.len() < 32 {
        out.extend_from_slice(rlp);
    } else {
        hash.as_slice().encode(out);
    }
}

/// Returns the `(hash, rlp)` pair for the canonical empty subtree.
pub fn empty_hash() -> (B256, Vec<u8>) {
    (alloy_trie::EMPTY_ROOT_HASH, alloy_rlp::EMPTY_STRING_CODE.to_be_bytes().to_vec())
}

/// Computes (and memoizes) the `(hash, rlp)` pair for the subtree rooted at
/// `id`, recursing into children as needed. Pins each node it visits for the
/// duration of its own children's hashing, since a concurrent writer could
/// otherwise evict a node this traversal still needs (spec §4.2 pinning).
pub fn hash_node<R: RecordStore>(pool: &NodePool<R>, id: NodeId) -> Result<(B256, Vec<u8>), MptError>
where
    NodePoolError: From<R::Error>,
{
    if id.is_empty() {
        return Ok(empty_hash());
    }
    if let Some(memo) = pool.cached_memo(id) {
        return Ok(memo);
    }

    pool.pin(id);
    let result = hash_node_uncached(pool, id);
    pool.unpin(id);

    let (hash, rlp) = result?;
    pool.set_cached_memo(id, hash, rlp.clone());
    Ok((hash, rlp))
}

fn hash_node_uncached<R: RecordStore>(
    pool: &NodePool<R>,
    id: NodeId,
) -> Result<(B256, Vec<u8>), MptError>
where
    NodePoolError: From<R::Error>,
{
    let node = pool.get_node(id)?;
    let rlp = match node {
        Node::Branch(branch) => {
            // Independent subtrees: hash all 16 children concurrently rather
            // than walking them one at a time.
            let mut children_encoded: Vec<Vec<u8>> = branch
                .children
                .to_vec()
                .into_par_iter()
                .map(|child| {
                    let (child_hash, child_rlp) = hash_node(pool, child)?;
                    let mut buf = Vec::new();
                    child_ref(&child_hash, &child_rlp, &mut buf);
                    Ok(buf)
                })
                .collect::<Result<Vec<_>, MptError>>()?;
            // The 17th (value) slot of a branch is always empty: accounts
            // and storage values always terminate in a dedicated leaf node,
            // never at a branch itself (spec §3).
            children_encoded.push(vec![alloy_rlp::EMPTY_STRING_CODE]);
            encode_list(&children_encoded)
        }
        Node::Extension(ext) => {
            let (child_hash, child_rlp) = hash_node(pool, ext.child)?;
            let mut child_buf = Vec::new();
            child_ref(&child_hash, &child_rlp, &mut child_buf);
            let compact = hex_to_compact(&ext.path, false);
            encode_list(&[rlp_bytes(&compact), child_buf])
        }
        Node::Account(account) => {
            let (storage_hash, _) = hash_node(pool, account.storage_root)?;
            let account_rlp = crate::account::StateAccount {
                nonce: account.nonce,
                balance: account.balance,
                storage_root: storage_hash,
                code_hash: account.code_hash,
            }
            .to_rlp();
            let compact = hex_to_compact(&account.path, true);
            encode_list(&[rlp_bytes(&compact), rlp_bytes(&account_rlp)])
        }
        Node::Value(value) => {
            let compact = hex_to_compact(&value.path, true);
            let trimmed = strip_leading_zeros(value.value.as_slice());
            let value_rlp = alloy_rlp::encode(trimmed);
            encode_list(&[rlp_bytes(&compact), rlp_bytes(&value_rlp)])
        }
    };
    let hash = keccak256(&rlp);
    Ok((hash, rlp))
}

fn rlp_bytes(bytes: &[u8]) -> Vec<u8> {
    alloy_rlp::encode(bytes)
}

/// Drops leading zero bytes, the way a storage slot's 32-byte value is
/// encoded as the shortest big-endian representation of its integer
/// (spec §4.4). An all-zero value strips down to the empty slice.
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first_nonzero..]
}

/// Encodes a list of already-RLP-encoded items as an RLP list.
fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(|i| i.len()).sum();
    let mut out = Vec::with_capacity(payload_len + 4);
    alloy_rlp::Header { list: true, payload_length: payload_len }.encode(&mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_eth_triedb_memorydb::MemoryStore;
    use rust_eth_triedb_nodepool::{ValueNode, ACCOUNT_RECORD_LEN, BRANCH_RECORD_LEN, EXTENSION_RECORD_LEN, VALUE_RECORD_LEN};

    fn open_pool() -> NodePool<MemoryStore> {
        NodePool::open(
            MemoryStore::new(BRANCH_RECORD_LEN),
            MemoryStore::new(EXTENSION_RECORD_LEN),
            MemoryStore::new(ACCOUNT_RECORD_LEN),
            MemoryStore::new(VALUE_RECORD_LEN),
            1024,
        )
    }

    #[test]
    fn empty_root_matches_well_known_constant() {
        let (hash, _) = empty_hash();
        assert_eq!(hash, alloy_trie::EMPTY_ROOT_HASH);
    }

    #[test]
    fn single_value_leaf_hashes_deterministically() {
        let pool = open_pool();
        let path = vec![1u8; 64];
        let id = pool
            .create_node(Node::Value(ValueNode { path, value: alloy_primitives::B256::repeat_byte(7) }))
            .unwrap();
        let (hash1, rlp1) = hash_node(&pool, id).unwrap();
        let (hash2, rlp2) = hash_node(&pool, id).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(rlp1, rlp2);
    }

    #[test]
    fn memoized_hash_is_reused_until_dirtied() {
        let pool = open_pool();
        let path = vec![2u8; 64];
        let id = pool
            .create_node(Node::Value(ValueNode { path: path.clone(), value: B256::repeat_byte(1) }))
            .unwrap();
        let (first, _) = hash_node(&pool, id).unwrap();
        assert!(pool.cached_memo(id).is_some());

        pool.update_node(id, Node::Value(ValueNode { path, value: B256::repeat_byte(2) })).unwrap();
        assert!(pool.cached_memo(id).is_none());

        let (second, _) = hash_node(&pool, id).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn value_leaf_strips_leading_zero_bytes_before_rlp_encoding() {
        let pool = open_pool();
        let path = vec![3u8; 64];
        let mut value = [0u8; 32];
        value[31] = 1;
        let id = pool.create_node(Node::Value(ValueNode { path: path.clone(), value: B256::from(value) })).unwrap();
        let (_, rlp) = hash_node(&pool, id).unwrap();

        let compact = hex_to_compact(&path, true);
        let inner = alloy_rlp::encode([1u8].as_slice());
        let expected = encode_list(&[rlp_bytes(&compact), rlp_bytes(&inner)]);
        assert_eq!(rlp, expected);

        // A value stored unstripped (32 bytes) would hash differently.
        let unstripped = encode_list(&[rlp_bytes(&compact), rlp_bytes(&alloy_rlp::encode(value.as_slice()))]);
        assert_ne!(rlp, unstripped);
    }

    #[test]
    fn all_zero_value_strips_to_the_empty_string() {
        let pool = open_pool();
        let path = vec![4u8; 64];
        let id = pool.create_node(Node::Value(ValueNode { path: path.clone(), value: B256::ZERO })).unwrap();
        let (_, rlp) = hash_node(&pool, id).unwrap();

        let compact = hex_to_compact(&path, true);
        let inner = alloy_rlp::encode([].as_slice());
        let expected = encode_list(&[rlp_bytes(&compact), rlp_bytes(&inner)]);
        assert_eq!(rlp, expected);
    }

    #[test]
    fn account_leaf_wraps_the_account_rlp_as_an_rlp_string() {
        let pool = open_pool();
        let path = vec![5u8; 64];
        let account = crate::account::StateAccount {
            nonce: 10,
            balance: alloy_primitives::U256::from(12u64),
            storage_root: alloy_trie::EMPTY_ROOT_HASH,
            code_hash: alloy_trie::KECCAK_EMPTY,
        };
        let id = pool
            .create_node(Node::Account(rust_eth_triedb_nodepool::AccountNode {
                path: path.clone(),
                nonce: account.nonce,
                balance: account.balance,
                storage_root: NodeId::EMPTY,
                code_hash: account.code_hash,
            }))
            .unwrap();
        let (_, rlp) = hash_node(&pool, id).unwrap();

        let compact = hex_to_compact(&path, true);
        let account_rlp = account.to_rlp();
        let expected = encode_list(&[rlp_bytes(&compact), rlp_bytes(&account_rlp)]);
        assert_eq!(rlp, expected);

        // A leaf storing the bare (unwrapped) account list would hash differently.
        let unwrapped = encode_list(&[rlp_bytes(&compact), account_rlp]);
        assert_ne!(rlp, unwrapped);
    }
}
