//! The MPT mutation core: traversal, insertion with split, deletion with
//! collapse, and the account-level mutator/reader primitives (spec §4.3).
//!
//! A single [`NodePool`] backs both the account trie and every account's
//! storage sub-trie; each is addressed independently by its own root
//! [`NodeId`], which callers thread through (`triedb`'s `Live`/`Archive`
//! layers own the account root; an account's storage root lives inside its
//! `AccountNode`).

use alloy_primitives::{Address, B256, U256};
use rust_eth_triedb_common::{common_prefix_len, secure_path, NodeId, RecordStore};
use rust_eth_triedb_nodepool::{
    AccountNode, BranchNode, ExtensionNode, Node, NodePool, NodePoolError, ValueNode,
};

use crate::error::MptError;

/// Borrows a node pool to perform trie mutations and lookups. Cheap to
/// construct; carries no state of its own beyond the pool reference.
pub struct Trie<'a, R: RecordStore> {
    pool: &'a NodePool<R>,
}

impl<'a, R: RecordStore> Trie<'a, R>
where
    NodePoolError: From<R::Error>,
{
    pub fn new(pool: &'a NodePool<R>) -> Self {
        Self { pool }
    }

    /// Root hash of the subtree at `root` (empty trie hashes to
    /// `Keccak(RLP(""))`, spec invariant 3).
    pub fn hash(&self, root: NodeId) -> Result<B256, MptError> {
        Ok(crate::hasher::hash_node(self.pool, root)?.0)
    }

    // ---------------------------------------------------------------
    // Generic traversal, shared by the account trie and storage tries.
    // ---------------------------------------------------------------

    fn lookup(&self, root: NodeId, path: &[u8]) -> Result<Option<Node>, MptError> {
        let mut current = root;
        let mut remaining = path;
        loop {
            if current.is_empty() {
                return Ok(None);
            }
            let node = self.pool.get_node(current)?;
            match &node {
                Node::Branch(b) => {
                    if remaining.is_empty() {
                        return Ok(None);
                    }
                    current = b.children[remaining[0] as usize];
                    remaining = &remaining[1..];
                }
                Node::Extension(e) => {
                    if !remaining.starts_with(e.path.as_slice()) {
                        return Ok(None);
                    }
                    remaining = &remaining[e.path.len()..];
                    current = e.child;
                }
                Node::Account(a) => return Ok((remaining == a.path.as_slice()).then_some(node)),
                Node::Value(v) => return Ok((remaining == v.path.as_slice()).then_some(node)),
            }
        }
    }

    /// Inserts (or replaces) the leaf at `path`, splitting branches/extensions
    /// as needed. `make_leaf` builds the leaf `Node` from its final partial
    /// path; it is invoked exactly once, at the point the leaf lands.
    fn insert(
        &self,
        root: NodeId,
        path: &[u8],
        make_leaf: &dyn Fn(&[u8]) -> Node,
    ) -> Result<NodeId, MptError> {
        if root.is_empty() {
            return Ok(self.pool.create_node(make_leaf(path))?);
        }

        let node = self.pool.get_node(root)?;
        match node {
            Node::Branch(mut b) => {
                let n = path[0] as usize;
                let new_child = self.insert(b.children[n], &path[1..], make_leaf)?;
                if new_child != b.children[n] {
                    b.children[n] = new_child;
                    self.pool.update_node(root, Node::Branch(b))?;
                }
                Ok(root)
            }
            Node::Extension(mut e) => {
                let cp = common_prefix_len(&e.path, path);
                if cp == e.path.len() {
                    let new_child = self.insert(e.child, &path[cp..], make_leaf)?;
                    if new_child != e.child {
                        e.child = new_child;
                        self.pool.update_node(root, Node::Extension(e))?;
                    }
                    return Ok(root);
                }

                let old_idx = e.path[cp];
                let old_tail = e.path[cp + 1..].to_vec();
                let old_branch_child = if old_tail.is_empty() {
                    e.child
                } else {
                    self.pool
                        .create_node(Node::Extension(ExtensionNode { path: old_tail, child: e.child }))?
                };

                let new_idx = path[cp];
                let new_leaf_id = self.pool.create_node(make_leaf(&path[cp + 1..]))?;

                let mut branch = BranchNode::empty();
                branch.children[old_idx as usize] = old_branch_child;
                branch.children[new_idx as usize] = new_leaf_id;
                let branch_id = self.pool.create_node(Node::Branch(branch))?;
                self.pool.release(root);

                if cp == 0 {
                    Ok(branch_id)
                } else {
                    let shared = e.path[..cp].to_vec();
                    Ok(self
                        .pool
                        .create_node(Node::Extension(ExtensionNode { path: shared, child: branch_id }))?)
                }
            }
            Node::Account(a) => {
                if path == a.path.as_slice() {
                    self.pool.update_node(root, make_leaf(path))?;
                    return Ok(root);
                }
                let cp = common_prefix_len(&a.path, path);
                let old_idx = a.path[cp];
                let old_tail = a.path[cp + 1..].to_vec();
                self.pool.update_node(root, Node::Account(AccountNode { path: old_tail, ..a }))?;
                self.split_leaf(root, old_idx, cp, path, make_leaf)
            }
            Node::Value(v) => {
                if path == v.path.as_slice() {
                    self.pool.update_node(root, make_leaf(path))?;
                    return Ok(root);
                }
                let cp = common_prefix_len(&v.path, path);
                let old_idx = v.path[cp];
                let old_tail = v.path[cp + 1..].to_vec();
                self.pool.update_node(root, Node::Value(ValueNode { path: old_tail, ..v }))?;
                self.split_leaf(root, old_idx, cp, path, make_leaf)
            }
        }
    }

    /// Finishes a leaf/leaf split: `old_id` already holds the existing
    /// leaf shortened to its tail past the shared prefix; builds the new
    /// leaf, wraps both in a branch, and prepends a shared-prefix extension
    /// if `cp > 0`.
    fn split_leaf(
        &self,
        old_id: NodeId,
        old_idx: u8,
        cp: usize,
        path: &[u8],
        make_leaf: &dyn Fn(&[u8]) -> Node,
    ) -> Result<NodeId, MptError> {
        let new_idx = path[cp];
        let new_leaf_id = self.pool.create_node(make_leaf(&path[cp + 1..]))?;

        let mut branch = BranchNode::empty();
        branch.children[old_idx as usize] = old_id;
        branch.children[new_idx as usize] = new_leaf_id;
        let branch_id = self.pool.create_node(Node::Branch(branch))?;

        if cp == 0 {
            Ok(branch_id)
        } else {
            let shared = path[..cp].to_vec();
            Ok(self.pool.create_node(Node::Extension(ExtensionNode { path: shared, child: branch_id }))?)
        }
    }

    /// Deletes the leaf at `path` if present, collapsing branches/extensions
    /// per spec invariant 4. A no-op (returns `root` unchanged) if `path`
    /// is not present.
    fn delete(&self, root: NodeId, path: &[u8]) -> Result<NodeId, MptError> {
        if root.is_empty() {
            return Ok(root);
        }
        let node = self.pool.get_node(root)?;
        match node {
            Node::Branch(mut b) => {
                let n = path[0] as usize;
                let child = b.children[n];
                let new_child = self.delete(child, &path[1..])?;
                if new_child == child {
                    return Ok(root);
                }
                b.children[n] = new_child;
                match b.sole_child() {
                    None => {
                        self.pool.update_node(root, Node::Branch(b))?;
                        Ok(root)
                    }
                    Some((idx, sole)) => {
                        self.pool.release(root);
                        self.collapse_into(idx, sole)
                    }
                }
            }
            Node::Extension(mut e) => {
                if !path.starts_with(e.path.as_slice()) {
                    return Ok(root);
                }
                let new_child = self.delete(e.child, &path[e.path.len()..])?;
                if new_child == e.child {
                    return Ok(root);
                }
                if new_child.is_empty() {
                    self.pool.release(root);
                    return Ok(NodeId::EMPTY);
                }
                match self.pool.get_node(new_child)? {
                    Node::Extension(child_ext) => {
                        self.pool.release(new_child);
                        e.path.extend_from_slice(&child_ext.path);
                        e.child = child_ext.child;
                        self.pool.update_node(root, Node::Extension(e))?;
                        Ok(root)
                    }
                    _ => {
                        e.child = new_child;
                        self.pool.update_node(root, Node::Extension(e))?;
                        Ok(root)
                    }
                }
            }
            Node::Account(a) => {
                if path == a.path.as_slice() {
                    self.pool.release(root);
                    Ok(NodeId::EMPTY)
                } else {
                    Ok(root)
                }
            }
            Node::Value(v) => {
                if path == v.path.as_slice() {
                    self.pool.release(root);
                    Ok(NodeId::EMPTY)
                } else {
                    Ok(root)
                }
            }
        }
    }

    /// Absorbs branch index `idx` into the sole surviving child `sole`,
    /// per the collapse rule for each possible child variant.
    fn collapse_into(&self, idx: u8, sole: NodeId) -> Result<NodeId, MptError> {
        match self.pool.get_node(sole)? {
            Node::Branch(_) => Ok(self
                .pool
                .create_node(Node::Extension(ExtensionNode { path: vec![idx], child: sole }))?),
            Node::Extension(mut e) => {
                self.pool.release(sole);
                let mut path = vec![idx];
                path.append(&mut e.path);
                Ok(self.pool.create_node(Node::Extension(ExtensionNode { path, child: e.child }))?)
            }
            Node::Account(mut a) => {
                let mut path = vec![idx];
                path.append(&mut a.path);
                a.path = path;
                self.pool.update_node(sole, Node::Account(a))?;
                Ok(sole)
            }
            Node::Value(mut v) => {
                let mut path = vec![idx];
                path.append(&mut v.path);
                v.path = path;
                self.pool.update_node(sole, Node::Value(v))?;
                Ok(sole)
            }
        }
    }

    /// Releases every node reachable from `root` (used to free a storage
    /// sub-trie on account reset/deletion). `root` itself is released too.
    fn release_subtree(&self, root: NodeId) -> Result<(), MptError> {
        if root.is_empty() {
            return Ok(());
        }
        match self.pool.get_node(root)? {
            Node::Branch(b) => {
                for child in b.children {
                    self.release_subtree(child)?;
                }
            }
            Node::Extension(e) => self.release_subtree(e.child)?,
            Node::Value(_) => {}
            Node::Account(_) => unreachable!("a storage sub-trie never contains account leaves"),
        }
        self.pool.release(root);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Account-level primitives (spec §4.3).
    // ---------------------------------------------------------------

    fn get_account_node(&self, root: NodeId, address: &Address) -> Result<Option<AccountNode>, MptError> {
        let path = secure_path(address.as_slice());
        match self.lookup(root, &path)? {
            Some(Node::Account(a)) => Ok(Some(a)),
            Some(_) => unreachable!("an account path resolves only to an account leaf"),
            None => Ok(None),
        }
    }

    fn default_account(path: &[u8]) -> AccountNode {
        AccountNode {
            path: path.to_vec(),
            nonce: 0,
            balance: U256::ZERO,
            storage_root: NodeId::EMPTY,
            code_hash: alloy_trie::KECCAK_EMPTY,
        }
    }

    /// Account leaf if present, else a fresh default (create-on-write).
    fn account_or_default(&self, root: NodeId, address: &Address) -> Result<AccountNode, MptError> {
        let path = secure_path(address.as_slice());
        Ok(self.get_account_node(root, address)?.unwrap_or_else(|| Self::default_account(&path)))
    }

    pub fn exists(&self, root: NodeId, address: &Address) -> Result<bool, MptError> {
        Ok(self.get_account_node(root, address)?.is_some())
    }

    pub fn get_balance(&self, root: NodeId, address: &Address) -> Result<U256, MptError> {
        Ok(self.get_account_node(root, address)?.map(|a| a.balance).unwrap_or(U256::ZERO))
    }

    pub fn get_nonce(&self, root: NodeId, address: &Address) -> Result<u64, MptError> {
        Ok(self.get_account_node(root, address)?.map(|a| a.nonce).unwrap_or(0))
    }

    pub fn get_code_hash(&self, root: NodeId, address: &Address) -> Result<B256, MptError> {
        Ok(self
            .get_account_node(root, address)?
            .map(|a| a.code_hash)
            .unwrap_or(alloy_trie::KECCAK_EMPTY))
    }

    /// Root of `address`'s storage sub-trie, `NodeId::EMPTY` if the account
    /// has no storage or does not exist.
    pub fn storage_root(&self, root: NodeId, address: &Address) -> Result<NodeId, MptError> {
        Ok(self.get_account_node(root, address)?.map(|a| a.storage_root).unwrap_or(NodeId::EMPTY))
    }

    pub fn get_storage(&self, root: NodeId, address: &Address, key: &B256) -> Result<B256, MptError> {
        let storage_root = self.storage_root(root, address)?;
        let slot_path = secure_path(key.as_slice());
        match self.lookup(storage_root, &slot_path)? {
            Some(Node::Value(v)) => Ok(v.value),
            Some(_) => unreachable!("a storage path resolves only to a value leaf"),
            None => Ok(B256::ZERO),
        }
    }

    pub fn create_account(&self, root: NodeId, address: &Address) -> Result<NodeId, MptError> {
        let path = secure_path(address.as_slice());
        if let Some(existing) = self.get_account_node(root, address)? {
            self.release_subtree(existing.storage_root)?;
        }
        self.insert(root, &path, &|p| Node::Account(Self::default_account(p)))
    }

    pub fn delete_account(&self, root: NodeId, address: &Address) -> Result<NodeId, MptError> {
        let path = secure_path(address.as_slice());
        if let Some(existing) = self.get_account_node(root, address)? {
            self.release_subtree(existing.storage_root)?;
        }
        self.delete(root, &path)
    }

    pub fn set_balance(&self, root: NodeId, address: &Address, balance: U256) -> Result<NodeId, MptError> {
        let path = secure_path(address.as_slice());
        let mut account = self.account_or_default(root, address)?;
        account.balance = balance;
        self.insert(root, &path, &move |p| Node::Account(AccountNode { path: p.to_vec(), ..account.clone() }))
    }

    pub fn set_nonce(&self, root: NodeId, address: &Address, nonce: u64) -> Result<NodeId, MptError> {
        let path = secure_path(address.as_slice());
        let mut account = self.account_or_default(root, address)?;
        account.nonce = nonce;
        self.insert(root, &path, &move |p| Node::Account(AccountNode { path: p.to_vec(), ..account.clone() }))
    }

    /// Stores `code` in `codes` keyed by its hash and points the account's
    /// `codeHash` at it. Empty code sets `codeHash = Keccak("")`.
    pub fn set_code(
        &self,
        root: NodeId,
        address: &Address,
        code: Vec<u8>,
        codes: &dyn crate::code::CodeStore,
    ) -> Result<NodeId, MptError> {
        let path = secure_path(address.as_slice());
        let mut account = self.account_or_default(root, address)?;
        account.code_hash = codes.put(code);
        self.insert(root, &path, &move |p| Node::Account(AccountNode { path: p.to_vec(), ..account.clone() }))
    }

    pub fn set_storage(
        &self,
        root: NodeId,
        address: &Address,
        key: &B256,
        value: B256,
    ) -> Result<NodeId, MptError> {
        let acct_path = secure_path(address.as_slice());
        let mut account = self.account_or_default(root, address)?;
        let slot_path = secure_path(key.as_slice());

        account.storage_root = if value.is_zero() {
            self.delete(account.storage_root, &slot_path)?
        } else {
            self.insert(account.storage_root, &slot_path, &move |p| {
                Node::Value(ValueNode { path: p.to_vec(), value })
            })?
        };

        self.insert(root, &acct_path, &move |p| Node::Account(AccountNode { path: p.to_vec(), ..account.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::MemoryCodeStore;
    use rust_eth_triedb_memorydb::MemoryStore;
    use rust_eth_triedb_nodepool::{ACCOUNT_RECORD_LEN, BRANCH_RECORD_LEN, EXTENSION_RECORD_LEN, VALUE_RECORD_LEN};

    fn open_pool() -> NodePool<MemoryStore> {
        NodePool::open(
            MemoryStore::new(BRANCH_RECORD_LEN),
            MemoryStore::new(EXTENSION_RECORD_LEN),
            MemoryStore::new(ACCOUNT_RECORD_LEN),
            MemoryStore::new(VALUE_RECORD_LEN),
            4096,
        )
    }

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = byte;
        Address::from(bytes)
    }

    #[test]
    fn empty_trie_hashes_to_well_known_root() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        assert_eq!(trie.hash(NodeId::EMPTY).unwrap(), alloy_trie::EMPTY_ROOT_HASH);
    }

    #[test]
    fn create_on_write_for_set_balance() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let a = addr(1);
        assert!(!trie.exists(NodeId::EMPTY, &a).unwrap());

        let root = trie.set_balance(NodeId::EMPTY, &a, U256::from(42u64)).unwrap();
        assert!(trie.exists(root, &a).unwrap());
        assert_eq!(trie.get_balance(root, &a).unwrap(), U256::from(42u64));
        assert_eq!(trie.get_nonce(root, &a).unwrap(), 0);
    }

    #[test]
    fn delete_account_clears_existence_and_storage() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let a = addr(1);
        let key = B256::repeat_byte(9);

        let root = trie.set_storage(NodeId::EMPTY, &a, &key, B256::repeat_byte(1)).unwrap();
        assert_ne!(trie.get_storage(root, &a, &key).unwrap(), B256::ZERO);

        let root = trie.delete_account(root, &a).unwrap();
        assert!(!trie.exists(root, &a).unwrap());
        assert_eq!(trie.get_storage(root, &a, &key).unwrap(), B256::ZERO);
    }

    #[test]
    fn zero_value_storage_write_deletes_slot() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let a = addr(1);
        let key = B256::repeat_byte(9);

        let root = trie.set_storage(NodeId::EMPTY, &a, &key, B256::repeat_byte(1)).unwrap();
        let root = trie.set_storage(root, &a, &key, B256::ZERO).unwrap();
        assert_eq!(trie.get_storage(root, &a, &key).unwrap(), B256::ZERO);
        assert_eq!(trie.storage_root(root, &a).unwrap(), NodeId::EMPTY);
    }

    #[test]
    fn set_code_updates_hash_and_content_store() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let codes = MemoryCodeStore::new();
        let a = addr(1);

        let root = trie.set_code(NodeId::EMPTY, &a, b"hello".to_vec(), &codes).unwrap();
        let hash = trie.get_code_hash(root, &a).unwrap();
        assert_eq!(codes.get(&hash), Some(b"hello".to_vec()));
    }

    #[test]
    fn many_accounts_round_trip() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let mut root = NodeId::EMPTY;
        for i in 0..64u8 {
            root = trie.set_balance(root, &addr(i), U256::from(i as u64 + 1)).unwrap();
        }
        for i in 0..64u8 {
            assert_eq!(trie.get_balance(root, &addr(i)).unwrap(), U256::from(i as u64 + 1));
        }
    }

    #[test]
    fn deleting_all_accounts_returns_to_empty_root() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let mut root = NodeId::EMPTY;
        for i in 0..16u8 {
            root = trie.set_nonce(root, &addr(i), i as u64).unwrap();
        }
        for i in 0..16u8 {
            root = trie.delete_account(root, &addr(i)).unwrap();
        }
        assert_eq!(trie.hash(root).unwrap(), alloy_trie::EMPTY_ROOT_HASH);
    }
}
