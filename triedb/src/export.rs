//! Export / Import / Verify (spec §4.7): a self-contained, deterministic
//! depth-first dump of the Live trie, its inverse reconstruction into a
//! fresh directory, and a structural-plus-hash verification pass.

use std::io::{self, Read, Write};

use alloy_primitives::B256;
use rust_eth_triedb_mpt::{CodeStore, Trie};
use rust_eth_triedb_nodepool::{
    AccountNode, BranchNode, ExtensionNode, Node, NodeId, NodePool, NodePoolError, RecordStore, ValueNode,
};

use crate::error::Error;

/// 4-byte magic prefixing every export stream.
pub const EXPORT_MAGIC: [u8; 4] = *b"RTDB";

/// Export stream format version; `Import` rejects any other value.
pub const EXPORT_FORMAT_VERSION: u8 = 0;

const RECORD_NODE: u8 = 1;
const RECORD_CODE: u8 = 2;
const RECORD_ROOT: u8 = 3;

const TAG_BRANCH: u8 = 1;
const TAG_EXTENSION: u8 = 2;
const TAG_ACCOUNT: u8 = 3;
const TAG_VALUE: u8 = 4;

/// Sentinel "stream id" standing in for `NodeId::EMPTY` inside child
/// references (spec: "children references via relative ids").
const EMPTY_REF: u32 = u32::MAX;

/// Streams a self-contained, deterministic dump of the trie rooted at
/// `root`: magic, version, schema, a depth-first run of node records (each
/// variant's children referenced by the 0-based position of their own
/// record in the stream, not by their storage `NodeId`), the account code
/// blobs the walk reaches, and a trailing root record.
pub fn export<R: RecordStore, W: Write>(
    pool: &NodePool<R>,
    codes: &dyn CodeStore,
    root: NodeId,
    schema: u32,
    writer: &mut W,
) -> Result<(), Error>
where
    NodePoolError: From<R::Error>,
{
    writer.write_all(&EXPORT_MAGIC).map_err(stream_err)?;
    writer.write_all(&[EXPORT_FORMAT_VERSION]).map_err(stream_err)?;
    writer.write_all(&schema.to_be_bytes()).map_err(stream_err)?;

    let mut exported_codes = std::collections::HashSet::new();
    let mut next_stream_id = 0u32;
    let root_ref = export_subtree(pool, codes, root, writer, &mut next_stream_id, &mut exported_codes)?;

    writer.write_all(&[RECORD_ROOT]).map_err(stream_err)?;
    writer.write_all(&root_ref.to_be_bytes()).map_err(stream_err)?;
    Ok(())
}

fn export_subtree<R: RecordStore, W: Write>(
    pool: &NodePool<R>,
    codes: &dyn CodeStore,
    id: NodeId,
    writer: &mut W,
    next_stream_id: &mut u32,
    exported_codes: &mut std::collections::HashSet<B256>,
) -> Result<u32, Error>
where
    NodePoolError: From<R::Error>,
{
    if id.is_empty() {
        return Ok(EMPTY_REF);
    }
    let node = pool.get_node(id).map_err(rust_eth_triedb_mpt::MptError::from)?;

    let mut body = Vec::new();
    let tag = match &node {
        Node::Branch(b) => {
            for child in b.children {
                let child_ref = export_subtree(pool, codes, child, writer, next_stream_id, exported_codes)?;
                body.extend_from_slice(&child_ref.to_be_bytes());
            }
            TAG_BRANCH
        }
        Node::Extension(e) => {
            let child_ref = export_subtree(pool, codes, e.child, writer, next_stream_id, exported_codes)?;
            write_path(&mut body, &e.path);
            body.extend_from_slice(&child_ref.to_be_bytes());
            TAG_EXTENSION
        }
        Node::Account(a) => {
            let storage_ref =
                export_subtree(pool, codes, a.storage_root, writer, next_stream_id, exported_codes)?;
            if a.code_hash != alloy_trie::KECCAK_EMPTY && exported_codes.insert(a.code_hash) {
                let code = codes.get(&a.code_hash).unwrap_or_default();
                writer.write_all(&[RECORD_CODE]).map_err(stream_err)?;
                writer.write_all(a.code_hash.as_slice()).map_err(stream_err)?;
                writer.write_all(&(code.len() as u32).to_be_bytes()).map_err(stream_err)?;
                writer.write_all(&code).map_err(stream_err)?;
            }
            write_path(&mut body, &a.path);
            body.extend_from_slice(&a.nonce.to_be_bytes());
            body.extend_from_slice(&a.balance.to_be_bytes::<32>());
            body.extend_from_slice(&storage_ref.to_be_bytes());
            body.extend_from_slice(a.code_hash.as_slice());
            TAG_ACCOUNT
        }
        Node::Value(v) => {
            write_path(&mut body, &v.path);
            body.extend_from_slice(v.value.as_slice());
            TAG_VALUE
        }
    };

    writer.write_all(&[RECORD_NODE, tag]).map_err(stream_err)?;
    writer.write_all(&(body.len() as u32).to_be_bytes()).map_err(stream_err)?;
    writer.write_all(&body).map_err(stream_err)?;

    let stream_id = *next_stream_id;
    *next_stream_id += 1;
    Ok(stream_id)
}

fn write_path(out: &mut Vec<u8>, path: &[u8]) {
    out.push(path.len() as u8);
    out.extend_from_slice(path);
}

/// Reconstructs a fresh trie into `pool` (expected empty) from an export
/// stream, returning the root `NodeId` and restoring every code blob into
/// `codes`.
pub fn import<R: RecordStore, RD: Read>(
    pool: &NodePool<R>,
    codes: &dyn CodeStore,
    reader: &mut RD,
) -> Result<NodeId, Error>
where
    NodePoolError: From<R::Error>,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(stream_err)?;
    if magic != EXPORT_MAGIC {
        return Err(Error::StreamFailed("bad magic".to_string()));
    }
    let mut version = [0u8; 1];
    reader.read_exact(&mut version).map_err(stream_err)?;
    if version[0] != EXPORT_FORMAT_VERSION {
        return Err(Error::StreamFailed(format!("unsupported export version {}", version[0])));
    }
    let mut schema_bytes = [0u8; 4];
    reader.read_exact(&mut schema_bytes).map_err(stream_err)?;

    let mut stream_ids: Vec<NodeId> = Vec::new();
    loop {
        let mut record_type = [0u8; 1];
        reader.read_exact(&mut record_type).map_err(stream_err)?;
        match record_type[0] {
            RECORD_NODE => {
                let mut tag = [0u8; 1];
                reader.read_exact(&mut tag).map_err(stream_err)?;
                let mut len_bytes = [0u8; 4];
                reader.read_exact(&mut len_bytes).map_err(stream_err)?;
                let mut body = vec![0u8; u32::from_be_bytes(len_bytes) as usize];
                reader.read_exact(&mut body).map_err(stream_err)?;
                let id = decode_node_record(pool, tag[0], &body, &stream_ids)?;
                stream_ids.push(id);
            }
            RECORD_CODE => {
                let mut hash_bytes = [0u8; 32];
                reader.read_exact(&mut hash_bytes).map_err(stream_err)?;
                let mut len_bytes = [0u8; 4];
                reader.read_exact(&mut len_bytes).map_err(stream_err)?;
                let mut code = vec![0u8; u32::from_be_bytes(len_bytes) as usize];
                reader.read_exact(&mut code).map_err(stream_err)?;
                codes.put(code);
                let _ = B256::from_slice(&hash_bytes);
            }
            RECORD_ROOT => {
                let mut ref_bytes = [0u8; 4];
                reader.read_exact(&mut ref_bytes).map_err(stream_err)?;
                let stream_id = u32::from_be_bytes(ref_bytes);
                return Ok(resolve_ref(stream_id, &stream_ids));
            }
            other => return Err(Error::StreamFailed(format!("unknown record type {other}"))),
        }
    }
}

fn resolve_ref(stream_id: u32, stream_ids: &[NodeId]) -> NodeId {
    if stream_id == EMPTY_REF {
        NodeId::EMPTY
    } else {
        stream_ids[stream_id as usize]
    }
}

fn decode_node_record<R: RecordStore>(
    pool: &NodePool<R>,
    tag: u8,
    body: &[u8],
    stream_ids: &[NodeId],
) -> Result<NodeId, Error>
where
    NodePoolError: From<R::Error>,
{
    let node = match tag {
        TAG_BRANCH => {
            let mut children = [NodeId::EMPTY; 16];
            for (i, chunk) in body.chunks(4).enumerate() {
                children[i] = resolve_ref(u32::from_be_bytes(chunk.try_into().unwrap()), stream_ids);
            }
            Node::Branch(BranchNode { children })
        }
        TAG_EXTENSION => {
            let (path, rest) = read_path(body);
            let child = resolve_ref(u32::from_be_bytes(rest.try_into().unwrap()), stream_ids);
            Node::Extension(ExtensionNode { path, child })
        }
        TAG_ACCOUNT => {
            let (path, rest) = read_path(body);
            let nonce = u64::from_be_bytes(rest[..8].try_into().unwrap());
            let balance = alloy_primitives::U256::from_be_bytes::<32>(rest[8..40].try_into().unwrap());
            let storage_root = resolve_ref(u32::from_be_bytes(rest[40..44].try_into().unwrap()), stream_ids);
            let code_hash = B256::from_slice(&rest[44..76]);
            Node::Account(AccountNode { path, nonce, balance, storage_root, code_hash })
        }
        TAG_VALUE => {
            let (path, rest) = read_path(body);
            let value = B256::from_slice(rest);
            Node::Value(ValueNode { path, value })
        }
        other => return Err(Error::StreamFailed(format!("unknown node variant tag {other}"))),
    };
    Ok(pool.create_node(node).map_err(rust_eth_triedb_mpt::MptError::from)?)
}

fn read_path(body: &[u8]) -> (Vec<u8>, &[u8]) {
    let len = body[0] as usize;
    (body[1..1 + len].to_vec(), &body[1 + len..])
}

fn stream_err(e: io::Error) -> Error {
    Error::StreamFailed(e.to_string())
}

/// Outcome of a successful [`verify`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub nodes_visited: u64,
    pub root_hash: B256,
}

/// Walks the trie rooted at `root` structurally (every reachable `NodeId`
/// resolves to its expected variant; every branch has at least two
/// children) and recomputes the root hash bottom-up, confirming it matches
/// `expected_root_hash`. `observer` is called once per node visited, with
/// the running count, for progress reporting.
pub fn verify<R: RecordStore>(
    pool: &NodePool<R>,
    root: NodeId,
    expected_root_hash: B256,
    mut observer: impl FnMut(u64),
) -> Result<VerifyReport, Error>
where
    NodePoolError: From<R::Error>,
{
    let mut nodes_visited = 0u64;
    walk(pool, root, &mut nodes_visited, &mut observer)?;

    let root_hash =
        Trie::new(pool).hash(root).map_err(|e| Error::VerificationFailed(e.to_string()))?;
    if root_hash != expected_root_hash {
        return Err(Error::VerificationFailed(format!(
            "recomputed root hash {root_hash} does not match expected {expected_root_hash}"
        )));
    }
    Ok(VerifyReport { nodes_visited, root_hash })
}

fn walk<R: RecordStore>(
    pool: &NodePool<R>,
    id: NodeId,
    nodes_visited: &mut u64,
    observer: &mut impl FnMut(u64),
) -> Result<(), Error>
where
    NodePoolError: From<R::Error>,
{
    if id.is_empty() {
        return Ok(());
    }
    let node = pool
        .get_node(id)
        .map_err(|e| Error::VerificationFailed(rust_eth_triedb_mpt::MptError::from(e).to_string()))?;
    *nodes_visited += 1;
    observer(*nodes_visited);

    match node {
        Node::Branch(b) => {
            if b.non_empty_count() < 2 {
                return Err(Error::VerificationFailed(format!("branch {id} has fewer than 2 children")));
            }
            for child in b.children {
                walk(pool, child, nodes_visited, observer)?;
            }
        }
        Node::Extension(e) => {
            if e.path.is_empty() {
                return Err(Error::VerificationFailed(format!("extension {id} has an empty path")));
            }
            walk(pool, e.child, nodes_visited, observer)?;
        }
        Node::Account(a) => walk(pool, a.storage_root, nodes_visited, observer)?,
        Node::Value(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use rust_eth_triedb_memorydb::MemoryStore;
    use rust_eth_triedb_mpt::{MemoryCodeStore, Trie};
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
    fn export_then_import_reconstructs_an_equivalent_trie() {
        let src_pool = open_pool();
        let src_codes = MemoryCodeStore::new();
        let trie = Trie::new(&src_pool);
        let a = addr(1);
        let b = addr(2);
        let key = B256::repeat_byte(7);

        let mut root = trie.set_balance(NodeId::EMPTY, &a, U256::from(1_000u64)).unwrap();
        root = trie.set_nonce(root, &a, 3).unwrap();
        root = trie.set_code(root, &a, vec![0x60, 0x00], &src_codes).unwrap();
        root = trie.set_storage(root, &b, &key, B256::repeat_byte(9)).unwrap();
        let expected_hash = trie.hash(root).unwrap();

        let mut buf = Vec::new();
        export(&src_pool, &src_codes, root, 5, &mut buf).unwrap();
        assert_eq!(&buf[..4], &EXPORT_MAGIC);

        let dst_pool = open_pool();
        let dst_codes = MemoryCodeStore::new();
        let imported_root = import(&dst_pool, &dst_codes, &mut &buf[..]).unwrap();

        let dst_trie = Trie::new(&dst_pool);
        assert_eq!(dst_trie.hash(imported_root).unwrap(), expected_hash);
        assert_eq!(dst_trie.get_balance(imported_root, &a).unwrap(), U256::from(1_000u64));
        assert_eq!(dst_trie.get_nonce(imported_root, &a).unwrap(), 3);
        assert_eq!(dst_trie.get_code_hash(imported_root, &a).unwrap(), alloy_primitives::keccak256([0x60, 0x00]));
        assert_eq!(dst_codes.get(&alloy_primitives::keccak256([0x60, 0x00])), Some(vec![0x60, 0x00]));
        assert_eq!(dst_trie.get_storage(imported_root, &b, &key).unwrap(), B256::repeat_byte(9));
    }

    #[test]
    fn export_is_deterministic_for_the_same_state() {
        let pool = open_pool();
        let codes = MemoryCodeStore::new();
        let trie = Trie::new(&pool);
        let root = trie.set_balance(NodeId::EMPTY, &addr(1), U256::from(7u64)).unwrap();

        let mut first = Vec::new();
        export(&pool, &codes, root, 5, &mut first).unwrap();
        let mut second = Vec::new();
        export(&pool, &codes, root, 5, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn import_rejects_bad_magic() {
        let dst_pool = open_pool();
        let dst_codes = MemoryCodeStore::new();
        let err = import(&dst_pool, &dst_codes, &mut &b"NOPE"[..]).unwrap_err();
        assert!(matches!(err, Error::StreamFailed(_)));
    }

    #[test]
    fn verify_confirms_a_healthy_trie() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let root = trie.set_balance(NodeId::EMPTY, &addr(1), U256::from(7u64)).unwrap();
        let hash = trie.hash(root).unwrap();

        let mut visits = 0u64;
        let report = verify(&pool, root, hash, |n| visits = n).unwrap();
        assert_eq!(report.root_hash, hash);
        assert_eq!(report.nodes_visited, visits);
        assert!(report.nodes_visited >= 1);
    }

    #[test]
    fn verify_detects_a_root_hash_mismatch() {
        let pool = open_pool();
        let trie = Trie::new(&pool);
        let root = trie.set_balance(NodeId::EMPTY, &addr(1), U256::from(7u64)).unwrap();

        let err = verify(&pool, root, B256::repeat_byte(0xEE), |_| {}).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn verify_succeeds_on_an_empty_trie() {
        let pool = open_pool();
        let report = verify(&pool, NodeId::EMPTY, alloy_trie::EMPTY_ROOT_HASH, |_| {}).unwrap();
        assert_eq!(report.nodes_visited, 0);
    }
}
