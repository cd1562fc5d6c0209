//! Fixed-width primitive types shared across the trie database crates.
//!
//! Addresses, hashes, keys, values, nonces and balances are treated as
//! opaque byte arrays of declared width; serialization of these primitives
//! is handled by `alloy-primitives` / `alloy-rlp`, not re-implemented here.

use alloy_primitives::{B256, U256};

/// A 20-byte externally-owned or contract account address.
pub type Address = alloy_primitives::Address;

/// A 32-byte hash, used for node hashes and the state/storage root.
pub type Hash = B256;

/// A 32-byte storage slot key (pre-secure-hashing).
pub type Key = B256;

/// A 32-byte storage slot value.
pub type Value = B256;

/// Account nonce (transaction / contract-creation counter).
pub type Nonce = u64;

/// Account balance in wei, a 32-byte big-endian unsigned integer.
pub type Balance = U256;

/// Number of hex nibbles in a fully expanded secure-hashed trie path.
pub const PATH_NIBBLES: usize = 64;

/// The tag occupying the top byte of a [`NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum NodeVariantTag {
    /// The canonical empty subtree. Never actually stored; `NodeId::EMPTY` carries this tag.
    Empty = 0,
    /// 16-way branch node.
    Branch = 1,
    /// Shared-nibble extension node.
    Extension = 2,
    /// Account leaf (end of a 64-nibble account path).
    Account = 3,
    /// Storage-value leaf (end of a 64-nibble storage path).
    Value = 4,
}

impl NodeVariantTag {
    fn from_u8(tag: u8) -> Self {
        match tag {
            0 => NodeVariantTag::Empty,
            1 => NodeVariantTag::Branch,
            2 => NodeVariantTag::Extension,
            3 => NodeVariantTag::Account,
            4 => NodeVariantTag::Value,
            other => panic!("corrupt NodeId tag {other}"),
        }
    }
}

/// A tagged, self-describing handle to a trie node.
///
/// Encoding: the zero value is the canonical empty subtree. Any other value
/// packs an 8-bit variant tag in the top byte and a 56-bit index into that
/// variant's paged container in the low bits:
///
/// ```text
/// bit 63                      56 55                                   0
/// +----------------------------+--------------------------------------+
/// |         variant tag        |              container index         |
/// +----------------------------+--------------------------------------+
/// ```
///
/// This is one of two equally valid encodings permitted by the
/// specification (the other packs the tag in the low bits); this
/// implementation commits to the tagged-high-byte form documented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(u64);

const TAG_SHIFT: u32 = 56;
const INDEX_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

impl NodeId {
    /// The canonical empty subtree id.
    pub const EMPTY: NodeId = NodeId(0);

    /// Builds a tagged id for a given variant and container index.
    ///
    /// # Panics
    /// Panics if `index` does not fit in 56 bits, or if `variant` is `Empty`
    /// (the empty id is always `NodeId::EMPTY` and carries no index).
    pub fn new(variant: NodeVariantTag, index: u64) -> Self {
        assert!(variant != NodeVariantTag::Empty, "Empty NodeId has no index");
        assert!(index <= INDEX_MASK, "node index {index} overflows 56 bits");
        NodeId(((variant as u64) << TAG_SHIFT) | index)
    }

    /// Returns true if this is the canonical empty subtree.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Recovers the variant tag without any table lookup.
    pub fn variant(&self) -> NodeVariantTag {
        if self.0 == 0 {
            return NodeVariantTag::Empty;
        }
        NodeVariantTag::from_u8((self.0 >> TAG_SHIFT) as u8)
    }

    /// Recovers the container index. Panics for the empty id.
    pub fn index(&self) -> u64 {
        assert!(!self.is_empty(), "Empty NodeId has no index");
        self.0 & INDEX_MASK
    }

    /// Raw `u64` representation, for persistence inside other node records.
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstructs a `NodeId` from its raw `u64` representation.
    pub fn from_raw(raw: u64) -> Self {
        if raw != 0 {
            // Validate the tag is recognized; panics (fatal corruption) otherwise.
            let _ = NodeVariantTag::from_u8((raw >> TAG_SHIFT) as u8);
        }
        NodeId(raw)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "NodeId(Empty)")
        } else {
            write!(f, "NodeId({:?}:{})", self.variant(), self.index())
        }
    }
}
