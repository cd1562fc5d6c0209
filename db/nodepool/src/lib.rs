//! The typed node pool: four variant-keyed paged containers (Branch,
//! Extension, Account, Value) addressed through a tagged [`NodeId`], fronted
//! by a single bounded, pinning node cache (spec §4.2).

mod cache;
mod error;
mod node;
mod pool;

pub use cache::CacheStats;
pub use error::NodePoolError;
pub use node::{
    AccountNode, BranchNode, ExtensionNode, Node, ValueNode, ACCOUNT_RECORD_LEN,
    BRANCH_RECORD_LEN, EXTENSION_RECORD_LEN, PATH_RECORD_LEN, VALUE_RECORD_LEN,
};
pub use pool::{
    split_cache_capacity, NodePool, ACCOUNT_CACHE_WEIGHT, BRANCH_CACHE_WEIGHT,
    EXTENSION_CACHE_WEIGHT, VALUE_CACHE_WEIGHT,
};

pub use rust_eth_triedb_common::{NodeId, NodeVariantTag, RecordStore};
