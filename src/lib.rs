pub mod btree;

pub use btree::{
    BTree, BTreeError, BTreeKey, BTreeNode, BTreeResult, BTreeStats, DEFAULT_MIN_DEGREE, NodeId,
    Traverse,
};
