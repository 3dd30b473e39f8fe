//! B-tree implementation for in-memory integer indexing
//!
//! This module provides a classic B-tree (keys live in every node, not just
//! the leaves) parameterized by its minimum degree `t`:
//! - Every node holds at most `2t - 1` keys
//! - Every node except the root holds at least `t - 1` keys
//! - Duplicate keys are stored as many times as they are inserted
//!
//! Full nodes are split on the way down during insertion, so an insert never
//! has to walk back up the tree. The tree only grows in height when the root
//! itself is full.

mod error;
mod node;

pub use error::{BTreeError, BTreeResult};
pub use node::{BTreeNode, NodeId};

use std::iter::FusedIterator;

use serde::Serialize;
use tracing::{debug, trace};

/// Key type for the B-tree
pub type BTreeKey = i64;

/// Default minimum degree (nodes split at 5 keys)
pub const DEFAULT_MIN_DEGREE: usize = 3;

/// Smallest minimum degree for which the occupancy rules are meaningful
pub const MIN_DEGREE_LOWER_BOUND: usize = 2;

/// B-tree data structure
///
/// Minimum degree `t` means:
/// - Nodes have at most `2t - 1` keys and internal nodes at most `2t` children
/// - Non-root nodes have at least `t - 1` keys
/// - Internal nodes have exactly one more child than keys
#[derive(Debug, Clone)]
pub struct BTree {
    /// Root node ID (None if tree is empty)
    root: Option<NodeId>,

    /// Minimum degree, fixed at construction
    min_degree: usize,

    /// Key capacity of a node (`2t - 1`)
    max_keys: usize,

    /// Node storage
    nodes: Vec<BTreeNode>,

    /// Total number of keys in the tree
    key_count: usize,
}

/// Shape summary of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BTreeStats {
    pub min_degree: usize,
    pub keys: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub height: usize,
}

impl BTree {
    /// Create a new empty B-tree with the given minimum degree
    ///
    /// # Arguments
    /// * `min_degree` - The minimum degree `t` (must be >= 2 and small
    ///   enough that `2t - 1` fits in a `usize`)
    ///
    /// # Returns
    /// * `Ok(BTree)` - A new empty B-tree
    /// * `Err(BTreeError::InvalidMinDegree)` - If `t` is out of range
    pub fn new(min_degree: usize) -> BTreeResult<Self> {
        if min_degree < MIN_DEGREE_LOWER_BOUND {
            return Err(BTreeError::InvalidMinDegree(min_degree));
        }
        let max_keys = min_degree
            .checked_mul(2)
            .ok_or(BTreeError::InvalidMinDegree(min_degree))?
            - 1;

        Ok(Self {
            root: None,
            min_degree,
            max_keys,
            nodes: Vec::new(),
            key_count: 0,
        })
    }

    /// Create a new B-tree with the default minimum degree (3)
    pub fn with_default_degree() -> Self {
        Self::new(DEFAULT_MIN_DEGREE).expect("Default minimum degree is valid")
    }

    /// Get the minimum degree
    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    /// Maximum keys in any node
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Minimum keys in a non-root node
    pub fn min_keys(&self) -> usize {
        self.min_degree - 1
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get number of keys in the tree, duplicates included
    pub fn len(&self) -> usize {
        self.key_count
    }

    /// Get tree height (0 when empty, 1 for a single leaf)
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;

        while let Some(id) = current {
            height += 1;
            current = self
                .get_node(id)
                .and_then(|node| node.children.first().copied());
        }

        height
    }

    // ========== Node Management ==========

    /// Allocate a new node, returning its ID
    fn allocate_node(&mut self, node: BTreeNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Get a reference to a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&BTreeNode> {
        self.nodes.get(id)
    }

    /// Get the root node ID
    pub fn root_node_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Get the total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========== Search Operations ==========

    /// Search for a key, returning the ID of the node that holds it
    ///
    /// Returns the first node on the root-to-leaf path containing `key`.
    pub fn search(&self, key: BTreeKey) -> Option<NodeId> {
        let mut current = self.root?;

        loop {
            let node = self.get_node(current)?;
            let index = node.find_key_index(key);

            if node.holds_key_at(index, key) {
                return Some(current);
            }
            if node.is_leaf() {
                return None;
            }

            trace!(
                target: "btindex::search",
                node = current,
                child_index = index,
                "descending through internal node"
            );
            current = node.children[index];
        }
    }

    /// Check whether `key` is stored in the tree
    pub fn contains(&self, key: BTreeKey) -> bool {
        self.search(key).is_some()
    }

    /// Smallest key in the tree
    pub fn min(&self) -> Option<BTreeKey> {
        let mut node = self.get_node(self.root?)?;
        while let Some(&child) = node.children.first() {
            node = self.get_node(child)?;
        }
        node.min_key()
    }

    /// Largest key in the tree
    pub fn max(&self) -> Option<BTreeKey> {
        let mut node = self.get_node(self.root?)?;
        while let Some(&child) = node.children.last() {
            node = self.get_node(child)?;
        }
        node.max_key()
    }

    // ========== Insert Operations ==========

    /// Insert a key into the tree
    ///
    /// Never fails. Duplicate keys are stored again.
    pub fn insert(&mut self, key: BTreeKey) {
        let root_id = match self.root {
            Some(id) => id,
            None => {
                // Create first leaf as root
                let mut leaf = BTreeNode::new_leaf();
                leaf.insert_key(key);
                self.root = Some(self.allocate_node(leaf));
                self.key_count = 1;
                return;
            }
        };

        if self.nodes[root_id].is_full(self.max_keys) {
            // Grow a new root above the full one and split it
            let new_root_id = self.allocate_node(BTreeNode::new_internal(root_id));
            self.split_child(new_root_id, 0);

            let new_root = &self.nodes[new_root_id];
            let target = if new_root.keys[0] < key { 1 } else { 0 };
            let child_id = new_root.children[target];
            self.insert_non_full(child_id, key);

            self.root = Some(new_root_id);
            debug!(
                target: "btindex::insert",
                old_root = root_id,
                new_root = new_root_id,
                height = self.height(),
                "split root"
            );
        } else {
            self.insert_non_full(root_id, key);
        }

        self.key_count += 1;
    }

    /// Insert into the subtree rooted at a node that is not full
    fn insert_non_full(&mut self, node_id: NodeId, key: BTreeKey) {
        let node = &mut self.nodes[node_id];
        if node.is_leaf() {
            node.insert_key(key);
            return;
        }

        let mut index = node.child_index_for_insert(key);
        let child_id = node.children[index];

        if self.nodes[child_id].is_full(self.max_keys) {
            self.split_child(node_id, index);

            // The promoted median now sits at `index`
            if self.nodes[node_id].keys[index] < key {
                index += 1;
            }
        }

        let child_id = self.nodes[node_id].children[index];
        self.insert_non_full(child_id, key);
    }

    /// Split the full child at `index` of `parent_id`
    ///
    /// The child keeps its lower half, a new right sibling takes the upper
    /// half, and the median moves up into the parent.
    fn split_child(&mut self, parent_id: NodeId, index: usize) {
        let child_id = self.nodes[parent_id].children[index];
        let (median, right) = self.nodes[child_id].split_off_upper(self.min_degree);
        let right_id = self.allocate_node(right);

        self.nodes[parent_id].insert_split(index, median, right_id);

        trace!(
            target: "btindex::insert",
            parent = parent_id,
            left = child_id,
            right = right_id,
            median,
            "split full child"
        );
    }

    // ========== Traversal ==========

    /// Iterate over all keys in ascending order
    ///
    /// Each call starts a fresh traversal from the smallest key.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse::new(self)
    }

    /// Alias for [`BTree::traverse`]
    pub fn iter(&self) -> Traverse<'_> {
        self.traverse()
    }

    /// Visit keys in ascending order until `f` returns false
    pub fn scan<F>(&self, mut f: F)
    where
        F: FnMut(BTreeKey) -> bool,
    {
        for key in self.traverse() {
            if !f(key) {
                break;
            }
        }
    }

    // ========== Diagnostics ==========

    /// Summarize the shape of the tree
    pub fn stats(&self) -> BTreeStats {
        BTreeStats {
            min_degree: self.min_degree,
            keys: self.key_count,
            nodes: self.nodes.len(),
            leaves: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            height: self.height(),
        }
    }

    /// Check every structural invariant of the tree
    ///
    /// Verifies occupancy, key order, separator bounds, child counts, uniform
    /// leaf depth, that every allocated node is reachable exactly once, and
    /// that the stored key count matches.
    pub fn validate(&self) -> BTreeResult<()> {
        let root = match self.root {
            Some(id) => id,
            None => {
                if self.key_count != 0 || !self.nodes.is_empty() {
                    return Err(BTreeError::InvalidState(format!(
                        "empty tree holds {} keys in {} nodes",
                        self.key_count,
                        self.nodes.len()
                    )));
                }
                return Ok(());
            }
        };

        let mut check = Validation {
            leaf_depth: None,
            keys: 0,
            nodes: 0,
        };
        self.validate_node(root, true, None, None, 1, &mut check)?;

        if check.keys != self.key_count {
            return Err(BTreeError::InvalidState(format!(
                "key count is {} but {} keys are reachable",
                self.key_count, check.keys
            )));
        }
        if check.nodes != self.nodes.len() {
            return Err(BTreeError::InvalidState(format!(
                "{} nodes allocated but {} reachable",
                self.nodes.len(),
                check.nodes
            )));
        }

        Ok(())
    }

    fn validate_node(
        &self,
        id: NodeId,
        is_root: bool,
        lower: Option<BTreeKey>,
        upper: Option<BTreeKey>,
        depth: usize,
        check: &mut Validation,
    ) -> BTreeResult<()> {
        let node = self.get_node(id).ok_or(BTreeError::NodeNotFound(id))?;
        let len = node.len();

        if len > self.max_keys() {
            return Err(BTreeError::InvalidState(format!(
                "node {} holds {} keys, max is {}",
                id,
                len,
                self.max_keys()
            )));
        }
        if is_root && len == 0 {
            return Err(BTreeError::InvalidState("root has no keys".to_string()));
        }
        if !is_root && len < self.min_keys() {
            return Err(BTreeError::InvalidState(format!(
                "node {} holds {} keys, min is {}",
                id,
                len,
                self.min_keys()
            )));
        }
        if node.keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(BTreeError::InvalidState(format!(
                "node {} keys out of order",
                id
            )));
        }

        let below = lower.is_some_and(|lo| node.min_key().is_some_and(|k| k < lo));
        let above = upper.is_some_and(|hi| node.max_key().is_some_and(|k| k > hi));
        if below || above {
            return Err(BTreeError::InvalidState(format!(
                "node {} keys escape separator bounds {:?}..{:?}",
                id, lower, upper
            )));
        }

        check.keys += len;
        check.nodes += 1;

        if node.is_leaf() {
            if !node.children.is_empty() {
                return Err(BTreeError::InvalidState(format!(
                    "leaf {} has children",
                    id
                )));
            }
            match check.leaf_depth {
                None => check.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(BTreeError::InvalidState(format!(
                        "leaf {} at depth {}, expected {}",
                        id, depth, expected
                    )));
                }
                Some(_) => {}
            }
            return Ok(());
        }

        if node.children.len() != len + 1 {
            return Err(BTreeError::InvalidState(format!(
                "internal node {} has {} keys and {} children",
                id,
                len,
                node.children.len()
            )));
        }

        for (i, &child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(node.keys[i - 1]) };
            let hi = if i == len { upper } else { Some(node.keys[i]) };
            self.validate_node(child, false, lo, hi, depth + 1, check)?;
        }

        Ok(())
    }
}

impl Default for BTree {
    fn default() -> Self {
        Self::with_default_degree()
    }
}

impl<'a> IntoIterator for &'a BTree {
    type Item = BTreeKey;
    type IntoIter = Traverse<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.traverse()
    }
}

/// Running totals for [`BTree::validate`]
struct Validation {
    leaf_depth: Option<usize>,
    keys: usize,
    nodes: usize,
}

/// In-order iterator over B-tree keys
///
/// Holds the path from the root to the current position; each frame is a
/// node and the index of its next key to emit.
pub struct Traverse<'a> {
    tree: &'a BTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Traverse<'a> {
    fn new(tree: &'a BTree) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::with_capacity(tree.height()),
        };
        if let Some(root) = tree.root {
            iter.descend_leftmost(root);
        }
        iter
    }

    /// Push `id` and every leftmost descendant down to a leaf
    fn descend_leftmost(&mut self, mut id: NodeId) {
        let tree = self.tree;
        while let Some(node) = tree.get_node(id) {
            self.stack.push((id, 0));
            match node.children.first() {
                Some(&child) => id = child,
                None => break,
            }
        }
    }
}

impl Iterator for Traverse<'_> {
    type Item = BTreeKey;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;

        loop {
            let frame = self.stack.last_mut()?;
            let (id, index) = *frame;
            let Some(node) = tree.get_node(id) else {
                self.stack.clear();
                return None;
            };

            if index < node.len() {
                frame.1 += 1;
                let key = node.keys[index];
                // Everything in children[index + 1] sorts before keys[index + 1]
                if let Some(child) = node.children.get(index + 1).copied() {
                    self.descend_leftmost(child);
                }
                return Some(key);
            }

            self.stack.pop();
        }
    }
}

impl FusedIterator for Traverse<'_> {}
