use super::BTreeKey;

/// Node identifier (index into node storage)
pub type NodeId = usize;

/// B-tree node
///
/// Keys are kept sorted. An internal node always holds exactly
/// `keys.len() + 1` child IDs; a leaf holds none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeNode {
    /// Keys (sorted, duplicates allowed)
    pub(super) keys: Vec<BTreeKey>,
    /// Child node IDs (empty for leaves)
    pub(super) children: Vec<NodeId>,
    leaf: bool,
}

impl BTreeNode {
    /// Create a new empty leaf node
    pub fn new_leaf() -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
            leaf: true,
        }
    }

    /// Create a new internal node with a single child and no keys yet
    ///
    /// Only valid as a transient state while the root is being split.
    pub fn new_internal(first_child: NodeId) -> Self {
        Self {
            keys: Vec::new(),
            children: vec![first_child],
            leaf: false,
        }
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if node has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in ascending order
    pub fn keys(&self) -> &[BTreeKey] {
        &self.keys
    }

    /// Child IDs, left to right
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// A node is full once it holds `max_keys` (`2t - 1`) keys
    pub fn is_full(&self, max_keys: usize) -> bool {
        self.keys.len() == max_keys
    }

    /// Index of the first key >= `key`, or `len()` if every key is smaller
    pub fn find_key_index(&self, key: BTreeKey) -> usize {
        self.keys
            .iter()
            .position(|&k| k >= key)
            .unwrap_or(self.keys.len())
    }

    /// Check whether slot `index` holds exactly `key`
    ///
    /// `index == len()` is a valid probe and never matches.
    pub fn holds_key_at(&self, index: usize, key: BTreeKey) -> bool {
        self.keys.get(index) == Some(&key)
    }

    /// Index of the child whose subtree must receive `key` on insert
    ///
    /// This is the number of keys <= `key`, so equal keys go right.
    pub fn child_index_for_insert(&self, key: BTreeKey) -> usize {
        self.keys
            .iter()
            .rposition(|&k| k <= key)
            .map_or(0, |i| i + 1)
    }

    /// Insert a key into a leaf in sorted order
    ///
    /// Equal keys are placed after existing ones.
    pub fn insert_key(&mut self, key: BTreeKey) {
        debug_assert!(self.leaf);
        let pos = self.child_index_for_insert(key);
        self.keys.insert(pos, key);
    }

    /// Split a full node in place
    ///
    /// This node keeps the lower `t - 1` keys (and `t` children). Returns the
    /// median key and a new sibling holding the upper `t - 1` keys (and `t`
    /// children).
    pub fn split_off_upper(&mut self, min_degree: usize) -> (BTreeKey, BTreeNode) {
        debug_assert_eq!(self.keys.len() + 1, 2 * min_degree);

        let right_keys = self.keys.split_off(min_degree);
        let right_children = if self.leaf {
            Vec::new()
        } else {
            self.children.split_off(min_degree)
        };
        // keys.len() == t here, so the median is the last one left
        let median = self.keys.pop().expect("full node has a median");

        let right = BTreeNode {
            keys: right_keys,
            children: right_children,
            leaf: self.leaf,
        };

        (median, right)
    }

    /// Record a split of `children[index]`: the promoted key goes to key
    /// position `index` and the new right sibling to child position `index + 1`
    pub fn insert_split(&mut self, index: usize, median: BTreeKey, right: NodeId) {
        debug_assert!(!self.leaf);
        self.keys.insert(index, median);
        self.children.insert(index + 1, right);
    }

    /// Smallest key held directly by this node
    pub fn min_key(&self) -> Option<BTreeKey> {
        self.keys.first().copied()
    }

    /// Largest key held directly by this node
    pub fn max_key(&self) -> Option<BTreeKey> {
        self.keys.last().copied()
    }
}

impl Default for BTreeNode {
    fn default() -> Self {
        Self::new_leaf()
    }
}
