use thiserror::Error;

use super::node::NodeId;

/// Errors that can occur during B-tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BTreeError {
    #[error("Configuration error: invalid minimum degree {0} (must be >= 2 and at most usize::MAX / 2)")]
    InvalidMinDegree(usize),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid tree state: {0}")]
    InvalidState(String),
}

pub type BTreeResult<T> = Result<T, BTreeError>;
