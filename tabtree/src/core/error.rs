use thiserror::Error;

use super::NodeId;

/// Failure of a browser-side action or query
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("host operation failed: {0}")]
    Failed(String),
    #[error("host operation timed out")]
    Timeout,
    #[error("host bridge disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NotFound(NodeId),
    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),
    #[error("Cannot move {id} under {parent}: would create a cycle")]
    Cycle { id: NodeId, parent: NodeId },
    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),
    #[error("The root node cannot be removed or moved")]
    RootImmutable,
    #[error("Node {id} is not a {expected}")]
    WrongKind { id: NodeId, expected: &'static str },
    #[error(transparent)]
    Host(#[from] HostError),
}

pub type TreeResult<T> = Result<T, TreeError>;
