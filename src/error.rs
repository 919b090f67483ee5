//! Error taxonomy for graph construction, extraction and solving.
use crate::store::{NodeType, NodeUuid};
use thiserror::Error;

/// Every failure the core can report.
///
/// These are deterministic data-integrity errors: they are raised eagerly at the
/// entry point of each component and never retried.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A matrix dimension does not match another matrix or a metadata list.
    #[error("Shape mismatch: {what} expected {expected}, got {actual}")]
    ShapeMismatch { what: String, expected: usize, actual: usize },

    /// A matrix or edge amount is NaN or infinite.
    #[error("Non-numeric entry in {matrix} at ({row}, {col})")]
    NonNumeric { matrix: &'static str, row: usize, col: usize },

    #[error("Negative entry {value} in {matrix} at ({row}, {col}) is not allowed under the 'I-A' convention")]
    NegativeEntry { matrix: &'static str, row: usize, col: usize, value: f64 },

    #[error("Convention must be 'I-A' or 'A', got '{0}'")]
    InvalidConvention(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A node metadata record lacks one of the required `name` / `unit` fields.
    #[error("{node_type} record {index} is missing required field '{field}'")]
    MissingAttribute { node_type: NodeType, index: usize, field: &'static str },

    #[error("{node_type} record {index} has no identifier in field '{field}'")]
    MissingIdentifier { node_type: NodeType, index: usize, field: String },

    /// Distinct metadata records collapsed onto the same node key.
    #[error("Expected {expected} {node_type} nodes, graph contains {actual}")]
    CardinalityMismatch { node_type: NodeType, expected: usize, actual: usize },

    #[error("Cannot compose node '{uuid}': {reason}")]
    GraphComposition { uuid: NodeUuid, reason: String },

    #[error("Edge endpoint '{key}' does not match any node")]
    UnresolvedEdge { key: String },

    /// Coordinate labels of two operands differ in content or order.
    #[error("Labels of {left} and {right} do not align")]
    Alignment { left: &'static str, right: &'static str },

    #[error("Node '{0}' is not present in the matrix")]
    UnknownNode(NodeUuid),

    #[error("(I - A) is singular; no unique production vector exists")]
    SingularMatrix,

    /// A deserialized graph references missing nodes or repeats a UUID.
    #[error("Stored graph is inconsistent: {0}")]
    CorruptGraph(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
