//! Matrix extraction from a composed graph.
pub mod extract;
pub mod kernel;
pub mod matrix;

pub use extract::{extract_matrices, sort_nodes, ExtractOptions, MatrixFormat, MatrixSet};
pub use matrix::{LabeledMatrix, LabeledVector, MatrixData, ResultMatrix};
