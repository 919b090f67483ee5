pub mod characterization;
pub mod edges;
pub mod matrix;

pub use characterization::{attach_characterization, AttachOptions};
pub use edges::{graph_from_edge_lists, EdgeListOptions, EdgeListSystem, EdgeTriple};
pub use matrix::{graph_from_matrices, BuildOptions, MatrixSystem};
