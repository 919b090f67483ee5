//! Multigraph assembly and Leontief solves for life-cycle and input-output
//! models.
//!
//! Producers hand over either aligned matrices ([`build::graph_from_matrices`])
//! or node and edge lists ([`build::graph_from_edge_lists`]). The resulting
//! [`EcoGraph`] is turned back into labelled matrices by
//! [`compute::extract_matrices`] and solved by the functions in [`solver`].

pub mod analysis;
pub mod build;
pub mod compute;
pub mod error;
pub mod identity;
pub mod io;
pub mod solver;
pub mod store;

// The Python facade. `cargo test` runs without it.
#[cfg(feature = "python")]
pub mod bindings {
    pub mod python;
}

pub use error::GraphError;
pub use store::{AttrValue, Convention, EcoGraph, NodeId, NodeMetadata, NodeRecord, NodeType, NodeUuid};
