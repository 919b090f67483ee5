//! The graph data model: typed node records and the arena-backed multigraph.
pub mod registry;
pub mod types;

pub use registry::EcoGraph;
pub use types::{AttrValue, Convention, Edge, NodeId, NodeMetadata, NodeRecord, NodeType, NodeUuid};
