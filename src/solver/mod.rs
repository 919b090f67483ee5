//! Leontief-style linear solves over extracted matrices.
pub mod linear;
mod sparse;

pub use linear::{
    calculate_lca, impact_matrix, impact_vector, inventory_matrix, inventory_vector, production_vector, LcaResult,
    SubSystem,
};
