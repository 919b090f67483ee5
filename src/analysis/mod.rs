//! Operations over composed graphs that do not produce matrices.
pub mod compose;
pub mod lookup;
pub mod telemetry;
pub mod topology;

pub use compose::{compose, compose_pair, validate};
pub use lookup::{lookup_key, lookup_table, LookupKey};
pub use telemetry::{GraphReport, StageTimer};
pub use topology::{production_cycles, to_petgraph, upstream_from};
