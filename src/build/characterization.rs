//! Attaching a characterization method to an existing graph.
//!
//! Characterization tables usually arrive separately from the inventory and
//! address elementary flows by an attribute (name, CAS number, ...) rather
//! than by UUID. Each column label is matched against the extension nodes
//! already present in the graph.
use crate::analysis::compose::compose;
use crate::analysis::telemetry::StageTimer;
use crate::build::matrix::{check_cardinality, check_finite};
use crate::error::GraphError;
use crate::identity::tag_records;
use crate::store::{AttrValue, EcoGraph, NodeId, NodeMetadata, NodeType, NodeUuid};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachOptions {
    /// Stored as `method` on every new node and used as its `system`.
    pub method: String,
    /// Extension attribute the column labels are compared with.
    pub match_attribute: String,
    pub assign_new_uuids: bool,
    pub uuid_field: String,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            method: String::new(),
            match_attribute: "name".to_string(),
            assign_new_uuids: true,
            uuid_field: "uuid".to_string(),
        }
    }
}

/// Returns `graph` with the characterization layer `matrix` (indicators x
/// labels) composed onto it.
pub fn attach_characterization(
    graph: &EcoGraph,
    matrix: &DMatrix<f64>,
    characterization_metadata: Vec<NodeMetadata>,
    flow_labels: &[AttrValue],
    options: &AttachOptions,
) -> Result<EcoGraph, GraphError> {
    let _timer = StageTimer::start("attaching characterization");

    if matrix.nrows() != characterization_metadata.len() {
        return Err(GraphError::ShapeMismatch {
            what: "characterization matrix rows vs. characterization metadata".to_string(),
            expected: characterization_metadata.len(),
            actual: matrix.nrows(),
        });
    }
    if matrix.ncols() != flow_labels.len() {
        return Err(GraphError::ShapeMismatch {
            what: "characterization matrix columns vs. flow labels".to_string(),
            expected: flow_labels.len(),
            actual: matrix.ncols(),
        });
    }
    check_finite(matrix, "characterization matrix")?;

    let candidates = match_candidates(graph, &options.match_attribute);
    let targets = flow_labels.iter()
        .map(|label| {
            candidates.get(label).copied().ok_or_else(|| {
                GraphError::UnknownNode(NodeUuid::from(label.as_key().unwrap_or_else(|| format!("{label:?}"))))
            })
        })
        .collect::<Result<Vec<NodeId>, _>>()?;

    let mut records = characterization_metadata;
    for record in records.iter_mut() {
        record.extra.insert("method".to_string(), AttrValue::from(options.method.as_str()));
    }
    tag_records(&mut records, NodeType::Characterization, &options.method, options.assign_new_uuids, &options.uuid_field)?;

    let expected = graph.count_of_type(NodeType::Characterization) + records.len();

    let mut layer = EcoGraph::new();
    let rows: Vec<NodeId> = records.into_iter().enumerate()
        .map(|(i, r)| layer.insert_node(r.into_record(NodeType::Characterization, i, &options.method)).0)
        .collect();
    let cols: Vec<NodeId> = targets.iter()
        .map(|&id| layer.insert_node(graph.node(id).clone()).0)
        .collect();
    for (i, &row) in rows.iter().enumerate() {
        for (j, &col) in cols.iter().enumerate() {
            let value = matrix[(i, j)];
            if value != 0.0 {
                layer.add_edge(row, col, value.abs(), None);
            }
        }
    }

    let out = compose([graph, &layer])?;
    check_cardinality(&out, NodeType::Characterization, expected)?;
    Ok(out)
}

/// First extension node, in UUID order, for every value of `attribute`.
fn match_candidates(graph: &EcoGraph, attribute: &str) -> HashMap<AttrValue, NodeId> {
    let mut extension: Vec<(NodeId, &str)> = graph.nodes_of_type(NodeType::Extension)
        .map(|(id, n)| (id, n.uuid.as_str()))
        .collect();
    extension.sort_by(|a, b| a.1.cmp(b.1));

    let mut out = HashMap::new();
    for (id, _) in extension {
        out.entry(graph.node(id).attr(attribute)).or_insert(id);
    }
    out
}
