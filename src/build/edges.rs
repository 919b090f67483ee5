//! Graph construction from pre-itemized node and edge lists.
//!
//! Process databases deliver nodes with natural keys (database codes) and
//! exchanges that reference those keys. Nodes are keyed by the natural key
//! while the graph is assembled, then optionally relabelled to fresh UUIDs.
use crate::analysis::compose::compose;
use crate::analysis::telemetry::StageTimer;
use crate::error::GraphError;
use crate::identity::tag_records;
use crate::store::{EcoGraph, NodeId, NodeMetadata, NodeRecord, NodeType, NodeUuid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One exchange between two natural keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTriple {
    pub source: String,
    pub target: String,
    pub amount: f64,
    #[serde(default)]
    pub positive: Option<bool>,
}

impl EdgeTriple {
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: f64) -> Self {
        Self { source: source.into(), target: target.into(), amount, positive: None }
    }

    pub fn positive(mut self, positive: bool) -> Self {
        self.positive = Some(positive);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeListSystem {
    pub production_metadata: Vec<NodeMetadata>,
    pub extension_metadata: Vec<NodeMetadata>,
    /// Both endpoints are production keys.
    pub production_edges: Vec<EdgeTriple>,
    /// One endpoint is an extension key, the other a production key.
    pub extension_edges: Vec<EdgeTriple>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeListOptions {
    pub system: String,
    pub production_key_field: String,
    pub extension_key_field: String,
    pub assign_new_uuids: bool,
}

impl Default for EdgeListOptions {
    fn default() -> Self {
        Self {
            system: String::new(),
            production_key_field: "code".to_string(),
            extension_key_field: "code".to_string(),
            assign_new_uuids: false,
        }
    }
}

pub fn graph_from_edge_lists(system: EdgeListSystem, options: &EdgeListOptions) -> Result<EcoGraph, GraphError> {
    let EdgeListSystem {
        production_metadata: mut prod_meta,
        extension_metadata: mut ext_meta,
        production_edges,
        extension_edges,
    } = system;

    check_amounts(&production_edges, "production edges")?;
    check_amounts(&extension_edges, "extension edges")?;

    tag_records(&mut prod_meta, NodeType::Production, &options.system, false, &options.production_key_field)?;
    tag_records(&mut ext_meta, NodeType::Extension, &options.system, false, &options.extension_key_field)?;

    let prod_records: Vec<NodeRecord> = prod_meta.into_iter().enumerate()
        .map(|(i, r)| r.into_record(NodeType::Production, i, &options.system))
        .collect();
    let ext_records: Vec<NodeRecord> = ext_meta.into_iter().enumerate()
        .map(|(i, r)| r.into_record(NodeType::Extension, i, &options.system))
        .collect();

    let timer = StageTimer::start("creating production graph from edge list");
    let mut technosphere = EcoGraph::new();
    let mut added_production = 0;
    for record in &prod_records {
        added_production += technosphere.insert_node(record.clone()).1 as usize;
    }
    for edge in &production_edges {
        let source = resolve(&technosphere, &edge.source)?;
        let target = resolve(&technosphere, &edge.target)?;
        technosphere.add_edge(source, target, edge.amount.abs(), edge.positive);
    }
    timer.sizes(technosphere.node_count(), technosphere.edge_count());
    drop(timer);

    let timer = StageTimer::start("creating extension graph from edge list");
    let mut biosphere = EcoGraph::new();
    let mut added_extension = 0;
    for record in &ext_records {
        added_extension += biosphere.insert_node(record.clone()).1 as usize;
    }
    for edge in &extension_edges {
        let source = resolve_crossing(&mut biosphere, &technosphere, &edge.source)?;
        let target = resolve_crossing(&mut biosphere, &technosphere, &edge.target)?;
        let types = (biosphere.node(source).node_type, biosphere.node(target).node_type);
        if types.0 == types.1 {
            return Err(GraphError::InvalidValue(format!(
                "extension edge {} -> {} must connect an extension node with a production node",
                edge.source, edge.target
            )));
        }
        biosphere.add_edge(source, target, edge.amount.abs(), edge.positive);
    }
    timer.sizes(biosphere.node_count(), biosphere.edge_count());
    drop(timer);

    let graph = compose([&technosphere, &biosphere])?;

    if added_production != prod_records.len() {
        return Err(GraphError::CardinalityMismatch {
            node_type: NodeType::Production,
            expected: prod_records.len(),
            actual: added_production,
        });
    }
    if added_extension != ext_records.len() {
        return Err(GraphError::CardinalityMismatch {
            node_type: NodeType::Extension,
            expected: ext_records.len(),
            actual: added_extension,
        });
    }

    if options.assign_new_uuids {
        let _timer = StageTimer::start("relabelling nodes with UUIDs");
        let mapping: HashMap<NodeUuid, NodeUuid> = graph.nodes()
            .map(|(_, n)| (n.uuid.clone(), NodeUuid::generate()))
            .collect();
        return graph.relabel(&mapping);
    }
    Ok(graph)
}

fn resolve(graph: &EcoGraph, key: &str) -> Result<NodeId, GraphError> {
    graph.handle(&NodeUuid::from(key)).ok_or_else(|| GraphError::UnresolvedEdge { key: key.to_string() })
}

/// Resolves a key in the extension sub-graph, pulling the production node in
/// from `technosphere` when the key belongs there.
fn resolve_crossing(biosphere: &mut EcoGraph, technosphere: &EcoGraph, key: &str) -> Result<NodeId, GraphError> {
    let uuid = NodeUuid::from(key);
    if let Some(id) = biosphere.handle(&uuid) {
        return Ok(id);
    }
    let record = technosphere.node_by_uuid(&uuid)
        .ok_or_else(|| GraphError::UnresolvedEdge { key: key.to_string() })?;
    Ok(biosphere.insert_node(record.clone()).0)
}

fn check_amounts(edges: &[EdgeTriple], matrix: &'static str) -> Result<(), GraphError> {
    match edges.iter().position(|e| !e.amount.is_finite()) {
        Some(row) => Err(GraphError::NonNumeric { matrix, row, col: 0 }),
        None => Ok(()),
    }
}
