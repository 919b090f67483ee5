//! Graph composition and invariant validation.
use crate::error::GraphError;
use crate::store::{EcoGraph, NodeId, NodeRecord, NodeType};
use super::telemetry::StageTimer;

/// Merges sub-graphs into one multigraph.
///
/// Nodes are united by UUID and edges are concatenated. A UUID that appears
/// with two different types, or with conflicting attributes, aborts the merge.
/// The result does not depend on the order of `graphs` up to
/// [`EcoGraph::is_equivalent`].
pub fn compose<'a>(graphs: impl IntoIterator<Item = &'a EcoGraph>) -> Result<EcoGraph, GraphError> {
    let _timer = StageTimer::start("composing graphs");
    let mut out = EcoGraph::new();

    for graph in graphs {
        let mut remap: Vec<NodeId> = Vec::with_capacity(graph.node_count());
        for (_, record) in graph.nodes() {
            let id = match out.handle(&record.uuid) {
                Some(existing) => {
                    merge_record(&mut out.nodes[existing.index()], record)?;
                    existing
                }
                None => out.insert_node(record.clone()).0,
            };
            remap.push(id);
        }
        for edge in graph.edges() {
            out.add_edge(remap[edge.source.index()], remap[edge.target.index()], edge.flow, edge.positive);
        }
    }
    Ok(out)
}

pub fn compose_pair(a: &EcoGraph, b: &EcoGraph) -> Result<EcoGraph, GraphError> {
    compose([a, b])
}

fn merge_record(existing: &mut NodeRecord, incoming: &NodeRecord) -> Result<(), GraphError> {
    let conflict = |reason: String| GraphError::GraphComposition { uuid: incoming.uuid.clone(), reason };

    if existing.node_type != incoming.node_type {
        return Err(conflict(format!(
            "typed '{}' in one sub-graph and '{}' in another",
            existing.node_type, incoming.node_type
        )));
    }

    let required = [
        ("name", existing.name != incoming.name),
        ("unit", existing.unit != incoming.unit),
        ("system", existing.system != incoming.system),
        ("production", existing.production.to_bits() != incoming.production.to_bits()),
        ("index", existing.index != incoming.index),
    ];
    if let Some((field, _)) = required.iter().find(|(_, differs)| *differs) {
        return Err(conflict(format!("conflicting values for '{}'", field)));
    }

    for (key, value) in &incoming.extra {
        match existing.extra.get(key) {
            Some(current) if current != value => {
                return Err(conflict(format!("conflicting values for '{}'", key)));
            }
            Some(_) => {}
            None => {
                existing.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(())
}

/// Re-checks the invariants every composed graph must satisfy.
pub fn validate(graph: &EcoGraph) -> Result<(), GraphError> {
    for (id, node) in graph.nodes() {
        if node.name.is_empty() {
            return Err(GraphError::MissingAttribute { node_type: node.node_type, index: node.index, field: "name" });
        }
        if node.unit.is_empty() {
            return Err(GraphError::MissingAttribute { node_type: node.node_type, index: node.index, field: "unit" });
        }
        if graph.handle(&node.uuid) != Some(id) {
            return Err(GraphError::GraphComposition {
                uuid: node.uuid.clone(),
                reason: "UUID index is out of sync with the node arena".to_string(),
            });
        }
    }

    for edge in graph.edges() {
        let s = graph.node(edge.source);
        let t = graph.node(edge.target);
        let allowed = matches!(
            (s.node_type, t.node_type),
            (NodeType::Production, NodeType::Production)
                | (NodeType::Extension, NodeType::Production)
                | (NodeType::Production, NodeType::Extension)
                | (NodeType::Characterization, NodeType::Extension)
        );
        if !allowed {
            return Err(GraphError::GraphComposition {
                uuid: s.uuid.clone(),
                reason: format!("edge {} -> {} connects '{}' to '{}'", s.uuid, t.uuid, s.node_type, t.node_type),
            });
        }
        if !edge.flow.is_finite() || edge.flow < 0.0 {
            return Err(GraphError::InvalidValue(format!("edge {} -> {} carries flow {}", s.uuid, t.uuid, edge.flow)));
        }
    }
    Ok(())
}
