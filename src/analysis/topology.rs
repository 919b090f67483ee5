use crate::store::{EcoGraph, NodeId, NodeType, NodeUuid};
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{HashSet, VecDeque};

/// Copies the arena into a `petgraph` graph for ad-hoc analysis.
///
/// Nodes are added in arena order, so `NodeIndex::new(id.index())` addresses
/// the node `id`.
pub fn to_petgraph(graph: &EcoGraph) -> StableDiGraph<NodeUuid, f64> {
    let mut out = StableDiGraph::with_capacity(graph.node_count(), graph.edge_count());
    for (_, node) in graph.nodes() {
        out.add_node(node.uuid.clone());
    }
    for edge in graph.edges() {
        out.add_edge(NodeIndex::new(edge.source.index()), NodeIndex::new(edge.target.index()), edge.flow);
    }
    out
}

/// Production sub-systems that feed back into themselves.
///
/// Every strongly connected component of the production -> production graph
/// with more than one member, or with a self-loop. Members are sorted by UUID
/// and components by their first member.
pub fn production_cycles(graph: &EcoGraph) -> Vec<Vec<NodeUuid>> {
    let mut view: StableDiGraph<NodeUuid, f64> = StableDiGraph::new();
    let mut index = vec![None; graph.node_count()];
    for (id, node) in graph.nodes_of_type(NodeType::Production) {
        index[id.index()] = Some(view.add_node(node.uuid.clone()));
    }
    for edge in graph.edges() {
        if let (Some(s), Some(t)) = (index[edge.source.index()], index[edge.target.index()]) {
            view.add_edge(s, t, edge.flow);
        }
    }

    let mut cycles: Vec<Vec<NodeUuid>> = tarjan_scc(&view).into_iter()
        .filter(|scc| scc.len() > 1 || view.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<NodeUuid> = scc.into_iter().map(|n| view[n].clone()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

/// Identifies every production node supplying `start`, directly or through
/// other suppliers. The start nodes are included; ids outside this graph's
/// arena are ignored.
pub fn upstream_from(graph: &EcoGraph, start: &[NodeId]) -> HashSet<NodeId> {
    let mut suppliers: Vec<Vec<NodeId>> = vec![Vec::new(); graph.node_count()];
    for edge in graph.edges() {
        let s = graph.node(edge.source).node_type;
        let t = graph.node(edge.target).node_type;
        if s == NodeType::Production && t == NodeType::Production {
            suppliers[edge.target.index()].push(edge.source);
        }
    }

    let mut visited = HashSet::new();
    let mut queue: VecDeque<NodeId> = start.iter().copied()
        .filter(|id| id.index() < graph.node_count())
        .collect();
    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(suppliers[node.index()].iter().copied());
        }
    }
    visited
}
