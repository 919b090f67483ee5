use super::types::*;
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NO_EDGE: u32 = u32::MAX;

/// Directed multigraph of production, extension and characterization nodes.
///
/// Columnar arena: node `i` lives at `nodes[i]`, edges are appended to `edges`,
/// and outgoing adjacency is a linked list threaded through `next_out`.
/// Built once by the `build` module and treated as an immutable value after.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcoGraph {
    pub(crate) nodes: Vec<NodeRecord>,
    pub(crate) edges: Vec<Edge>,

    // Ephemeral lookup state (not serialized, rebuilt on load)
    #[serde(skip)]
    pub(crate) handles: HashMap<NodeUuid, NodeId>,
    #[serde(skip)]
    pub(crate) first_out: Vec<u32>,
    #[serde(skip)]
    pub(crate) next_out: Vec<u32>,
}

impl EcoGraph {
    pub fn new() -> Self { Self::default() }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Rebuilds the UUID index and adjacency lists after deserialization.
    ///
    /// Fails on repeated UUIDs and on edges whose endpoints are not in the
    /// arena; the caches are left empty in that case.
    pub fn rebuild_index(&mut self) -> Result<(), GraphError> {
        self.handles.clear();
        self.first_out.clear();
        self.next_out.clear();

        let n = self.nodes.len();
        let mut handles = HashMap::with_capacity(n);
        for (i, node) in self.nodes.iter().enumerate() {
            if handles.insert(node.uuid.clone(), NodeId::new(i)).is_some() {
                return Err(GraphError::CorruptGraph(format!("node '{}' appears more than once", node.uuid)));
            }
        }
        if let Some((e, edge)) = self.edges.iter().enumerate()
            .find(|(_, edge)| edge.source.index() >= n || edge.target.index() >= n)
        {
            return Err(GraphError::CorruptGraph(format!(
                "edge {} connects {} -> {}, but the graph has {} nodes",
                e, edge.source.index(), edge.target.index(), n
            )));
        }

        self.handles = handles;
        self.first_out = vec![NO_EDGE; n];
        self.next_out = Vec::with_capacity(self.edges.len());
        for (e, edge) in self.edges.iter().enumerate() {
            let s = edge.source.index();
            self.next_out.push(self.first_out[s]);
            self.first_out[s] = e as u32;
        }
        Ok(())
    }

    /// Inserts a node unless its UUID is already present.
    ///
    /// Returns the handle and whether a new node was created. Builders count
    /// the `false` cases to detect keys that collapsed distinct records.
    pub(crate) fn insert_node(&mut self, record: NodeRecord) -> (NodeId, bool) {
        if let Some(&id) = self.handles.get(&record.uuid) {
            return (id, false);
        }
        let id = NodeId::new(self.nodes.len());
        self.handles.insert(record.uuid.clone(), id);
        self.nodes.push(record);
        self.first_out.push(NO_EDGE);
        (id, true)
    }

    pub(crate) fn add_edge(&mut self, source: NodeId, target: NodeId, flow: f64, positive: Option<bool>) {
        let e = self.edges.len() as u32;
        self.edges.push(Edge { source, target, flow, positive });
        let s = source.index();
        self.next_out.push(self.first_out[s]);
        self.first_out[s] = e;
    }

    // --- Accessors ---

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &NodeRecord { &self.nodes[id.index()] }

    pub fn handle(&self, uuid: &NodeUuid) -> Option<NodeId> { self.handles.get(uuid).copied() }

    pub fn node_by_uuid(&self, uuid: &NodeUuid) -> Option<&NodeRecord> {
        self.handle(uuid).map(|id| self.node(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId::new(i), n))
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes().filter(move |(_, n)| n.node_type == node_type)
    }

    pub fn count_of_type(&self, node_type: NodeType) -> usize {
        self.nodes.iter().filter(|n| n.node_type == node_type).count()
    }

    /// Nodes whose attribute `key` equals `value`, in insertion order.
    pub fn find_by_attribute<'a>(&'a self, key: &'a str, value: &'a AttrValue) -> impl Iterator<Item = (NodeId, &'a NodeRecord)> + 'a {
        self.nodes().filter(move |(_, n)| &n.attr(key) == value)
    }

    pub fn edges(&self) -> &[Edge] { &self.edges }

    /// Outgoing edges of `id`, most recently added first.
    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        let mut cursor = self.first_out.get(id.index()).copied().unwrap_or(NO_EDGE);
        std::iter::from_fn(move || {
            if cursor == NO_EDGE {
                return None;
            }
            let edge = &self.edges[cursor as usize];
            cursor = self.next_out[cursor as usize];
            Some(edge)
        })
    }

    /// Substitutes node identities. Edges and attributes are untouched.
    ///
    /// Nodes missing from `mapping` keep their UUID. A mapping that sends two
    /// nodes to the same UUID is rejected.
    pub fn relabel(&self, mapping: &HashMap<NodeUuid, NodeUuid>) -> Result<EcoGraph, GraphError> {
        let mut out = self.clone();
        for node in &mut out.nodes {
            if let Some(new) = mapping.get(&node.uuid) {
                node.uuid = new.clone();
            }
        }
        out.rebuild_index()?;
        Ok(out)
    }

    /// Order-insensitive structural equality: same UUIDs carrying equal
    /// records, and the same edge multiset.
    pub fn is_equivalent(&self, other: &EcoGraph) -> bool {
        if self.node_count() != other.node_count() || self.edge_count() != other.edge_count() {
            return false;
        }
        let same_nodes = self.nodes.iter()
            .all(|n| other.node_by_uuid(&n.uuid).map_or(false, |m| m == n));
        same_nodes && self.edge_signature() == other.edge_signature()
    }

    fn edge_signature(&self) -> Vec<(NodeUuid, NodeUuid, u64, Option<bool>)> {
        let mut sig: Vec<_> = self.edges.iter()
            .map(|e| (
                self.node(e.source).uuid.clone(),
                self.node(e.target).uuid.clone(),
                e.flow.to_bits(),
                e.positive,
            ))
            .collect();
        sig.sort();
        sig
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(uuid: &str, node_type: NodeType) -> NodeRecord {
        NodeMetadata { uuid: Some(uuid.into()), ..NodeMetadata::new(uuid, "kg") }
            .into_record(node_type, 0, "test")
    }

    #[test]
    fn test_insert_is_idempotent_per_uuid() {
        let mut g = EcoGraph::new();
        let (a, new_a) = g.insert_node(record("a", NodeType::Production));
        let (a2, new_a2) = g.insert_node(record("a", NodeType::Production));
        assert!(new_a);
        assert!(!new_a2);
        assert_eq!(a, a2);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_multigraph_out_edges() {
        let mut g = EcoGraph::new();
        let (a, _) = g.insert_node(record("a", NodeType::Production));
        let (b, _) = g.insert_node(record("b", NodeType::Production));
        g.add_edge(a, b, 1.0, None);
        g.add_edge(a, b, 2.0, Some(false));
        g.add_edge(b, a, 3.0, None);

        let flows: Vec<f64> = g.out_edges(a).map(|e| e.flow).collect();
        assert_eq!(flows, vec![2.0, 1.0]);
        assert_eq!(g.out_edges(b).count(), 1);
    }

    #[test]
    fn test_relabel_preserves_structure() {
        let mut g = EcoGraph::new();
        let (a, _) = g.insert_node(record("a", NodeType::Production));
        let (b, _) = g.insert_node(record("b", NodeType::Extension));
        g.add_edge(b, a, 4.0, None);

        let mapping: HashMap<NodeUuid, NodeUuid> =
            [("a".into(), "x".into()), ("b".into(), "y".into())].into_iter().collect();
        let r = g.relabel(&mapping).unwrap();

        assert!(r.handle(&"a".into()).is_none());
        let x = r.handle(&"x".into()).unwrap();
        let y = r.handle(&"y".into()).unwrap();
        assert_eq!(r.node(x).name, "a");
        let e: Vec<&Edge> = r.out_edges(y).collect();
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].target, x);
        assert_eq!(e[0].flow, 4.0);
    }

    #[test]
    fn test_rebuild_index_after_roundtrip() {
        let mut g = EcoGraph::new();
        let (a, _) = g.insert_node(record("a", NodeType::Production));
        let (b, _) = g.insert_node(record("b", NodeType::Production));
        g.add_edge(a, b, 0.5, None);

        let json = serde_json::to_string(&g).unwrap();
        let mut back: EcoGraph = serde_json::from_str(&json).unwrap();
        assert!(back.handle(&"a".into()).is_none());
        back.rebuild_index().unwrap();
        assert!(back.is_equivalent(&g));
        assert_eq!(back.out_edges(a).count(), 1);
    }

    #[test]
    fn test_relabel_rejects_merging_nodes() {
        let mut g = EcoGraph::new();
        g.insert_node(record("a", NodeType::Production));
        g.insert_node(record("b", NodeType::Production));

        let mapping: HashMap<NodeUuid, NodeUuid> = [("a".into(), "b".into())].into_iter().collect();
        assert!(matches!(g.relabel(&mapping), Err(GraphError::CorruptGraph(_))));
    }

    #[rstest]
    #[case::source_out_of_range(0, 5)]
    #[case::target_out_of_range(7, 0)]
    fn test_rebuild_index_rejects_dangling_edges(#[case] source: usize, #[case] target: usize) {
        let mut g = EcoGraph::new();
        g.insert_node(record("a", NodeType::Production));
        g.edges.push(Edge { source: NodeId::new(source), target: NodeId::new(target), flow: 1.0, positive: None });

        assert!(matches!(g.rebuild_index(), Err(GraphError::CorruptGraph(_))));
        assert!(g.handle(&"a".into()).is_none());
    }
}
