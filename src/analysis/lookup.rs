use crate::error::GraphError;
use crate::store::{AttrValue, EcoGraph, NodeType, NodeUuid};
use smallvec::SmallVec;
use std::collections::HashMap;

pub type LookupKey = SmallVec<[AttrValue; 4]>;

/// Maps attribute tuples to node UUIDs for one node type.
///
/// Used to match external records (a characterization table keyed by flow
/// name and compartment, say) to graph nodes. Two nodes sharing a key make the
/// table ambiguous and are reported as a cardinality error.
pub fn lookup_table(graph: &EcoGraph, node_type: NodeType, attributes: &[&str]) -> Result<HashMap<LookupKey, NodeUuid>, GraphError> {
    let mut table = HashMap::new();
    let mut expected = 0;
    for (_, node) in graph.nodes_of_type(node_type) {
        let key: LookupKey = attributes.iter().map(|a| node.attr(a)).collect();
        table.insert(key, node.uuid.clone());
        expected += 1;
    }
    if table.len() != expected {
        return Err(GraphError::CardinalityMismatch { node_type, expected, actual: table.len() });
    }
    Ok(table)
}

pub fn lookup_key<I, V>(values: I) -> LookupKey
where
    I: IntoIterator<Item = V>,
    V: Into<AttrValue>,
{
    values.into_iter().map(Into::into).collect()
}
