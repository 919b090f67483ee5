//! Deterministic reconstruction of technosphere, biosphere and
//! characterization matrices from a composed graph.
use super::matrix::{LabeledMatrix, LabeledVector, MatrixData};
use crate::analysis::telemetry::StageTimer;
use crate::error::GraphError;
use crate::store::{AttrValue, EcoGraph, NodeId, NodeType, NodeUuid};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixFormat {
    #[default]
    Dense,
    Sparse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub format: MatrixFormat,
    pub biosphere: bool,
    pub characterization: bool,
    /// Attribute tuples the node axes are sorted by; `None` sorts by UUID.
    pub production_sort: Option<Vec<String>>,
    pub extension_sort: Option<Vec<String>>,
    pub characterization_sort: Option<Vec<String>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            format: MatrixFormat::Dense,
            biosphere: true,
            characterization: false,
            production_sort: None,
            extension_sort: None,
            characterization_sort: None,
        }
    }
}

impl ExtractOptions {
    /// Sorts every axis by `attrs`.
    pub fn sorted_by(mut self, attrs: &[&str]) -> Self {
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
        self.production_sort = Some(attrs.clone());
        self.extension_sort = Some(attrs.clone());
        self.characterization_sort = Some(attrs);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSet {
    /// `A`: production x production.
    pub technosphere: LabeledMatrix,
    pub technosphere_normalized: LabeledMatrix,
    /// `B`: extension x production.
    pub biosphere: Option<LabeledMatrix>,
    pub biosphere_normalized: Option<LabeledMatrix>,
    /// `Q`: characterization x extension.
    pub characterization: Option<LabeledMatrix>,
    /// Reference production of each activity, used for normalization.
    pub production: LabeledVector,
}

type SortKey = SmallVec<[AttrValue; 4]>;

/// Orders the nodes of one type by an attribute tuple.
///
/// The sort is stable and ties are broken by UUID, so the result only depends
/// on node content. Without attributes the order is plain UUID order.
pub fn sort_nodes(graph: &EcoGraph, node_type: NodeType, attrs: Option<&[String]>) -> Vec<NodeId> {
    let attrs = attrs.unwrap_or(&[]);
    let mut keyed: Vec<(SortKey, &str, NodeId)> = graph.nodes_of_type(node_type)
        .map(|(id, n)| (attrs.iter().map(|a| n.attr(a)).collect(), n.uuid.as_str(), id))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    keyed.into_iter().map(|(_, _, id)| id).collect()
}

pub fn extract_matrices(graph: &EcoGraph, options: &ExtractOptions) -> Result<MatrixSet, GraphError> {
    if options.characterization && !options.biosphere {
        return Err(GraphError::InvalidValue(
            "the characterization matrix requires the biosphere matrix to be extracted".to_string(),
        ));
    }
    let _timer = StageTimer::start("extracting matrices");

    let production = sort_nodes(graph, NodeType::Production, options.production_sort.as_deref());
    let extension = if options.biosphere {
        sort_nodes(graph, NodeType::Extension, options.extension_sort.as_deref())
    } else {
        Vec::new()
    };
    let characterization = if options.characterization {
        sort_nodes(graph, NodeType::Characterization, options.characterization_sort.as_deref())
    } else {
        Vec::new()
    };

    // Position of every node on its own axis.
    let mut position = vec![usize::MAX; graph.node_count()];
    for axis in [&production, &extension, &characterization] {
        for (pos, id) in axis.iter().enumerate() {
            position[id.index()] = pos;
        }
    }
    let placed = |id: NodeId| position[id.index()] != usize::MAX;

    let mut a = Triplets::default();
    let mut b = Triplets::default();
    let mut q = Triplets::default();
    for edge in graph.edges() {
        let (s, t) = (edge.source, edge.target);
        if !placed(s) || !placed(t) {
            continue;
        }
        let (ps, pt) = (position[s.index()], position[t.index()]);
        match (graph.node(s).node_type, graph.node(t).node_type) {
            (NodeType::Production, NodeType::Production) => a.push(ps, pt, edge.flow),
            (NodeType::Extension, NodeType::Production) => b.push(ps, pt, edge.flow),
            (NodeType::Production, NodeType::Extension) => b.push(pt, ps, edge.flow),
            (NodeType::Characterization, NodeType::Extension) => q.push(ps, pt, edge.flow),
            (NodeType::Extension, NodeType::Characterization) => q.push(pt, ps, edge.flow),
            _ => {}
        }
    }
    debug!(technosphere = a.len(), biosphere = b.len(), characterization = q.len(), "collected matrix entries");

    let labels = |ids: &[NodeId]| -> Vec<NodeUuid> { ids.iter().map(|&id| graph.node(id).uuid.clone()).collect() };
    let (p_labels, e_labels, c_labels) = (labels(&production), labels(&extension), labels(&characterization));

    let production_values: Vec<f64> = production.iter().map(|&id| graph.node(id).production).collect();
    if let Some(j) = production_values.iter().position(|&p| p == 0.0 || !p.is_finite()) {
        return Err(GraphError::InvalidValue(format!(
            "production node {} has reference production {}",
            p_labels[j], production_values[j]
        )));
    }

    let n = production.len();
    let technosphere = LabeledMatrix::new(a.into_data(n, n, options.format), p_labels.clone(), p_labels.clone())?;
    let technosphere_normalized = LabeledMatrix {
        data: technosphere.data.scale_columns(&production_values),
        ..technosphere.clone()
    };

    let (biosphere, biosphere_normalized) = if options.biosphere {
        let m = LabeledMatrix::new(b.into_data(extension.len(), n, options.format), e_labels.clone(), p_labels.clone())?;
        let norm = LabeledMatrix { data: m.data.scale_columns(&production_values), ..m.clone() };
        (Some(m), Some(norm))
    } else {
        (None, None)
    };

    let characterization = if options.characterization {
        Some(LabeledMatrix::new(q.into_data(characterization.len(), extension.len(), options.format), c_labels, e_labels)?)
    } else {
        None
    };

    Ok(MatrixSet {
        technosphere,
        technosphere_normalized,
        biosphere,
        biosphere_normalized,
        characterization,
        production: LabeledVector::new(DVector::from_vec(production_values), p_labels)?,
    })
}

/// Entries collected from the edge list; parallel edges are summed.
#[derive(Default)]
struct Triplets(Vec<(usize, usize, f64)>);

impl Triplets {
    fn push(&mut self, row: usize, col: usize, value: f64) {
        self.0.push((row, col, value));
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn into_data(self, nrows: usize, ncols: usize, format: MatrixFormat) -> MatrixData {
        match format {
            MatrixFormat::Dense => {
                let mut m = DMatrix::zeros(nrows, ncols);
                for (i, j, v) in self.0 {
                    m[(i, j)] += v;
                }
                MatrixData::Dense(m)
            }
            MatrixFormat::Sparse => {
                let mut coo = CooMatrix::new(nrows, ncols);
                for (i, j, v) in self.0 {
                    coo.push(i, j, v);
                }
                MatrixData::Sparse(CsrMatrix::from(&coo))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::edges::{graph_from_edge_lists, EdgeListOptions, EdgeListSystem, EdgeTriple};
    use crate::build::matrix::{graph_from_matrices, BuildOptions, MatrixSystem};
    use crate::store::{Convention, NodeMetadata};
    use rstest::rstest;

    fn matrix_system() -> MatrixSystem {
        MatrixSystem {
            production: DMatrix::from_row_slice(3, 3, &[
                2.0, 0.0, 0.0,
                0.5, 1.0, 0.2,
                0.0, 3.3, 4.0,
            ]),
            extension: DMatrix::from_row_slice(2, 3, &[
                3.5, 2.1, 4.0,
                0.8, 1.5, 0.0,
            ]),
            characterization: Some(DMatrix::from_row_slice(1, 2, &[1.0, 28.0])),
            production_metadata: vec![
                NodeMetadata::new("Product 1", "kg").with("code", "p3"),
                NodeMetadata::new("Product 2", "kg").with("code", "p1"),
                NodeMetadata::new("Product 3", "kg").with("code", "p2"),
            ],
            extension_metadata: vec![
                NodeMetadata::new("CO2", "kg").with("code", "e2"),
                NodeMetadata::new("CH4", "kg").with("code", "e1"),
            ],
            characterization_metadata: vec![NodeMetadata::new("GWP", "kg CO2-eq").with("code", "c1")],
        }
    }

    fn by_index() -> ExtractOptions {
        ExtractOptions { characterization: true, ..Default::default() }.sorted_by(&["index"])
    }

    #[rstest]
    #[case(MatrixFormat::Dense)]
    #[case(MatrixFormat::Sparse)]
    fn test_round_trip_a_convention(#[case] format: MatrixFormat) {
        let s = matrix_system();
        let g = graph_from_matrices(s.clone(), &BuildOptions::new("x", Convention::A).keyed_by("code")).unwrap();
        let m = extract_matrices(&g, &ExtractOptions { format, ..by_index() }).unwrap();

        let mut expected_a = s.production.clone();
        expected_a.fill_diagonal(0.0);
        assert_eq!(m.technosphere.to_dense(), expected_a);
        assert_eq!(m.biosphere.as_ref().unwrap().to_dense(), s.extension);
        assert_eq!(m.characterization.as_ref().unwrap().to_dense(), s.characterization.unwrap());
        assert_eq!(m.production.data.as_slice(), &[2.0, 1.0, 4.0]);
        assert_eq!(m.technosphere.data.is_sparse(), format == MatrixFormat::Sparse);

        let codes: Vec<&str> = m.technosphere.rows.iter().map(|u| u.as_str()).collect();
        assert_eq!(codes, vec!["p3", "p1", "p2"]);
    }

    #[test]
    fn test_normalization_scales_columns() {
        let g = graph_from_matrices(matrix_system(), &BuildOptions::new("x", Convention::A).keyed_by("code")).unwrap();
        let m = extract_matrices(&g, &by_index()).unwrap();

        let a = m.technosphere_normalized.to_dense();
        assert_eq!(a[(1, 0)], 0.25);
        assert_eq!(a[(2, 1)], 3.3);
        assert_eq!(a[(1, 2)], 0.05);

        let b = m.biosphere_normalized.unwrap().to_dense();
        assert_eq!(b[(0, 0)], 1.75);
        assert_eq!(b[(0, 2)], 1.0);
        assert_eq!(b[(1, 1)], 1.5);
    }

    #[test]
    fn test_default_order_is_uuid_order() {
        let g = graph_from_matrices(matrix_system(), &BuildOptions::new("x", Convention::A).keyed_by("code")).unwrap();
        let m = extract_matrices(&g, &ExtractOptions::default()).unwrap();
        let codes: Vec<&str> = m.technosphere.rows.iter().map(|u| u.as_str()).collect();
        assert_eq!(codes, vec!["p1", "p2", "p3"]);
        assert_eq!(m.technosphere.get(&"p1".into(), &"p2".into()), Some(0.2));
        assert_eq!(m.technosphere.get(&"p2".into(), &"p1".into()), Some(3.3));
        assert!(m.characterization.is_none());
    }

    #[test]
    fn test_sort_ties_broken_by_uuid() {
        let g = graph_from_matrices(matrix_system(), &BuildOptions::new("x", Convention::A).keyed_by("code")).unwrap();
        let order = sort_nodes(&g, NodeType::Production, Some(&["unit".to_string()]));
        let codes: Vec<&str> = order.iter().map(|&id| g.node(id).uuid.as_str()).collect();
        assert_eq!(codes, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_characterization_requires_biosphere() {
        let g = EcoGraph::new();
        let opts = ExtractOptions { biosphere: false, characterization: true, ..Default::default() };
        assert!(matches!(extract_matrices(&g, &opts), Err(GraphError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_production_rejected() {
        let system = EdgeListSystem {
            production_metadata: vec![NodeMetadata::new("idle", "kg").with("code", "p").with_production(0.0)],
            ..Default::default()
        };
        let g = graph_from_edge_lists(system, &EdgeListOptions::default()).unwrap();
        assert!(matches!(extract_matrices(&g, &ExtractOptions::default()), Err(GraphError::InvalidValue(_))));
    }

    #[test]
    fn test_parallel_edges_and_directions_sum() {
        let system = EdgeListSystem {
            production_metadata: vec![
                NodeMetadata::new("a", "kg").with("code", "a"),
                NodeMetadata::new("b", "kg").with("code", "b"),
            ],
            extension_metadata: vec![NodeMetadata::new("co2", "kg").with("code", "co2")],
            production_edges: vec![EdgeTriple::new("a", "b", 1.0), EdgeTriple::new("a", "b", 0.5)],
            extension_edges: vec![EdgeTriple::new("b", "co2", 2.0), EdgeTriple::new("co2", "b", 0.25)],
        };
        let g = graph_from_edge_lists(system, &EdgeListOptions::default()).unwrap();
        for format in [MatrixFormat::Dense, MatrixFormat::Sparse] {
            let m = extract_matrices(&g, &ExtractOptions { format, ..Default::default() }).unwrap();
            assert_eq!(m.technosphere.get(&"a".into(), &"b".into()), Some(1.5));
            assert_eq!(m.biosphere.as_ref().unwrap().get(&"co2".into(), &"b".into()), Some(2.25));
        }
    }
}
