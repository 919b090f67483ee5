//! Graph construction from aligned production / extension / characterization matrices.
use crate::analysis::compose::compose;
use crate::analysis::telemetry::StageTimer;
use crate::error::GraphError;
use crate::identity::tag_records;
use crate::store::{Convention, EcoGraph, NodeMetadata, NodeRecord, NodeType};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Raw matrices plus one metadata list per node type.
///
/// `production` is square (activities x activities), `extension` is
/// flows x activities, `characterization` is indicators x flows.
#[derive(Debug, Clone)]
pub struct MatrixSystem {
    pub production: DMatrix<f64>,
    pub extension: DMatrix<f64>,
    pub characterization: Option<DMatrix<f64>>,
    pub production_metadata: Vec<NodeMetadata>,
    pub extension_metadata: Vec<NodeMetadata>,
    pub characterization_metadata: Vec<NodeMetadata>,
}

impl Default for MatrixSystem {
    fn default() -> Self {
        Self {
            production: DMatrix::zeros(0, 0),
            extension: DMatrix::zeros(0, 0),
            characterization: None,
            production_metadata: Vec::new(),
            extension_metadata: Vec::new(),
            characterization_metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Recorded as `system` on every node.
    pub system: String,
    pub convention: Convention,
    /// Generate v4 UUIDs instead of carrying identifiers through.
    pub assign_new_uuids: bool,
    pub production_uuid_field: String,
    pub extension_uuid_field: String,
    pub characterization_uuid_field: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            system: String::new(),
            convention: Convention::IMinusA,
            assign_new_uuids: true,
            production_uuid_field: "uuid".to_string(),
            extension_uuid_field: "uuid".to_string(),
            characterization_uuid_field: "uuid".to_string(),
        }
    }
}

impl BuildOptions {
    pub fn new(system: impl Into<String>, convention: Convention) -> Self {
        Self { system: system.into(), convention, ..Default::default() }
    }

    /// Carries identifiers through from `field` for every node type.
    pub fn keyed_by(mut self, field: &str) -> Self {
        self.assign_new_uuids = false;
        self.production_uuid_field = field.to_string();
        self.extension_uuid_field = field.to_string();
        self.characterization_uuid_field = field.to_string();
        self
    }
}

/// Builds the composed multigraph of a matrix-shaped system.
///
/// All preconditions are checked before any node is created; on error nothing
/// is returned.
pub fn graph_from_matrices(system: MatrixSystem, options: &BuildOptions) -> Result<EcoGraph, GraphError> {
    let MatrixSystem {
        production: mut p,
        extension: b,
        characterization: q,
        production_metadata: mut prod_meta,
        extension_metadata: mut ext_meta,
        characterization_metadata: mut char_meta,
    } = system;

    check_shapes(&p, &b, q.as_ref(), prod_meta.len(), ext_meta.len(), char_meta.len())?;
    check_finite(&p, "production matrix")?;
    check_finite(&b, "extension matrix")?;
    if let Some(q) = &q {
        check_finite(q, "characterization matrix")?;
    }

    match options.convention {
        Convention::IMinusA => check_non_negative(&p, "production matrix")?,
        Convention::A => {
            if let Some(i) = (0..p.nrows()).find(|&i| p[(i, i)] == 0.0) {
                return Err(GraphError::InvalidValue(format!(
                    "diagonal entry {} of the production matrix is zero; under the 'A' convention it is the reference production",
                    i
                )));
            }
        }
    }

    tag_records(&mut prod_meta, NodeType::Production, &options.system, options.assign_new_uuids, &options.production_uuid_field)?;
    tag_records(&mut ext_meta, NodeType::Extension, &options.system, options.assign_new_uuids, &options.extension_uuid_field)?;
    tag_records(&mut char_meta, NodeType::Characterization, &options.system, options.assign_new_uuids, &options.characterization_uuid_field)?;

    for (i, record) in prod_meta.iter_mut().enumerate() {
        record.production = Some(match options.convention {
            Convention::IMinusA => 1.0,
            Convention::A => p[(i, i)],
        });
    }
    if options.convention == Convention::A {
        p.fill_diagonal(0.0);
    }

    let prod_records = freeze(prod_meta, NodeType::Production, &options.system);
    let ext_records = freeze(ext_meta, NodeType::Extension, &options.system);
    let char_records = freeze(char_meta, NodeType::Characterization, &options.system);

    let technosphere = {
        let timer = StageTimer::start("creating graph from production matrix");
        let g = graph_from_matrix(&p, &prod_records, None);
        timer.sizes(g.node_count(), g.edge_count());
        g
    };
    let biosphere = {
        let timer = StageTimer::start("creating graph from extension matrix");
        let g = graph_from_matrix(&b, &ext_records, Some(&prod_records));
        timer.sizes(g.node_count(), g.edge_count());
        g
    };
    let characterization = q.map(|q| {
        let timer = StageTimer::start("creating graph from characterization matrix");
        let g = graph_from_matrix(&q, &char_records, Some(&ext_records));
        timer.sizes(g.node_count(), g.edge_count());
        g
    });

    let graph = compose([Some(&biosphere), Some(&technosphere), characterization.as_ref()].into_iter().flatten())?;

    check_cardinality(&graph, NodeType::Production, prod_records.len())?;
    check_cardinality(&graph, NodeType::Extension, ext_records.len())?;
    check_cardinality(&graph, NodeType::Characterization, char_records.len())?;
    Ok(graph)
}

/// Builds a (bi)adjacency graph: one edge `row -> col` per non-zero entry,
/// carrying the entry's magnitude as flow.
///
/// With `cols == None` the matrix is square and rows label both axes. Entries
/// are visited row-major so the edge order is reproducible.
pub(crate) fn graph_from_matrix(matrix: &DMatrix<f64>, rows: &[NodeRecord], cols: Option<&[NodeRecord]>) -> EcoGraph {
    let mut g = EcoGraph::new();
    let row_ids: Vec<_> = rows.iter().map(|r| g.insert_node(r.clone()).0).collect();
    let col_ids = match cols {
        Some(cols) => cols.iter().map(|r| g.insert_node(r.clone()).0).collect(),
        None => row_ids.clone(),
    };

    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            let value = matrix[(i, j)];
            if value != 0.0 {
                g.add_edge(row_ids[i], col_ids[j], value.abs(), None);
            }
        }
    }
    g
}

fn freeze(records: Vec<NodeMetadata>, node_type: NodeType, system: &str) -> Vec<NodeRecord> {
    records.into_iter().enumerate().map(|(i, r)| r.into_record(node_type, i, system)).collect()
}

fn check_shapes(
    p: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: Option<&DMatrix<f64>>,
    n_prod: usize,
    n_ext: usize,
    n_char: usize,
) -> Result<(), GraphError> {
    let expect = |what: &str, expected: usize, actual: usize| {
        if expected == actual {
            Ok(())
        } else {
            Err(GraphError::ShapeMismatch { what: what.to_string(), expected, actual })
        }
    };

    expect("production matrix columns (must be square)", p.nrows(), p.ncols())?;
    expect("production matrix dimension vs. production metadata", n_prod, p.nrows())?;
    expect("extension matrix rows vs. extension metadata", n_ext, b.nrows())?;
    expect("extension matrix columns vs. production dimension", p.nrows(), b.ncols())?;
    match q {
        Some(q) => {
            expect("characterization matrix columns vs. extension rows", b.nrows(), q.ncols())?;
            expect("characterization matrix rows vs. characterization metadata", n_char, q.nrows())?;
        }
        None => expect("characterization metadata without a characterization matrix", 0, n_char)?,
    }
    Ok(())
}

pub(crate) fn check_finite(m: &DMatrix<f64>, matrix: &'static str) -> Result<(), GraphError> {
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            if !m[(i, j)].is_finite() {
                return Err(GraphError::NonNumeric { matrix, row: i, col: j });
            }
        }
    }
    Ok(())
}

fn check_non_negative(m: &DMatrix<f64>, matrix: &'static str) -> Result<(), GraphError> {
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            let value = m[(i, j)];
            if value < 0.0 {
                return Err(GraphError::NegativeEntry { matrix, row: i, col: j, value });
            }
        }
    }
    Ok(())
}

pub(crate) fn check_cardinality(graph: &EcoGraph, node_type: NodeType, expected: usize) -> Result<(), GraphError> {
    let actual = graph.count_of_type(node_type);
    if actual != expected {
        return Err(GraphError::CardinalityMismatch { node_type, expected, actual });
    }
    Ok(())
}
