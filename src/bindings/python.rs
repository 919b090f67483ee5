use crate::build::matrix::{graph_from_matrices, BuildOptions, MatrixSystem};
use crate::compute::extract::{extract_matrices, ExtractOptions};
use crate::error::GraphError;
use crate::io;
use crate::solver::linear;
use crate::compute::LabeledVector;
use crate::store::{Convention, EcoGraph, NodeMetadata, NodeType, NodeUuid};
use nalgebra::DMatrix;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pythonize::depythonize;
use std::collections::HashMap;

/// Coordinate labels next to their values.
type Labelled = (Vec<String>, Vec<f64>);

impl From<GraphError> for PyErr {
    fn from(err: GraphError) -> PyErr {
        match err {
            GraphError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

fn to_matrix(rows: &[Vec<f64>], ncols_if_empty: usize, what: &str) -> PyResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(ncols_if_empty, |r| r.len());
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(PyValueError::new_err(format!("{} has rows of different lengths", what)));
    }
    Ok(DMatrix::from_row_iterator(rows.len(), ncols, rows.iter().flatten().copied()))
}

/// Reads a list of dicts. Numbers, lists and nested dicts keep their type.
fn to_metadata(records: &Bound<'_, PyAny>) -> PyResult<Vec<NodeMetadata>> {
    let value: serde_json::Value = depythonize(records)?;
    Ok(serde_json::from_value(value).map_err(GraphError::from)?)
}

#[pyclass(name = "Graph")]
#[derive(Debug, Clone, Default)]
pub struct PyGraph {
    pub inner: EcoGraph,
}

#[pymethods]
impl PyGraph {
    #[new]
    pub fn new() -> Self { Self::default() }

    #[staticmethod]
    #[pyo3(signature = (
        production, extension, production_metadata, extension_metadata,
        system, convention = "I-A", characterization = None, characterization_metadata = None, uuid_field = None
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn from_matrices(
        production: Vec<Vec<f64>>,
        extension: Vec<Vec<f64>>,
        production_metadata: &Bound<'_, PyAny>,
        extension_metadata: &Bound<'_, PyAny>,
        system: String,
        convention: &str,
        characterization: Option<Vec<Vec<f64>>>,
        characterization_metadata: Option<&Bound<'_, PyAny>>,
        uuid_field: Option<String>,
    ) -> PyResult<Self> {
        let convention: Convention = convention.parse()?;
        let n = production.len();
        let production = to_matrix(&production, n, "production")?;
        let extension = to_matrix(&extension, n, "extension")?;
        let characterization = characterization
            .map(|q| to_matrix(&q, extension.nrows(), "characterization"))
            .transpose()?;

        let system_data = MatrixSystem {
            production,
            extension,
            characterization,
            production_metadata: to_metadata(production_metadata)?,
            extension_metadata: to_metadata(extension_metadata)?,
            characterization_metadata: characterization_metadata.map(to_metadata).transpose()?.unwrap_or_default(),
        };
        let mut options = BuildOptions::new(system, convention);
        if let Some(field) = uuid_field {
            options = options.keyed_by(&field);
        }
        Ok(Self { inner: graph_from_matrices(system_data, &options)? })
    }

    #[staticmethod]
    pub fn load(path: &str) -> PyResult<Self> {
        Ok(Self { inner: io::load_json(path)? })
    }

    pub fn save(&self, path: &str) -> PyResult<()> {
        Ok(io::save_json(&self.inner, path)?)
    }

    pub fn to_json(&self) -> PyResult<String> {
        Ok(serde_json::to_string(&self.inner).map_err(GraphError::from)?)
    }

    pub fn node_count(&self) -> usize { self.inner.node_count() }

    pub fn edge_count(&self) -> usize { self.inner.edge_count() }

    /// Number of nodes of type `production`, `extension` or `characterization`.
    pub fn count_of_type(&self, node_type: &str) -> PyResult<usize> {
        let t = match node_type {
            "production" => NodeType::Production,
            "extension" => NodeType::Extension,
            "characterization" => NodeType::Characterization,
            _ => return Err(PyValueError::new_err(format!("Unknown node type '{}'", node_type))),
        };
        Ok(self.inner.count_of_type(t))
    }

    pub fn uuids(&self, node_type: &str) -> PyResult<Vec<String>> {
        self.count_of_type(node_type)?;
        Ok(self.inner.nodes()
            .filter(|(_, n)| n.node_type.as_str() == node_type)
            .map(|(_, n)| n.uuid.to_string())
            .collect())
    }
}

/// Returns `(x, g, h)`, each as `(uuids, values)` with axes sorted by `sort`
/// (UUID order by default). `h` is empty when the graph has no
/// characterization nodes.
#[pyfunction]
#[pyo3(signature = (graph, demand, sort = None))]
pub fn calculate_lca(
    graph: &PyGraph,
    demand: HashMap<String, f64>,
    sort: Option<Vec<String>>,
) -> PyResult<(Labelled, Labelled, Labelled)> {
    let options = ExtractOptions {
        characterization: graph.inner.count_of_type(NodeType::Characterization) > 0,
        production_sort: sort.clone(),
        extension_sort: sort.clone(),
        characterization_sort: sort,
        ..Default::default()
    };
    let matrices = extract_matrices(&graph.inner, &options)?;
    let demand: HashMap<NodeUuid, f64> = demand.into_iter().map(|(k, v)| (NodeUuid::from(k), v)).collect();
    let result = linear::calculate_lca(&matrices, &demand)?;

    Ok((
        result.production.to_columns(),
        result.inventory.to_columns(),
        result.impact.as_ref().map(LabeledVector::to_columns).unwrap_or_default(),
    ))
}

/// Defines the `_core` Python module.
#[pymodule]
pub fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGraph>()?;
    m.add_function(wrap_pyfunction!(calculate_lca, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AttrValue;
    use pyo3::types::{PyDict, PyList};

    #[test]
    fn test_metadata_keeps_python_types() {
        Python::initialize();
        Python::attach(|py| {
            let record = PyDict::new(py);
            record.set_item("name", "Steel").unwrap();
            record.set_item("unit", "kg").unwrap();
            record.set_item("production", 2.0).unwrap();
            record.set_item("index", 0).unwrap();
            record.set_item("classifications", vec![("ISIC", "2410")]).unwrap();
            let records = PyList::new(py, [record]).unwrap();

            let meta = to_metadata(records.as_any()).unwrap();
            assert_eq!(meta[0].production, Some(2.0));
            assert_eq!(meta[0].index, Some(0));
            assert!(matches!(meta[0].extra.get("classifications"), Some(AttrValue::List(items)) if items.len() == 1));
        });
    }

    #[test]
    fn test_lca_results_carry_labels() {
        Python::initialize();
        Python::attach(|py| {
            let meta = |names: &[&str], unit: &str| {
                let list = PyList::empty(py);
                for &name in names {
                    let record = PyDict::new(py);
                    record.set_item("name", name).unwrap();
                    record.set_item("unit", unit).unwrap();
                    record.set_item("uuid", name).unwrap();
                    list.append(record).unwrap();
                }
                list
            };
            let graph = PyGraph::from_matrices(
                vec![vec![0.0, 0.0], vec![0.5, 0.0]],
                vec![vec![2.0, 4.0]],
                meta(&["b", "a"], "kg").as_any(),
                meta(&["co2"], "kg").as_any(),
                "test".to_string(),
                "I-A",
                None,
                None,
                Some("uuid".to_string()),
            ).unwrap();

            let demand: HashMap<String, f64> = [("b".to_string(), 1.0)].into_iter().collect();
            let ((x_labels, x), (g_labels, g), (h_labels, _)) = calculate_lca(&graph, demand, None).unwrap();

            assert_eq!(x_labels, vec!["a".to_string(), "b".to_string()]);
            assert!((x[0] - 0.5).abs() < 1e-12 && (x[1] - 1.0).abs() < 1e-12);
            assert_eq!(g_labels, vec!["co2".to_string()]);
            assert!((g[0] - 4.0).abs() < 1e-12);
            assert!(h_labels.is_empty());
        });
    }
}
