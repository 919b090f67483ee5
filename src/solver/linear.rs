use super::sparse::solve_identity_minus;
use crate::analysis::telemetry::StageTimer;
use crate::compute::{LabeledMatrix, LabeledVector, MatrixData, MatrixSet, ResultMatrix};
use crate::error::GraphError;
use crate::store::NodeUuid;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A named group of production nodes, e.g. the activities of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSystem {
    pub name: String,
    pub members: Vec<NodeUuid>,
}

impl SubSystem {
    pub fn new(name: impl Into<String>, members: Vec<NodeUuid>) -> Self {
        Self { name: name.into(), members }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LcaResult {
    /// `x`
    pub production: LabeledVector,
    /// `g`
    pub inventory: LabeledVector,
    /// `h`, present when the matrix set carries a characterization matrix.
    pub impact: Option<LabeledVector>,
}

fn index_of(labels: &[NodeUuid]) -> HashMap<&NodeUuid, usize> {
    labels.iter().enumerate().map(|(i, l)| (l, i)).collect()
}

/// Solves `(I - A) x = f` for the production vector `x`.
///
/// Dense inputs are factorized with a dense LU decomposition, compressed-row
/// inputs with a sparse LU, so a sparse technosphere is never densified.
pub fn production_vector(a: &LabeledMatrix, demand: &HashMap<NodeUuid, f64>) -> Result<LabeledVector, GraphError> {
    if a.rows != a.cols {
        return Err(GraphError::Alignment { left: "technosphere rows", right: "technosphere columns" });
    }
    let _timer = StageTimer::start("solving production vector");

    let index = index_of(&a.rows);
    let mut f = DVector::zeros(a.rows.len());
    for (uuid, &amount) in demand {
        let i = *index.get(uuid).ok_or_else(|| GraphError::UnknownNode(uuid.clone()))?;
        f[i] = amount;
    }

    let n = a.rows.len();
    let x = match &a.data {
        MatrixData::Dense(m) => {
            let system = DMatrix::<f64>::identity(n, n) - m;
            system.lu().solve(&f).ok_or(GraphError::SingularMatrix)?
        }
        MatrixData::Sparse(m) => solve_identity_minus(m, &f)?,
    };
    if x.iter().any(|v| !v.is_finite()) {
        return Err(GraphError::SingularMatrix);
    }
    debug!(nodes = n, demanded = demand.len(), "production vector solved");

    LabeledVector::new(x, a.rows.clone())
}

/// `g = B x`.
pub fn inventory_vector(x: &LabeledVector, b: &LabeledMatrix) -> Result<LabeledVector, GraphError> {
    if b.cols != x.labels {
        return Err(GraphError::Alignment { left: "extension matrix columns", right: "production vector" });
    }
    LabeledVector::new(b.data.mul_vec(&x.data), b.rows.clone())
}

/// `h = Q g`.
pub fn impact_vector(g: &LabeledVector, q: &LabeledMatrix) -> Result<LabeledVector, GraphError> {
    if q.cols != g.labels {
        return Err(GraphError::Alignment { left: "characterization matrix columns", right: "inventory vector" });
    }
    LabeledVector::new(q.data.mul_vec(&g.data), q.rows.clone())
}

/// Inventory attributable to each sub-system: `G = B X`, where column `k` of
/// `X` is `x` restricted to the members of `groups[k]`.
pub fn inventory_matrix(x: &LabeledVector, groups: &[SubSystem], b: &LabeledMatrix) -> Result<ResultMatrix, GraphError> {
    if b.cols != x.labels {
        return Err(GraphError::Alignment { left: "extension matrix columns", right: "production vector" });
    }
    let _timer = StageTimer::start("computing inventory matrix");
    let index = index_of(&x.labels);

    let columns = groups.par_iter()
        .map(|group| -> Result<DVector<f64>, GraphError> {
            let mut masked = DVector::zeros(x.len());
            for member in &group.members {
                let i = *index.get(member).ok_or_else(|| GraphError::UnknownNode(member.clone()))?;
                masked[i] = x.data[i];
            }
            Ok(b.data.mul_vec(&masked))
        })
        .collect::<Result<Vec<DVector<f64>>, GraphError>>()?;

    let data = if columns.is_empty() {
        DMatrix::zeros(b.rows.len(), 0)
    } else {
        DMatrix::from_columns(&columns)
    };
    Ok(ResultMatrix {
        data,
        rows: b.rows.clone(),
        cols: groups.iter().map(|g| g.name.clone()).collect(),
    })
}

/// `H = Q G`.
pub fn impact_matrix(g: &ResultMatrix, q: &LabeledMatrix) -> Result<ResultMatrix, GraphError> {
    if q.cols != g.rows {
        return Err(GraphError::Alignment { left: "characterization matrix columns", right: "inventory matrix rows" });
    }
    Ok(ResultMatrix {
        data: q.data.mul_dense(&g.data),
        rows: q.rows.clone(),
        cols: g.cols.clone(),
    })
}

/// Runs the three solves against the normalized matrices of `matrices`.
pub fn calculate_lca(matrices: &MatrixSet, demand: &HashMap<NodeUuid, f64>) -> Result<LcaResult, GraphError> {
    let b = matrices.biosphere_normalized.as_ref()
        .ok_or_else(|| GraphError::InvalidValue("the matrix set has no biosphere matrix".to_string()))?;

    let production = production_vector(&matrices.technosphere_normalized, demand)?;
    let inventory = inventory_vector(&production, b)?;
    let impact = matrices.characterization.as_ref()
        .map(|q| impact_vector(&inventory, q))
        .transpose()?;

    Ok(LcaResult { production, inventory, impact })
}
