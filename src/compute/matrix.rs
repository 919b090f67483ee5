//! Matrices and vectors whose coordinates are labelled with node UUIDs.
use super::kernel;
use crate::error::GraphError;
use crate::store::NodeUuid;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;
use std::collections::HashMap;

/// Dense or compressed-row numeric storage.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    Dense(DMatrix<f64>),
    Sparse(CsrMatrix<f64>),
}

impl MatrixData {
    pub fn nrows(&self) -> usize {
        match self {
            MatrixData::Dense(m) => m.nrows(),
            MatrixData::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            MatrixData::Dense(m) => m.ncols(),
            MatrixData::Sparse(m) => m.ncols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, MatrixData::Sparse(_))
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            MatrixData::Dense(m) => m.clone(),
            MatrixData::Sparse(m) => convert_csr_dense(m),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            MatrixData::Dense(m) => m[(row, col)],
            MatrixData::Sparse(m) => {
                let r = m.row(row);
                r.col_indices().iter()
                    .position(|&c| c == col)
                    .map_or(0.0, |k| r.values()[k])
            }
        }
    }

    /// `self * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        match self {
            MatrixData::Dense(m) => m * x,
            MatrixData::Sparse(m) => DVector::from_iterator(
                m.nrows(),
                m.row_iter().map(|row| {
                    row.col_indices().iter().zip(row.values()).map(|(&c, v)| v * x[c]).sum::<f64>()
                }),
            ),
        }
    }

    /// `self * rhs`, always dense.
    pub fn mul_dense(&self, rhs: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            MatrixData::Dense(m) => m * rhs,
            MatrixData::Sparse(_) => {
                let mut out = DMatrix::zeros(self.nrows(), rhs.ncols());
                for j in 0..rhs.ncols() {
                    out.set_column(j, &self.mul_vec(&rhs.column(j).into_owned()));
                }
                out
            }
        }
    }

    /// Divides column `j` by `divisors[j]`.
    pub fn scale_columns(&self, divisors: &[f64]) -> MatrixData {
        match self {
            MatrixData::Dense(m) => {
                let mut out = m.clone();
                let nrows = out.nrows();
                let values = out.as_mut_slice();
                for (j, &d) in divisors.iter().enumerate() {
                    kernel::divide_scalar(&mut values[j * nrows..(j + 1) * nrows], d);
                }
                MatrixData::Dense(out)
            }
            MatrixData::Sparse(m) => {
                let mut out = m.clone();
                let gathered: Vec<f64> = out.col_indices().iter().map(|&c| divisors[c]).collect();
                kernel::divide_elementwise(out.values_mut(), &gathered);
                MatrixData::Sparse(out)
            }
        }
    }
}

/// A matrix with node UUIDs on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub data: MatrixData,
    pub rows: Vec<NodeUuid>,
    pub cols: Vec<NodeUuid>,
}

impl LabeledMatrix {
    pub fn new(data: MatrixData, rows: Vec<NodeUuid>, cols: Vec<NodeUuid>) -> Result<Self, GraphError> {
        if data.nrows() != rows.len() {
            return Err(GraphError::ShapeMismatch { what: "matrix rows vs. row labels".into(), expected: rows.len(), actual: data.nrows() });
        }
        if data.ncols() != cols.len() {
            return Err(GraphError::ShapeMismatch { what: "matrix columns vs. column labels".into(), expected: cols.len(), actual: data.ncols() });
        }
        Ok(Self { data, rows, cols })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }

    /// Entry addressed by labels.
    pub fn get(&self, row: &NodeUuid, col: &NodeUuid) -> Option<f64> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.cols.iter().position(|c| c == col)?;
        Some(self.data.get(i, j))
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        self.data.to_dense()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledVector {
    pub data: DVector<f64>,
    pub labels: Vec<NodeUuid>,
}

impl LabeledVector {
    pub fn new(data: DVector<f64>, labels: Vec<NodeUuid>) -> Result<Self, GraphError> {
        if data.len() != labels.len() {
            return Err(GraphError::ShapeMismatch { what: "vector length vs. labels".into(), expected: labels.len(), actual: data.len() });
        }
        Ok(Self { data, labels })
    }

    pub fn get(&self, label: &NodeUuid) -> Option<f64> {
        self.labels.iter().position(|l| l == label).map(|i| self.data[i])
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_map(&self) -> HashMap<NodeUuid, f64> {
        self.labels.iter().cloned().zip(self.data.iter().copied()).collect()
    }

    /// Splits into parallel `(labels, values)` columns, in axis order.
    pub fn to_columns(&self) -> (Vec<String>, Vec<f64>) {
        (
            self.labels.iter().map(|l| l.to_string()).collect(),
            self.data.iter().copied().collect(),
        )
    }
}

/// Dense result whose columns are sub-systems rather than nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    pub data: DMatrix<f64>,
    pub rows: Vec<NodeUuid>,
    pub cols: Vec<String>,
}

impl ResultMatrix {
    pub fn column(&self, name: &str) -> Option<LabeledVector> {
        let j = self.cols.iter().position(|c| c == name)?;
        Some(LabeledVector { data: self.data.column(j).into_owned(), labels: self.rows.clone() })
    }

    pub fn get(&self, row: &NodeUuid, col: &str) -> Option<f64> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.cols.iter().position(|c| c == col)?;
        Some(self.data[(i, j)])
    }
}
