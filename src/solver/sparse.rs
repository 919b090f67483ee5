//! Sparse direct factorization of `(I - A)` for compressed-row technospheres.
use crate::error::GraphError;
use faer::prelude::*;
use faer::sparse::SparseColMat;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

/// Solves `(I - A) x = f` with a sparse LU decomposition.
///
/// The diagonal of `A` is folded into the identity during assembly, so a
/// column that cancels out leaves no stored entry and is reported as
/// singular by the symbolic phase.
pub(crate) fn solve_identity_minus(a: &CsrMatrix<f64>, f: &DVector<f64>) -> Result<DVector<f64>, GraphError> {
    let n = a.nrows();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }

    let mut diagonal = vec![1.0; n];
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(a.nnz() + n);
    for (i, row) in a.row_iter().enumerate() {
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            if i == j {
                diagonal[i] -= v;
            } else if v != 0.0 {
                triplets.push((i, j, -v));
            }
        }
    }
    triplets.extend(diagonal.iter().enumerate().filter(|(_, d)| **d != 0.0).map(|(i, &d)| (i, i, d)));

    let system = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
        .map_err(|e| GraphError::InvalidValue(format!("cannot assemble (I - A): {:?}", e)))?;
    let lu = system.as_ref().sp_lu().map_err(|_| GraphError::SingularMatrix)?;

    let rhs = Mat::<f64>::from_fn(n, 1, |i, _| f[i]);
    let x = lu.solve(rhs.as_ref());
    Ok(DVector::from_fn(n, |i, _| x.read(i, 0)))
}
