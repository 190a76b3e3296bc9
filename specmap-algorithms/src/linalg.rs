//! Bridge between `ndarray` storage and `nalgebra` decompositions.
#![allow(clippy::cast_precision_loss)]

use nalgebra::{DMatrix, DVector, SymmetricEigen, SVD};
use ndarray::{Array1, Array2};
use specmap_core::{Error, Result};

/// Tolerance used for pseudo-inverses.
pub(crate) const PINV_EPS: f64 = 1e-12;

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

pub(crate) fn from_dvector(v: &DVector<f64>) -> Array1<f64> {
    Array1::from_iter(v.iter().copied())
}

/// Moore-Penrose pseudo-inverse.
pub(crate) fn pseudo_inverse(m: DMatrix<f64>) -> Result<DMatrix<f64>> {
    m.pseudo_inverse(PINV_EPS)
        .map_err(|e| Error::Decomposition(e.to_string()))
}

/// Thin SVD with singular values sorted in descending order.
pub(crate) struct SortedSvd {
    pub u: DMatrix<f64>,
    pub singular_values: DVector<f64>,
    pub v_t: DMatrix<f64>,
}

pub(crate) fn sorted_svd(m: DMatrix<f64>) -> Result<SortedSvd> {
    let svd = SVD::new(m, true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::Decomposition("SVD did not produce U".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::Decomposition("SVD did not produce V^T".into()))?;
    let order = descending_order(svd.singular_values.as_slice());

    let rank = order.len();
    let u_sorted = DMatrix::from_fn(u.nrows(), rank, |i, j| u[(i, order[j])]);
    let v_t_sorted = DMatrix::from_fn(rank, v_t.ncols(), |i, j| v_t[(order[i], j)]);
    let s_sorted = DVector::from_fn(rank, |i, _| svd.singular_values[order[i]]);
    Ok(SortedSvd {
        u: u_sorted,
        singular_values: s_sorted,
        v_t: v_t_sorted,
    })
}

/// Eigen-decomposition of a symmetric matrix, sorted by descending eigenvalue.
///
/// Returns the eigenvalues and a matrix whose columns are the eigenvectors.
pub(crate) fn sorted_symmetric_eigen(m: DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eigen = SymmetricEigen::new(m);
    let order = descending_order(eigen.eigenvalues.as_slice());
    let n = order.len();
    let values = DVector::from_fn(n, |i, _| eigen.eigenvalues[order[i]]);
    let vectors = DMatrix::from_fn(eigen.eigenvectors.nrows(), n, |i, j| {
        eigen.eigenvectors[(i, order[j])]
    });
    (values, vectors)
}

fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Flips each column so its largest-magnitude entry is positive.
pub(crate) fn normalize_column_signs(m: &mut DMatrix<f64>) {
    for mut column in m.column_iter_mut() {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            column.neg_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_round_trip_conversion() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = to_dmatrix(&a);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(from_dmatrix(&m), a);
    }

    #[test]
    fn test_sorted_svd_descending() {
        let a = array![[1.0, 0.0], [0.0, 5.0], [0.0, 0.0]];
        let svd = sorted_svd(to_dmatrix(&a)).unwrap();
        assert_abs_diff_eq!(svd.singular_values[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(svd.singular_values[1], 1.0, epsilon = 1e-12);
        let rebuilt = &svd.u * DMatrix::from_diagonal(&svd.singular_values) * &svd.v_t;
        for (got, want) in from_dmatrix(&rebuilt).iter().zip(a.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sorted_eigen() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 3.0]);
        let (values, vectors) = sorted_symmetric_eigen(m);
        assert_abs_diff_eq!(values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vectors[(1, 0)].abs(), 1.0, epsilon = 1e-12);
    }
}
