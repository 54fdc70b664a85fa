// =============================================================================
// ndarray ↔ nalgebra Conversion Utilities
// =============================================================================
//
// The public API speaks ndarray (`Array1`, `Array2`). Factorizations
// (Cholesky, SVD, symmetric eigen) are done in nalgebra. All crossings between
// the two happen through the helpers below.
//
// =============================================================================

use nalgebra::DMatrix;
use ndarray::Array2;

// =============================================================================
// ndarray → nalgebra
// =============================================================================

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// Works for any memory layout (including transposed views' owned copies).
#[inline]
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

// =============================================================================
// nalgebra → ndarray
// =============================================================================

/// Convert a nalgebra DMatrix to an ndarray Array2.
#[inline]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

/// Symmetrize a square matrix by averaging it with its transpose.
pub fn symmetrize(a: &Array2<f64>) -> Array2<f64> {
    let at = a.t();
    (a + &at) * 0.5
}

// =============================================================================
// Tests
// =============================================================================
