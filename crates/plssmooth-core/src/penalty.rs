// =============================================================================
// Penalty Matrix
// =============================================================================
//
// P is the k × k matrix of the roughness functional
//
//     P[i][j] = ∫ D^m φ_i(t) · D^m φ_j(t) dt
//
// so that cᵀPc = ∫ (D^m f)² for f = Σ c_j φ_j. It must be symmetric and
// positive semi-definite. Quadrature or closed-form integrals can leave
// rounding-level asymmetry, so the builder always returns (P + Pᵀ) / 2.
//
// The difference penalty DᵀD (Eilers & Marx P-splines) is also provided for
// bases that prefer a discrete roughness measure on the coefficients.
//
// =============================================================================

use nalgebra::SymmetricEigen;
use ndarray::{s, Array2};

use crate::basis::{check_derivative_order, BasisProvider};
use crate::convert::{symmetrize, to_dmatrix};
use crate::error::{PlsSmoothError, Result};

/// Default derivative order of the roughness penalty.
pub const DEFAULT_DERIVATIVE_ORDER: usize = 2;

/// Relative tolerance on negative eigenvalues before P is declared indefinite.
const PSD_TOLERANCE: f64 = 1e-8;

/// Build the symmetrized k × k penalty matrix for derivative order `order`.
pub fn penalty_matrix(basis: &dyn BasisProvider, order: usize) -> Result<Array2<f64>> {
    check_derivative_order(basis, order)?;
    let k = basis.dimension();

    let raw = basis.penalty(order)?;
    if raw.nrows() != k || raw.ncols() != k {
        return Err(PlsSmoothError::DimensionMismatch(format!(
            "penalty matrix is {}×{} but the basis has {} functions",
            raw.nrows(),
            raw.ncols(),
            k
        )));
    }
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(PlsSmoothError::InvalidValue(
            "penalty matrix contains non-finite values".to_string(),
        ));
    }

    let penalty = symmetrize(&raw);
    check_positive_semidefinite(&penalty)?;
    Ok(penalty)
}

/// Fail when `penalty` has an eigenvalue meaningfully below zero.
fn check_positive_semidefinite(penalty: &Array2<f64>) -> Result<()> {
    let eigenvalues = SymmetricEigen::new(to_dmatrix(penalty)).eigenvalues;
    let scale = eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let min = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if scale > 0.0 && min < -PSD_TOLERANCE * scale {
        return Err(PlsSmoothError::InvalidValue(format!(
            "penalty matrix is not positive semi-definite (smallest eigenvalue {:.3e})",
            min
        )));
    }
    Ok(())
}

/// Difference penalty DᵀD where D takes `order`-th differences of k coefficients.
///
/// Order 0 gives the identity (a ridge penalty).
pub fn difference_penalty(k: usize, order: usize) -> Result<Array2<f64>> {
    if k == 0 || order >= k {
        return Err(PlsSmoothError::InvalidDerivativeOrder {
            order,
            max: k.saturating_sub(1),
        });
    }

    let mut d = Array2::<f64>::eye(k);
    for _ in 0..order {
        d = &d.slice(s![1.., ..]) - &d.slice(s![..-1, ..]);
    }
    Ok(d.t().dot(&d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BSplineBasis, Domain, FourierBasis};
    use ndarray::{array, Array1};

    /// Returns a slightly asymmetric penalty.
    struct SkewedBasis;

    impl BasisProvider for SkewedBasis {
        fn dimension(&self) -> usize {
            2
        }
        fn domain(&self) -> Domain {
            Domain::Unrestricted
        }
        fn evaluate_derivative(&self, points: &Array1<f64>, _order: usize) -> Result<Array2<f64>> {
            Ok(Array2::ones((points.len(), 2)))
        }
        fn penalty(&self, order: usize) -> Result<Array2<f64>> {
            if order == 1 {
                return Ok(array![[1.0, 0.0], [0.0, -1.0]]);
            }
            Ok(array![[2.0, 1.0 + 1e-14], [1.0, 2.0]])
        }
    }

    #[test]
    fn test_result_is_exactly_symmetric() {
        let p = penalty_matrix(&SkewedBasis, 2).unwrap();
        assert_eq!(p[[0, 1]], p[[1, 0]]);
    }

    #[test]
    fn test_indefinite_penalty_is_rejected() {
        let err = penalty_matrix(&SkewedBasis, 1).unwrap_err();
        assert!(matches!(err, PlsSmoothError::InvalidValue(_)));
    }

    #[test]
    fn test_order_beyond_differentiability() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 8, 2).unwrap();
        assert_eq!(
            penalty_matrix(&basis, 3).unwrap_err(),
            PlsSmoothError::InvalidDerivativeOrder { order: 3, max: 2 }
        );
    }

    #[test]
    fn test_quadrature_penalty_is_psd() {
        let basis = BSplineBasis::uniform((0.0, 5.0), 12, 3).unwrap();
        assert!(penalty_matrix(&basis, 2).is_ok());
        let fourier = FourierBasis::new(7, (0.0, 1.0)).unwrap();
        assert!(penalty_matrix(&fourier, 3).is_ok());
    }

    #[test]
    fn test_difference_penalty_first_order() {
        let p = difference_penalty(3, 1).unwrap();
        assert_eq!(p, array![[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]]);
    }

    #[test]
    fn test_difference_penalty_rows_sum_to_zero() {
        let p = difference_penalty(8, 2).unwrap();
        for row in p.rows() {
            assert_eq!(row.sum(), 0.0);
        }
    }

    #[test]
    fn test_difference_penalty_order_zero_is_ridge() {
        assert_eq!(difference_penalty(3, 0).unwrap(), Array2::eye(3));
    }

    #[test]
    fn test_difference_penalty_order_too_high() {
        assert!(difference_penalty(3, 3).is_err());
    }
}
