// =============================================================================
// Regularized Solver: Penalized Least Squares at a Fixed λ
// =============================================================================
//
// For a fixed smoothing parameter λ we minimize
//
//     ‖y − Bc‖² + λ cᵀPc
//
// whose minimizer solves the penalized normal equations
//
//     (BᵀB + λP) c = Bᵀy        i.e.  M c = Bᵀy
//
// SQUARE-ROOT FORM
// ----------------
// M is never formed. Forming it squares the condition number, and for large λ
// the λP term swamps the part of BᵀB that lives in the null space of P, which
// is exactly the part the fit converges to. `RegularizedSolver::new` caches
//
//     B = Q_B R_B        (thin QR, R_B is r × k with r = min(n, k))
//     P = U D² Uᵀ        (symmetric eigendecomposition, D ≥ 0)
//
// In the eigenbasis of P, c = U a, the system becomes M̃ = UᵀMU = ZᵀZ with
//
//     Z(λ) = ⎡ R_B U ⎤      ((r + k) × k)
//            ⎣ √λ D  ⎦
//
// Column j of Z is then divided by its norm sⱼ = ‖(R_B U)ⱼ‖ ⊕ √λ dⱼ, giving
// W = Z S⁻¹ with unit columns. Penalized directions shrink to O(1) entries
// however large λ is, so the conditioning of W does not grow with λ and the
// null space of P keeps full precision. Bᵀy = R_Bᵀ z with z = Q_Bᵀy, so a λ
// search never touches the n × k design again.
//
// FACTORIZATION STRATEGY
// ----------------------
//   1. Cholesky: the triangular factor R of a QR of W satisfies
//      RᵀR = S⁻¹M̃S⁻¹. It is accepted when its pivot ratio
//      min|Rᵢᵢ| / max|Rᵢᵢ| is at least `min_reciprocal_condition`.
//   2. Otherwise an SVD of W, with singular values below
//      `pseudo_inverse_tolerance · σ_max` dropped. When M is rank deficient
//      (λ = 0 with n < k) this picks the solution of least norm in the
//      scaled coordinates.
//
// Either path yields T with (WᵀW)⁻¹ = TTᵀ (T = R⁻¹, or VΣ⁺), and the root
// inverse of M is U S⁻¹ T. Only when the SVD itself is impossible (non-finite
// W, no convergence, or a zero matrix) do we report `SingularSystem`.
//
// EFFECTIVE DEGREES OF FREEDOM
// ----------------------------
// The hat matrix H = B M⁻¹ Bᵀ is n × n and never formed. With
// G = R_B U S⁻¹ T (r × k), H = Q_B G Gᵀ Q_Bᵀ and therefore
//
//     tr(H)  = ‖G‖²_F
//     tr(H²) = ‖GᵀG‖²_F
//
// =============================================================================

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};

use crate::convert::{symmetrize, to_array2, to_dmatrix};
use crate::error::{PlsSmoothError, Result};

/// Relative tolerance on negative penalty eigenvalues before P is rejected.
const PENALTY_PSD_TOLERANCE: f64 = 1e-8;

/// Penalty eigenvalues below this fraction of the largest are the null space
/// of P. Rounding leaves them at about ε·‖P‖, which √λ would otherwise amplify.
const PENALTY_NULL_TOLERANCE: f64 = 1e-12;

/// Numerical thresholds for the factorization strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Cholesky is rejected in favour of the pseudo-inverse when the pivot
    /// ratio min|Rᵢᵢ| / max|Rᵢᵢ| of the factor falls below this value.
    /// Default: 1e-12
    pub min_reciprocal_condition: f64,

    /// Singular values of the scaled stacked root below
    /// `pseudo_inverse_tolerance · σ_max` are treated as zero.
    /// Default: 1e-12
    pub pseudo_inverse_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            min_reciprocal_condition: 1e-12,
            pseudo_inverse_tolerance: 1e-12,
        }
    }
}

/// Factorization used for a particular solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    Cholesky,
    PseudoInverse,
}

/// Result of solving the penalized system at one λ.
///
/// Matrices hold one column per response curve.
#[derive(Debug, Clone)]
pub struct PenalizedSolution {
    /// Smoothing parameter used
    pub lambda: f64,

    /// Coefficients c (k × m)
    pub coefficients: Array2<f64>,

    /// Fitted values Bc (n × m)
    pub fitted_values: Array2<f64>,

    /// Residuals y − Bc (n × m)
    pub residuals: Array2<f64>,

    /// Residual sum of squares of each response column
    pub rss: Array1<f64>,

    /// Effective degrees of freedom tr(H)
    pub effective_df: f64,

    /// tr(H²), used by robust GCV
    pub hat_trace_squared: f64,

    /// M⁻¹ = (BᵀB + λP)⁻¹, or its pseudo-inverse
    pub covariance_unscaled: Array2<f64>,

    /// Factorization that produced this solution
    pub method: SolveMethod,
}

impl PenalizedSolution {
    /// RSS averaged over response columns.
    pub fn mean_rss(&self) -> f64 {
        self.rss.mean().unwrap_or(0.0)
    }
}

/// Penalized least squares solver with the roots of BᵀB and P cached across λ.
#[derive(Debug, Clone)]
pub struct RegularizedSolver {
    design: Array2<f64>,
    response: Array2<f64>,
    /// R_B U, the design root in the eigenbasis of P (r × k)
    design_root: DMatrix<f64>,
    /// Q_Bᵀ Y (r × m)
    projected_response: DMatrix<f64>,
    /// Eigenvectors U of P
    penalty_basis: DMatrix<f64>,
    /// D, square roots of the eigenvalues of P, with its null space set to zero
    penalty_sqrt: DVector<f64>,
    config: SolverConfig,
}

impl RegularizedSolver {
    /// Set up the solver for design B (n × k), penalty P (k × k) and
    /// responses Y (n × m, one curve per column).
    pub fn new(
        design: Array2<f64>,
        penalty: Array2<f64>,
        response: Array2<f64>,
        config: SolverConfig,
    ) -> Result<Self> {
        let (n, k) = design.dim();

        if n == 0 || k == 0 {
            return Err(PlsSmoothError::EmptyInput(format!(
                "design matrix is {}×{}",
                n, k
            )));
        }
        if penalty.dim() != (k, k) {
            return Err(PlsSmoothError::DimensionMismatch(format!(
                "penalty is {}×{} but the design matrix has {} columns",
                penalty.nrows(),
                penalty.ncols(),
                k
            )));
        }
        if response.nrows() != n {
            return Err(PlsSmoothError::DimensionMismatch(format!(
                "design matrix has {} rows but the response has {}",
                n,
                response.nrows()
            )));
        }
        if response.ncols() == 0 {
            return Err(PlsSmoothError::EmptyInput("no response columns".to_string()));
        }
        if response.iter().any(|v| !v.is_finite()) {
            return Err(PlsSmoothError::InvalidValue(
                "response contains non-finite values".to_string(),
            ));
        }

        let (penalty_basis, penalty_sqrt) = penalty_root(&penalty)?;
        let qr = to_dmatrix(&design).qr();
        let projected_response = qr.q().tr_mul(&to_dmatrix(&response));
        let design_root = qr.r() * &penalty_basis;

        Ok(Self {
            design,
            response,
            design_root,
            projected_response,
            penalty_basis,
            penalty_sqrt,
            config,
        })
    }

    /// Convenience constructor for a single response vector.
    pub fn single(
        design: Array2<f64>,
        penalty: Array2<f64>,
        y: &Array1<f64>,
        config: SolverConfig,
    ) -> Result<Self> {
        let response = y.view().insert_axis(Axis(1)).to_owned();
        Self::new(design, penalty, response, config)
    }

    /// Number of observations n.
    pub fn n_obs(&self) -> usize {
        self.design.nrows()
    }

    /// Basis dimension k.
    pub fn n_basis(&self) -> usize {
        self.design.ncols()
    }

    /// Number of response curves m.
    pub fn n_responses(&self) -> usize {
        self.response.ncols()
    }

    pub fn design(&self) -> &Array2<f64> {
        &self.design
    }

    pub fn response(&self) -> &Array2<f64> {
        &self.response
    }

    /// Solve (BᵀB + λP) c = Bᵀy at a fixed λ ≥ 0.
    pub fn solve(&self, lambda: f64) -> Result<PenalizedSolution> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(PlsSmoothError::InvalidValue(format!(
                "smoothing parameter must be finite and non-negative, got {}",
                lambda
            )));
        }

        let (w, column_scale) = self.scaled_root(lambda);
        if w.iter().any(|v| !v.is_finite()) {
            return Err(PlsSmoothError::SingularSystem(format!(
                "penalized system is not finite at λ = {:e}",
                lambda
            )));
        }

        let (method, mut scaled_inv) = match self.cholesky_root_inverse(&w) {
            Some(t) => (SolveMethod::Cholesky, t),
            None => (SolveMethod::PseudoInverse, self.pseudo_root_inverse(w, lambda)?),
        };
        log::trace!("λ = {:e} solved via {:?}", lambda, method);

        // S⁻¹ T
        for (mut row, &s) in scaled_inv.row_iter_mut().zip(column_scale.iter()) {
            row /= s;
        }
        let root_inv = &self.penalty_basis * &scaled_inv;

        let g = &self.design_root * &scaled_inv;
        let effective_df = g.norm_squared();
        if !effective_df.is_finite() {
            return Err(PlsSmoothError::SingularSystem(format!(
                "penalized solve lost precision at λ = {:e}",
                lambda
            )));
        }
        let hat_trace_squared = g.tr_mul(&g).norm_squared();

        let coefficients = to_array2(&(&root_inv * g.tr_mul(&self.projected_response)));
        let covariance_unscaled = to_array2(&(&root_inv * root_inv.transpose()));

        let fitted_values = self.design.dot(&coefficients);
        let residuals = &self.response - &fitted_values;
        let rss = residuals.mapv(|r| r * r).sum_axis(Axis(0));

        Ok(PenalizedSolution {
            lambda,
            coefficients,
            fitted_values,
            residuals,
            rss,
            effective_df,
            hat_trace_squared,
            covariance_unscaled,
            method,
        })
    }

    /// W(λ) = [R_B U; √λ D] S⁻¹ together with the column norms S.
    fn scaled_root(&self, lambda: f64) -> (DMatrix<f64>, DVector<f64>) {
        let r = self.design_root.nrows();
        let k = self.n_basis();
        let sqrt_lambda = lambda.sqrt();

        let mut w = DMatrix::zeros(r + k, k);
        let mut column_scale = DVector::from_element(k, 1.0);
        for j in 0..k {
            let top = self.design_root.column(j);
            let bottom = sqrt_lambda * self.penalty_sqrt[j];
            let norm = top.norm().hypot(bottom);
            // a zero column stays zero and is left to the pseudo-inverse
            let s = if norm > 0.0 { norm } else { 1.0 };
            w.view_mut((0, j), (r, 1)).copy_from(&top.unscale(s));
            w[(r + j, j)] = bottom / s;
            column_scale[j] = s;
        }
        (w, column_scale)
    }

    /// R⁻¹ from the QR factor of W; `None` when R is (numerically) singular.
    fn cholesky_root_inverse(&self, w: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        let r = w.clone().qr().r();

        let pivots = r.diagonal().map(f64::abs);
        let max = pivots.max();
        let min = pivots.min();
        let rcond = if max > 0.0 { min / max } else { 0.0 };
        if rcond.is_nan() || rcond < self.config.min_reciprocal_condition {
            log::debug!(
                "Cholesky pivot ratio {:.3e} below threshold, switching to pseudo-inverse",
                rcond
            );
            return None;
        }
        log::trace!("Cholesky pivot ratio {:.3e}", rcond);

        let k = r.ncols();
        r.solve_upper_triangular(&DMatrix::identity(k, k))
    }

    /// VΣ⁺ from an SVD of W.
    fn pseudo_root_inverse(&self, w: DMatrix<f64>, lambda: f64) -> Result<DMatrix<f64>> {
        let svd = w.try_svd(false, true, f64::EPSILON, 0).ok_or_else(|| {
            PlsSmoothError::SingularSystem(format!(
                "SVD of the penalized system did not converge at λ = {:e}",
                lambda
            ))
        })?;
        let v_t = svd.v_t.ok_or_else(|| {
            PlsSmoothError::SingularSystem("SVD did not return right singular vectors".to_string())
        })?;

        let sigma_max = svd.singular_values.max();
        if sigma_max <= 0.0 {
            return Err(PlsSmoothError::SingularSystem(format!(
                "BᵀB + λP has rank zero at λ = {:e}; design and penalty are jointly degenerate",
                lambda
            )));
        }

        let cutoff = self.config.pseudo_inverse_tolerance * sigma_max;
        let rank = svd.singular_values.iter().filter(|&&s| s > cutoff).count();
        log::debug!(
            "pseudo-inverse solve at λ = {:e}: numerical rank {} of {}",
            lambda,
            rank,
            self.n_basis()
        );

        let mut root_inv = v_t.transpose();
        for (mut column, &sigma) in root_inv.column_iter_mut().zip(svd.singular_values.iter()) {
            let scale = if sigma > cutoff { sigma.recip() } else { 0.0 };
            column *= scale;
        }
        Ok(root_inv)
    }
}

/// Eigenvectors U and root eigenvalues D of the symmetrized P, so P = U D² Uᵀ.
fn penalty_root(penalty: &Array2<f64>) -> Result<(DMatrix<f64>, DVector<f64>)> {
    if penalty.iter().any(|v| !v.is_finite()) {
        return Err(PlsSmoothError::InvalidValue(
            "penalty contains non-finite values".to_string(),
        ));
    }
    let eigen = SymmetricEigen::new(to_dmatrix(&symmetrize(penalty)));
    let scale = eigen.eigenvalues.amax();
    let min = eigen.eigenvalues.min();
    if scale > 0.0 && min < -PENALTY_PSD_TOLERANCE * scale {
        return Err(PlsSmoothError::InvalidValue(format!(
            "penalty is not positive semi-definite (smallest eigenvalue {:.3e})",
            min
        )));
    }

    let null_cutoff = PENALTY_NULL_TOLERANCE * scale;
    let sqrt_values = eigen
        .eigenvalues
        .map(|value| if value > null_cutoff { value.sqrt() } else { 0.0 });
    Ok((eigen.eigenvectors, sqrt_values))
}

// =============================================================================
// Tests
// =============================================================================
