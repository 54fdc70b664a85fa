// =============================================================================
// plssmooth Core Library
// =============================================================================
//
// Penalized least squares smoothing of functional data. A curve observed at
// noisy samples (tᵢ, yᵢ) is represented in a finite basis, f(t) = Σ cⱼ φⱼ(t),
// and the coefficients minimize
//
//     ‖y − Bc‖² + λ cᵀPc
//
// where B is the design matrix and P the integrated squared m-th derivative
// penalty. λ is either given or selected by generalized cross-validation.
//
// STRUCTURE:
// ----------
//   - basis:       BasisProvider trait plus polynomial, B-spline and Fourier bases
//   - design:      design matrix B from sample points
//   - penalty:     roughness penalty P (and the discrete difference penalty)
//   - solvers:     penalized solve at fixed λ, GCV / robust GCV λ selection
//   - smoother:    Smoother, fit and fit_curves
//   - diagnostics: RSS, σ̂², R², GCV of a completed fit
//   - inference:   pointwise confidence bands
//   - convert:     ndarray ↔ nalgebra conversions for the factorizations
//   - error:       error type used throughout the library
//
// =============================================================================

pub mod basis;
pub mod convert;
pub mod design;
pub mod diagnostics;
pub mod error;
pub mod inference;
pub mod penalty;
pub mod smoother;
pub mod solvers;

pub use basis::{BSplineBasis, BasisProvider, Domain, FourierBasis, PolynomialBasis};
pub use design::design_matrix;
pub use diagnostics::FitDiagnostics;
pub use error::{PlsSmoothError, Result};
pub use inference::{confidence_band, ConfidenceBand};
pub use penalty::{difference_penalty, penalty_matrix, DEFAULT_DERIVATIVE_ORDER};
pub use smoother::{fit, CurvesFitResult, FitResult, Smoother, SmootherConfig};
pub use solvers::{
    select_lambda, Criterion, LambdaSearch, LambdaSelection, PenalizedSolution,
    RegularizedSolver, SelectionConfig, SolveMethod, SolverConfig,
};
