// =============================================================================
// Penalized Least Squares Solvers
// =============================================================================
//
// Two layers:
//
//   1. regularized:   solve (BᵀB + λP) c = Bᵀy at a fixed λ, with square roots
//                     of BᵀB and P cached so that many λ can be tried cheaply
//   2. gcv_optimizer: choose λ by minimizing GCV (or robust GCV) over a grid
//                     or by Brent's method on log10 λ
//
// HOW λ TRADES FIDELITY FOR SMOOTHNESS
// ------------------------------------
//   λ = 0   → ordinary least squares onto the basis
//   λ → ∞   → the fit is pushed into the null space of P
//             (for a 2nd-derivative penalty: a straight line)
//
// The effective degrees of freedom df(λ) = tr(H) decrease monotonically from
// rank(B) towards dim null(P) as λ grows.
//
// =============================================================================

pub mod gcv_optimizer;
pub mod regularized;

pub use gcv_optimizer::{
    brent_minimize, gcv_score, log_lambda_grid, robust_gcv_score, select_lambda, BrentResult,
    Criterion, LambdaSearch, LambdaSelection, SelectionConfig,
};
pub use regularized::{PenalizedSolution, RegularizedSolver, SolveMethod, SolverConfig};
