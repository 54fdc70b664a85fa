// =============================================================================
// GCV OPTIMIZER: Smoothing Parameter Selection
// =============================================================================
//
// Chooses λ by minimizing a cross-validation proxy. Each candidate λ costs one
// k × k factorization on the cached system held by `RegularizedSolver`.
//
// CRITERIA
// --------
//   GCV(λ)  = n · RSS(λ) / (n − df(λ))²
//   RGCV(λ) = GCV(λ) · (γ + (1 − γ) · tr(H²) / n)        (robust GCV, 0 < γ ≤ 1)
//
// With several response curves sharing λ, RSS is the mean over curves.
// A candidate with n − df(λ) ≤ 1e-8 · n is degenerate: its score is +∞ and it
// can never be selected.
//
// SEARCH STRATEGIES
// -----------------
//   - Grid:    explicit λ values
//   - LogGrid: n_points λ values evenly spaced in log10 (default −8 … 8, 20 points)
//   - Bounded: Brent's method on log10 λ inside [log10_min, log10_max]
//
// Bounds are log10 values; a candidate whose 10^x overflows scores +∞.
//
// TIES
// ----
// Candidates whose score is within `tie_tolerance · |best|` of the minimum are
// tied, and the largest λ (the smoothest fit) wins.
//
// =============================================================================

use rayon::prelude::*;

use super::regularized::{PenalizedSolution, RegularizedSolver};
use crate::error::{PlsSmoothError, Result};

/// n − df at or below this fraction of n marks a degenerate candidate.
pub(crate) const DEGENERATE_TOLERANCE: f64 = 1e-8;

// =============================================================================
// Configuration
// =============================================================================

/// Criterion minimized over λ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    /// Generalized cross-validation.
    Gcv,
    /// Robust GCV with robustness parameter γ ∈ (0, 1]; γ = 1 recovers GCV.
    RobustGcv { gamma: f64 },
}

/// How candidate λ values are generated.
#[derive(Debug, Clone, PartialEq)]
pub enum LambdaSearch {
    /// Explicit candidate values, evaluated in the given order.
    Grid(Vec<f64>),
    /// `n_points` values evenly spaced in log10 between the bounds (inclusive).
    LogGrid {
        log10_min: f64,
        log10_max: f64,
        n_points: usize,
    },
    /// Brent's method on log10 λ within the bounds.
    Bounded {
        log10_min: f64,
        log10_max: f64,
        tolerance: f64,
        max_iterations: usize,
    },
}

impl Default for LambdaSearch {
    fn default() -> Self {
        LambdaSearch::LogGrid {
            log10_min: -8.0,
            log10_max: 8.0,
            n_points: 20,
        }
    }
}

/// Configuration for λ selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Candidate generation strategy.
    /// Default: 20-point log10 grid over [1e-8, 1e8]
    pub search: LambdaSearch,

    /// Criterion to minimize.
    /// Default: GCV
    pub criterion: Criterion,

    /// Relative tolerance under which two scores count as tied.
    /// Default: 1e-10
    pub tie_tolerance: f64,

    /// Evaluate grid candidates on the rayon thread pool.
    /// Default: false
    pub parallel: bool,

    /// Record every (λ, score) pair evaluated.
    /// Default: true
    pub keep_trace: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            search: LambdaSearch::default(),
            criterion: Criterion::Gcv,
            tie_tolerance: 1e-10,
            parallel: false,
            keep_trace: true,
        }
    }
}

impl SelectionConfig {
    /// Brent search on log10 λ in [log10_min, log10_max].
    pub fn bounded(log10_min: f64, log10_max: f64) -> Self {
        Self {
            search: LambdaSearch::Bounded {
                log10_min,
                log10_max,
                tolerance: 1e-6,
                max_iterations: 100,
            },
            ..Self::default()
        }
    }

    /// Explicit grid of candidate λ values.
    pub fn grid(values: Vec<f64>) -> Self {
        Self {
            search: LambdaSearch::Grid(values),
            ..Self::default()
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn validate(&self) -> Result<()> {
        if let Criterion::RobustGcv { gamma } = self.criterion {
            if gamma.is_nan() || gamma <= 0.0 || gamma > 1.0 {
                return Err(PlsSmoothError::InvalidValue(format!(
                    "robust GCV gamma must lie in (0, 1], got {}",
                    gamma
                )));
            }
        }
        if self.tie_tolerance.is_nan() || self.tie_tolerance < 0.0 {
            return Err(PlsSmoothError::InvalidValue(format!(
                "tie tolerance must be non-negative, got {}",
                self.tie_tolerance
            )));
        }
        match &self.search {
            LambdaSearch::Grid(values) => {
                if values.is_empty() {
                    return Err(PlsSmoothError::EmptyInput("λ grid is empty".to_string()));
                }
                if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                    return Err(PlsSmoothError::InvalidValue(format!(
                        "λ grid values must be finite and non-negative, got {}",
                        bad
                    )));
                }
            }
            LambdaSearch::LogGrid { log10_min, log10_max, n_points } => {
                check_bounds(*log10_min, *log10_max)?;
                if *n_points == 0 {
                    return Err(PlsSmoothError::EmptyInput("λ grid has zero points".to_string()));
                }
            }
            LambdaSearch::Bounded { log10_min, log10_max, tolerance, max_iterations } => {
                check_bounds(*log10_min, *log10_max)?;
                if tolerance.is_nan() || *tolerance <= 0.0 || *max_iterations == 0 {
                    return Err(PlsSmoothError::InvalidValue(
                        "bounded search needs a positive tolerance and at least one iteration"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_bounds(lo: f64, hi: f64) -> Result<()> {
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(PlsSmoothError::InvalidValue(format!(
            "log10 λ bounds must be finite with min ≤ max, got [{}, {}]",
            lo, hi
        )));
    }
    Ok(())
}

// =============================================================================
// Scores
// =============================================================================

/// GCV score n · RSS / (n − df)²; +∞ for degenerate fits.
pub fn gcv_score(n: usize, rss: f64, effective_df: f64) -> f64 {
    let n_f = n as f64;
    let denom = n_f - effective_df;
    if denom <= DEGENERATE_TOLERANCE * n_f {
        return f64::INFINITY;
    }
    n_f * rss / (denom * denom)
}

/// Robust GCV score GCV · (γ + (1 − γ) · tr(H²) / n).
pub fn robust_gcv_score(
    n: usize,
    rss: f64,
    effective_df: f64,
    hat_trace_squared: f64,
    gamma: f64,
) -> f64 {
    let gcv = gcv_score(n, rss, effective_df);
    if !gcv.is_finite() {
        return gcv;
    }
    gcv * (gamma + (1.0 - gamma) * hat_trace_squared / n as f64)
}

impl Criterion {
    /// Score a solution obtained from a system with `n` observations.
    pub fn score(&self, n: usize, solution: &PenalizedSolution) -> f64 {
        let rss = solution.mean_rss();
        match *self {
            Criterion::Gcv => gcv_score(n, rss, solution.effective_df),
            Criterion::RobustGcv { gamma } => robust_gcv_score(
                n,
                rss,
                solution.effective_df,
                solution.hat_trace_squared,
                gamma,
            ),
        }
    }
}

/// `n_points` λ values evenly spaced in log10 from 10^lo to 10^hi.
pub fn log_lambda_grid(log10_min: f64, log10_max: f64, n_points: usize) -> Vec<f64> {
    match n_points {
        0 => Vec::new(),
        1 => vec![10f64.powf(log10_min)],
        _ => {
            let step = (log10_max - log10_min) / (n_points - 1) as f64;
            (0..n_points)
                .map(|i| 10f64.powf(log10_min + step * i as f64))
                .collect()
        }
    }
}

// =============================================================================
// Brent's method
// =============================================================================

/// Outcome of a one-dimensional minimization.
#[derive(Debug, Clone)]
pub struct BrentResult {
    /// Abscissa of the lowest value found
    pub x_min: f64,
    /// Objective at `x_min`
    pub f_min: f64,
    /// Objective evaluations after the initial one
    pub iterations: usize,
    /// Whether the bracket shrank below the tolerance
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    x: f64,
    f: f64,
}

/// Search state: the bracket [lo, hi] and the three lowest evaluations
/// (`best` ≤ `second` ≤ `third` in objective value).
struct Bracket {
    lo: f64,
    hi: f64,
    best: Evaluation,
    second: Evaluation,
    third: Evaluation,
    /// Length of the last step taken
    last_step: f64,
    /// Length of the step before that; a parabolic step must beat half of it
    earlier_step: f64,
}

impl Bracket {
    fn midpoint(&self) -> f64 {
        0.5 * (self.lo + self.hi)
    }

    /// Vertex of the parabola through the three best evaluations, as an offset from
    /// `best.x`. `None` when any value is infinite, the parabola is
    /// degenerate, or the vertex would leave the bracket or move too far.
    fn parabolic_offset(&self) -> Option<f64> {
        let (b, s, t) = (self.best, self.second, self.third);
        if !(b.f.is_finite() && s.f.is_finite() && t.f.is_finite()) {
            return None;
        }
        let r = (b.x - s.x) * (b.f - t.f);
        let q = (b.x - t.x) * (b.f - s.f);
        let mut num = (b.x - t.x) * q - (b.x - s.x) * r;
        let mut den = 2.0 * (q - r);
        if den > 0.0 {
            num = -num;
        } else {
            den = -den;
        }
        let inside = num > den * (self.lo - b.x) && num < den * (self.hi - b.x);
        let short = num.abs() < (0.5 * den * self.earlier_step).abs();
        (inside && short).then(|| num / den)
    }

    /// Next offset from `best.x`: parabolic when acceptable, golden section otherwise.
    fn next_offset(&mut self, tol: f64) -> f64 {
        const GOLDEN: f64 = 0.381_966_011_250_105; // (3 − √5) / 2
        let x = self.best.x;
        let mid = self.midpoint();

        let parabolic = if self.earlier_step.abs() > tol {
            self.parabolic_offset()
        } else {
            None
        };
        let offset = match parabolic {
            Some(offset) => {
                self.earlier_step = self.last_step;
                let u = x + offset;
                // never evaluate within 2·tol of the bracket ends
                if u - self.lo < 2.0 * tol || self.hi - u < 2.0 * tol {
                    tol.copysign(mid - x)
                } else {
                    offset
                }
            }
            None => {
                self.earlier_step = if x < mid { self.hi - x } else { self.lo - x };
                GOLDEN * self.earlier_step
            }
        };
        self.last_step = offset;
        if offset.abs() >= tol {
            offset
        } else {
            tol.copysign(offset)
        }
    }

    /// Shrink the bracket around the best evaluation and re-rank the others.
    fn absorb(&mut self, point: Evaluation) {
        let x = self.best.x;
        if point.f <= self.best.f {
            if point.x < x {
                self.hi = x;
            } else {
                self.lo = x;
            }
            self.third = self.second;
            self.second = self.best;
            self.best = point;
            return;
        }
        if point.x < x {
            self.lo = point.x;
        } else {
            self.hi = point.x;
        }
        if point.f <= self.second.f || self.second.x == x {
            self.third = self.second;
            self.second = point;
        } else if point.f <= self.third.f || self.third.x == x || self.third.x == self.second.x {
            self.third = point;
        }
    }
}

/// Minimize `f` on [lower, upper] with Brent's method: golden-section search
/// accelerated by parabolic steps through the three lowest points seen.
///
/// `f` may return +∞ where it is undefined. Parabolic steps need three finite
/// values, so such regions are crossed by golden-section steps alone.
pub fn brent_minimize<F>(mut f: F, lower: f64, upper: f64, tol: f64, max_iter: usize) -> BrentResult
where
    F: FnMut(f64) -> f64,
{
    let x0 = lower + 0.381_966_011_250_105 * (upper - lower);
    let start = Evaluation { x: x0, f: f(x0) };
    let mut bracket = Bracket {
        lo: lower,
        hi: upper,
        best: start,
        second: start,
        third: start,
        last_step: 0.0,
        earlier_step: 0.0,
    };

    for iter in 0..max_iter {
        let x = bracket.best.x;
        let abs_tol = tol * x.abs() + 1e-10;
        if (x - bracket.midpoint()).abs() <= 2.0 * abs_tol - 0.5 * (bracket.hi - bracket.lo) {
            return BrentResult {
                x_min: x,
                f_min: bracket.best.f,
                iterations: iter,
                converged: true,
            };
        }

        let u = x + bracket.next_offset(abs_tol);
        bracket.absorb(Evaluation { x: u, f: f(u) });
    }

    BrentResult {
        x_min: bracket.best.x,
        f_min: bracket.best.f,
        iterations: max_iter,
        converged: false,
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Outcome of a λ search.
#[derive(Debug, Clone)]
pub struct LambdaSelection {
    /// Selected smoothing parameter λ*
    pub lambda: f64,
    /// Criterion value at λ*
    pub score: f64,
    /// Full solution at λ*
    pub solution: PenalizedSolution,
    /// Every (λ, score) evaluated, in evaluation order; degenerate candidates score +∞
    pub trace: Option<Vec<(f64, f64)>>,
}

/// Score one candidate; a singular system counts as an infeasible candidate.
fn score_candidate(solver: &RegularizedSolver, criterion: &Criterion, lambda: f64) -> Result<f64> {
    // 10^x overflows for log10 bounds beyond ~308
    if lambda.is_infinite() {
        log::trace!("λ = {:e} skipped: overflow", lambda);
        return Ok(f64::INFINITY);
    }
    match solver.solve(lambda) {
        Ok(solution) => {
            let score = criterion.score(solver.n_obs(), &solution);
            log::trace!(
                "λ = {:e}: rss = {:.6e}, df = {:.4}, score = {:.6e}",
                lambda,
                solution.mean_rss(),
                solution.effective_df,
                score
            );
            Ok(score)
        }
        Err(PlsSmoothError::SingularSystem(msg)) => {
            log::trace!("λ = {:e} skipped: {}", lambda, msg);
            Ok(f64::INFINITY)
        }
        Err(e) => Err(e),
    }
}

/// Pick the minimizing candidate, preferring the largest λ among ties.
fn pick_best(candidates: &[(f64, f64)], tie_tolerance: f64) -> Option<(f64, f64)> {
    let best = candidates
        .iter()
        .map(|&(_, score)| score)
        .filter(|s| s.is_finite())
        .fold(f64::INFINITY, f64::min);
    if !best.is_finite() {
        return None;
    }
    let slack = tie_tolerance * best.abs().max(f64::MIN_POSITIVE);
    candidates
        .iter()
        .filter(|&&(_, score)| score.is_finite() && score <= best + slack)
        .copied()
        .fold(None, |acc: Option<(f64, f64)>, cand| match acc {
            Some(prev) if prev.0 >= cand.0 => Some(prev),
            _ => Some(cand),
        })
}

/// Search λ according to `config`, reusing the solver's cached system.
///
/// Fails with `DegenerateFit` when every candidate leaves n − df(λ) ≤ 0.
pub fn select_lambda(solver: &RegularizedSolver, config: &SelectionConfig) -> Result<LambdaSelection> {
    config.validate()?;
    let criterion = config.criterion;

    let candidates: Vec<(f64, f64)> = match &config.search {
        LambdaSearch::Grid(values) => score_grid(solver, &criterion, values, config.parallel)?,
        LambdaSearch::LogGrid { log10_min, log10_max, n_points } => {
            let grid = log_lambda_grid(*log10_min, *log10_max, *n_points);
            score_grid(solver, &criterion, &grid, config.parallel)?
        }
        LambdaSearch::Bounded { log10_min, log10_max, tolerance, max_iterations } => {
            let mut evaluated = Vec::new();
            let mut failure = None;
            let result = brent_minimize(
                |log_lambda| {
                    let lambda = 10f64.powf(log_lambda);
                    match score_candidate(solver, &criterion, lambda) {
                        Ok(score) => {
                            evaluated.push((lambda, score));
                            score
                        }
                        Err(e) => {
                            failure.get_or_insert(e);
                            f64::INFINITY
                        }
                    }
                },
                *log10_min,
                *log10_max,
                *tolerance,
                *max_iterations,
            );
            if let Some(e) = failure {
                return Err(e);
            }
            log::debug!(
                "Brent search finished after {} iterations (converged: {})",
                result.iterations,
                result.converged
            );
            evaluated
        }
    };

    let (lambda, score) = pick_best(&candidates, config.tie_tolerance).ok_or_else(|| {
        log::warn!(
            "all {} candidate λ values are degenerate for n = {}, k = {}",
            candidates.len(),
            solver.n_obs(),
            solver.n_basis()
        );
        PlsSmoothError::DegenerateFit(format!(
            "no candidate λ leaves positive residual degrees of freedom (n = {}, k = {}); \
             use a coarser basis or a wider λ range",
            solver.n_obs(),
            solver.n_basis()
        ))
    })?;

    let solution = solver.solve(lambda)?;
    log::debug!(
        "selected λ = {:e} with score {:.6e} (df = {:.4}, {:?})",
        lambda,
        score,
        solution.effective_df,
        solution.method
    );

    Ok(LambdaSelection {
        lambda,
        score,
        solution,
        trace: config.keep_trace.then_some(candidates),
    })
}

fn score_grid(
    solver: &RegularizedSolver,
    criterion: &Criterion,
    grid: &[f64],
    parallel: bool,
) -> Result<Vec<(f64, f64)>> {
    let scores: Vec<Result<f64>> = if parallel {
        grid.par_iter()
            .map(|&lambda| score_candidate(solver, criterion, lambda))
            .collect()
    } else {
        grid.iter()
            .map(|&lambda| score_candidate(solver, criterion, lambda))
            .collect()
    };
    grid.iter()
        .zip(scores)
        .map(|(&lambda, score)| score.map(|s| (lambda, s)))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BSplineBasis, PolynomialBasis};
    use crate::design::design_matrix;
    use crate::penalty::penalty_matrix;
    use crate::solvers::regularized::{SolveMethod, SolverConfig};
    use ndarray::{array, Array1};

    fn sine_solver(n: usize, k: usize) -> RegularizedSolver {
        let basis = BSplineBasis::uniform((0.0, 10.0), k, 3).unwrap();
        let t: Array1<f64> = Array1::linspace(0.0, 10.0, n);
        // Deterministic wiggle standing in for noise
        let y = t.mapv(|ti| 2.0 + ti.sin() + 0.2 * (7.3 * ti).cos());
        let b = design_matrix(&t, &basis).unwrap();
        let p = penalty_matrix(&basis, 2).unwrap();
        RegularizedSolver::single(b, p, &y, SolverConfig::default()).unwrap()
    }

    // =========================================================================
    // Brent's method
    // =========================================================================

    #[test]
    fn test_brent_minimize_quadratic() {
        let result = brent_minimize(|x| (x - 2.0).powi(2), 0.0, 5.0, 1e-6, 100);
        assert!(result.converged);
        assert!((result.x_min - 2.0).abs() < 1e-5);
        assert!(result.f_min < 1e-10);
    }

    #[test]
    fn test_brent_minimize_cosine() {
        let result = brent_minimize(|x| x.cos(), 2.0, 5.0, 1e-6, 100);
        assert!(result.converged);
        assert!((result.x_min - std::f64::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_brent_minimize_at_boundary() {
        let result = brent_minimize(|x| -x, 0.0, 5.0, 1e-6, 100);
        assert!((result.x_min - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_brent_tolerates_infinite_region() {
        let result = brent_minimize(
            |x| if x < 1.0 { f64::INFINITY } else { (x - 3.0).powi(2) },
            0.0,
            5.0,
            1e-6,
            200,
        );
        assert!((result.x_min - 3.0).abs() < 1e-4);
    }

    // =========================================================================
    // Scores and grid
    // =========================================================================

    #[test]
    fn test_gcv_score_formula() {
        // 10 · 2 / (10 − 4)²
        assert!((gcv_score(10, 2.0, 4.0) - 20.0 / 36.0).abs() < 1e-15);
        assert_eq!(gcv_score(10, 2.0, 10.0), f64::INFINITY);
        assert_eq!(gcv_score(10, 2.0, 12.0), f64::INFINITY);
    }

    #[test]
    fn test_robust_gcv_with_unit_gamma_is_gcv() {
        let g = gcv_score(50, 3.0, 7.5);
        assert_eq!(robust_gcv_score(50, 3.0, 7.5, 6.0, 1.0), g);
        assert!(robust_gcv_score(50, 3.0, 7.5, 6.0, 0.4) < g);
    }

    #[test]
    fn test_log_lambda_grid() {
        let grid = log_lambda_grid(-2.0, 2.0, 5);
        let expected = [0.01, 0.1, 1.0, 10.0, 100.0];
        for (g, e) in grid.iter().zip(expected.iter()) {
            assert!((g / e - 1.0).abs() < 1e-12);
        }
        assert_eq!(log_lambda_grid(3.0, 5.0, 1), vec![1000.0]);
    }

    #[test]
    fn test_pick_best_prefers_larger_lambda_on_ties() {
        let candidates = [(0.1, 2.0), (1.0, 1.0), (10.0, 1.0), (100.0, 3.0)];
        assert_eq!(pick_best(&candidates, 1e-10), Some((10.0, 1.0)));

        let near = [(1.0, 1.0), (10.0, 1.0 + 1e-13)];
        assert_eq!(pick_best(&near, 1e-10).unwrap().0, 10.0);
        assert_eq!(pick_best(&near, 0.0).unwrap().0, 1.0);

        let none = [(1.0, f64::INFINITY)];
        assert_eq!(pick_best(&none, 1e-10), None);
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[test]
    fn test_grid_selection_returns_grid_minimum() {
        let solver = sine_solver(200, 12);
        let selection = select_lambda(&solver, &SelectionConfig::default()).unwrap();
        let trace = selection.trace.as_ref().unwrap();
        assert_eq!(trace.len(), 20);
        let min = trace.iter().map(|t| t.1).fold(f64::INFINITY, f64::min);
        assert_eq!(selection.score, min);
        assert!(selection.solution.effective_df < 200.0);
        assert_eq!(selection.solution.lambda, selection.lambda);
    }

    #[test]
    fn test_parallel_grid_matches_sequential() {
        let solver = sine_solver(150, 10);
        let sequential = select_lambda(&solver, &SelectionConfig::default()).unwrap();
        let parallel =
            select_lambda(&solver, &SelectionConfig::default().with_parallel(true)).unwrap();
        assert_eq!(sequential.lambda, parallel.lambda);
        assert_eq!(sequential.trace, parallel.trace);
    }

    #[test]
    fn test_bounded_search_finds_local_minimum() {
        let solver = sine_solver(200, 12);
        let bounded = select_lambda(&solver, &SelectionConfig::bounded(-8.0, 8.0)).unwrap();
        assert!(bounded.lambda >= 1e-8 && bounded.lambda <= 1e8);
        assert!(bounded.score.is_finite());

        let trace = bounded.trace.as_ref().unwrap();
        let min = trace.iter().map(|t| t.1).fold(f64::INFINITY, f64::min);
        assert_eq!(bounded.score, min);

        let n = solver.n_obs();
        for factor in [0.5, 2.0] {
            let nearby = solver.solve(bounded.lambda * factor).unwrap();
            assert!(Criterion::Gcv.score(n, &nearby) >= bounded.score * (1.0 - 1e-6));
        }
    }

    #[test]
    fn test_bounds_past_f64_range_are_skipped() {
        let solver = sine_solver(120, 10);

        let bounded = select_lambda(&solver, &SelectionConfig::bounded(-8.0, 400.0)).unwrap();
        assert!(bounded.lambda.is_finite() && bounded.lambda >= 1e-8);
        assert!(bounded.score.is_finite());
        for &(lambda, score) in bounded.trace.as_ref().unwrap() {
            if lambda.is_infinite() {
                assert_eq!(score, f64::INFINITY);
            }
        }

        let config = SelectionConfig {
            search: LambdaSearch::LogGrid { log10_min: 300.0, log10_max: 320.0, n_points: 5 },
            ..SelectionConfig::default()
        };
        let grid = select_lambda(&solver, &config).unwrap();
        assert!(grid.lambda.is_finite());
        let trace = grid.trace.unwrap();
        assert_eq!(trace.len(), 5);
        assert_eq!(trace[4].1, f64::INFINITY);
    }

    #[test]
    fn test_selection_reports_solve_method() {
        let solver = sine_solver(120, 10);
        let selection = select_lambda(&solver, &SelectionConfig::default()).unwrap();
        assert_eq!(selection.solution.method, SolveMethod::Cholesky);
    }

    #[test]
    fn test_brent_reports_iterations_within_budget() {
        let result = brent_minimize(|x| (x - 0.3).powi(2) + 1.0, -1.0, 1.0, 1e-8, 50);
        assert!(result.converged);
        assert!(result.iterations > 0 && result.iterations < 50);
        assert!((result.f_min - 1.0).abs() < 1e-12);

        let capped = brent_minimize(|x| (x - 0.3).powi(2), -1.0, 1.0, 1e-12, 2);
        assert!(!capped.converged);
        assert_eq!(capped.iterations, 2);
    }

    #[test]
    fn test_robust_gcv_selection() {
        let solver = sine_solver(120, 10);
        let config = SelectionConfig::default().with_criterion(Criterion::RobustGcv { gamma: 0.4 });
        let selection = select_lambda(&solver, &config).unwrap();
        assert!(selection.score.is_finite());
        assert!((solver.n_obs() as f64) - selection.solution.effective_df > 0.0);
    }

    #[test]
    fn test_all_degenerate_candidates() {
        // Four points, cubic polynomial, penalty order 4 is identically zero:
        // df = 4 = n at every λ
        let basis = PolynomialBasis::new(3, (0.0, 3.0)).unwrap();
        let t = array![0.0, 1.0, 2.0, 3.0];
        let b = design_matrix(&t, &basis).unwrap();
        let p = penalty_matrix(&basis, 4).unwrap();
        let solver =
            RegularizedSolver::single(b, p, &array![0.0, 1.0, 4.0, 9.0], SolverConfig::default())
                .unwrap();
        let err = select_lambda(&solver, &SelectionConfig::default()).unwrap_err();
        assert!(matches!(err, PlsSmoothError::DegenerateFit(_)));
    }

    #[test]
    fn test_invalid_configurations() {
        let solver = sine_solver(50, 8);
        let empty = SelectionConfig::grid(vec![]);
        assert!(matches!(select_lambda(&solver, &empty), Err(PlsSmoothError::EmptyInput(_))));

        let negative = SelectionConfig::grid(vec![1.0, -1.0]);
        assert!(matches!(select_lambda(&solver, &negative), Err(PlsSmoothError::InvalidValue(_))));

        let bad_gamma =
            SelectionConfig::default().with_criterion(Criterion::RobustGcv { gamma: 0.0 });
        assert!(matches!(select_lambda(&solver, &bad_gamma), Err(PlsSmoothError::InvalidValue(_))));

        let reversed = SelectionConfig::bounded(4.0, -4.0);
        assert!(matches!(select_lambda(&solver, &reversed), Err(PlsSmoothError::InvalidValue(_))));
    }

    #[test]
    fn test_trace_can_be_disabled() {
        let solver = sine_solver(50, 8);
        let config = SelectionConfig {
            keep_trace: false,
            ..SelectionConfig::default()
        };
        assert!(select_lambda(&solver, &config).unwrap().trace.is_none());
    }
}
