// =============================================================================
// Smoother: Penalized Least Squares Fit Orchestration
// =============================================================================
//
// Entry point for smoothing sampled functional data:
//
//   samples (t, y) + basis
//        │
//        ├── design_matrix(t, basis)          → B   (n × k)
//        ├── penalty_matrix(basis, m)         → P   (k × k)
//        │
//        ├── λ given:   RegularizedSolver::solve(λ)
//        └── λ omitted: select_lambda(...)    (reuses B and P for every λ)
//        │
//        └── FitResult { c, ŷ, y − ŷ, df, λ, trace }
//
// `fit_curves` smooths several curves observed at the same points. All curves
// share B, P and one λ.
//
// =============================================================================

use ndarray::{Array1, Array2, Axis};

use crate::basis::{check_derivative_order, BasisProvider};
use crate::design::design_matrix;
use crate::diagnostics::FitDiagnostics;
use crate::error::{PlsSmoothError, Result};
use crate::penalty::{penalty_matrix, DEFAULT_DERIVATIVE_ORDER};
use crate::solvers::{
    select_lambda, PenalizedSolution, RegularizedSolver, SelectionConfig, SolverConfig,
};

// =============================================================================
// Configuration
// =============================================================================

/// Options for a smoothing fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SmootherConfig {
    /// Fixed smoothing parameter. `None` selects λ with `selection`.
    /// Default: None
    pub lambda: Option<f64>,

    /// Order m of the derivative whose integrated square is penalized.
    /// Default: 2
    pub derivative_order: usize,

    /// λ search settings, used when `lambda` is `None`.
    pub selection: SelectionConfig,

    /// Factorization thresholds.
    pub solver: SolverConfig,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            lambda: None,
            derivative_order: DEFAULT_DERIVATIVE_ORDER,
            selection: SelectionConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// A completed single-curve fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Basis coefficients c (length k)
    pub coefficients: Array1<f64>,

    /// Fitted values ŷ = Bc at the sample points
    pub fitted_values: Array1<f64>,

    /// Residuals y − ŷ
    pub residuals: Array1<f64>,

    /// Effective degrees of freedom tr(H)
    pub effective_df: f64,

    /// Smoothing parameter used
    pub lambda_used: f64,

    /// (λ, score) pairs evaluated during selection; `None` for a fixed λ
    pub selection_trace: Option<Vec<(f64, f64)>>,

    /// Penalized derivative order
    pub derivative_order: usize,

    /// (BᵀB + λP)⁻¹, needed for pointwise standard errors
    pub covariance_unscaled: Array2<f64>,

    /// Goodness-of-fit summary
    pub diagnostics: FitDiagnostics,
}

impl FitResult {
    /// Evaluate the fitted curve at new points.
    pub fn predict(&self, basis: &dyn BasisProvider, points: &Array1<f64>) -> Result<Array1<f64>> {
        self.predict_derivative(basis, points, 0)
    }

    /// Evaluate the `order`-th derivative of the fitted curve at new points.
    pub fn predict_derivative(
        &self,
        basis: &dyn BasisProvider,
        points: &Array1<f64>,
        order: usize,
    ) -> Result<Array1<f64>> {
        let b = evaluation_matrix(basis, points, order, self.coefficients.len())?;
        Ok(b.dot(&self.coefficients))
    }
}

/// A completed fit of several curves sharing one λ.
#[derive(Debug, Clone)]
pub struct CurvesFitResult {
    /// Coefficients, one row per curve (m × k)
    pub coefficients: Array2<f64>,

    /// Fitted values, one row per curve (m × n)
    pub fitted_values: Array2<f64>,

    /// Residuals, one row per curve (m × n)
    pub residuals: Array2<f64>,

    /// Residual sum of squares of each curve
    pub rss: Array1<f64>,

    /// Effective degrees of freedom tr(H), shared by all curves
    pub effective_df: f64,

    /// Smoothing parameter used
    pub lambda_used: f64,

    /// (λ, score) pairs evaluated during selection; `None` for a fixed λ
    pub selection_trace: Option<Vec<(f64, f64)>>,

    /// Penalized derivative order
    pub derivative_order: usize,

    /// (BᵀB + λP)⁻¹
    pub covariance_unscaled: Array2<f64>,
}

impl CurvesFitResult {
    /// Number of curves m.
    pub fn n_curves(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Evaluate every fitted curve at new points (m × len(points)).
    pub fn predict(&self, basis: &dyn BasisProvider, points: &Array1<f64>) -> Result<Array2<f64>> {
        let b = evaluation_matrix(basis, points, 0, self.coefficients.ncols())?;
        Ok(self.coefficients.dot(&b.t()))
    }
}

/// Basis (derivative) matrix at `points`, checked against a fitted dimension.
fn evaluation_matrix(
    basis: &dyn BasisProvider,
    points: &Array1<f64>,
    order: usize,
    fitted_dimension: usize,
) -> Result<Array2<f64>> {
    if basis.dimension() != fitted_dimension {
        return Err(PlsSmoothError::Dimension {
            expected: fitted_dimension,
            found: basis.dimension(),
        });
    }
    check_derivative_order(basis, order)?;
    basis.domain().check_points(points)?;
    if order == 0 {
        return design_matrix(points, basis);
    }
    let b = basis.evaluate_derivative(points, order)?;
    if b.dim() != (points.len(), fitted_dimension) {
        return Err(PlsSmoothError::Dimension {
            expected: fitted_dimension,
            found: b.ncols(),
        });
    }
    Ok(b)
}

// =============================================================================
// Smoother
// =============================================================================

/// Penalized least squares smoother.
///
/// ```
/// use plssmooth_core::{PolynomialBasis, Smoother};
///
/// let samples = [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)];
/// let basis = PolynomialBasis::new(3, (0.0, 3.0))?;
///
/// let fit = Smoother::new().lambda(0.0).fit(&samples, &basis)?;
/// assert!(fit.residuals.iter().all(|r| r.abs() < 1e-9));
/// # Ok::<(), plssmooth_core::PlsSmoothError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Smoother {
    config: SmootherConfig,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SmootherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Use a fixed λ instead of selecting one.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.config.lambda = Some(lambda);
        self
    }

    pub fn derivative_order(mut self, order: usize) -> Self {
        self.config.derivative_order = order;
        self
    }

    pub fn selection(mut self, selection: SelectionConfig) -> Self {
        self.config.selection = selection;
        self
    }

    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.config.solver = solver;
        self
    }

    /// Smooth one sampled curve given as (t, y) pairs.
    pub fn fit(&self, samples: &[(f64, f64)], basis: &dyn BasisProvider) -> Result<FitResult> {
        if samples.is_empty() {
            return Err(PlsSmoothError::EmptyInput("sample set is empty".to_string()));
        }
        let t: Array1<f64> = samples.iter().map(|&(ti, _)| ti).collect();
        let y: Array1<f64> = samples.iter().map(|&(_, yi)| yi).collect();
        let response = y.view().insert_axis(Axis(1)).to_owned();

        let (solution, score, trace) = self.run(&t, response, basis)?;

        let coefficients = solution.coefficients.column(0).to_owned();
        let fitted_values = solution.fitted_values.column(0).to_owned();
        let residuals = solution.residuals.column(0).to_owned();
        let diagnostics = FitDiagnostics::new(
            y.view(),
            fitted_values.view(),
            solution.rss[0],
            solution.effective_df,
            score,
        );

        Ok(FitResult {
            coefficients,
            fitted_values,
            residuals,
            effective_df: solution.effective_df,
            lambda_used: solution.lambda,
            selection_trace: trace,
            derivative_order: self.config.derivative_order,
            covariance_unscaled: solution.covariance_unscaled,
            diagnostics,
        })
    }

    /// Smooth m curves observed at the same points `t`.
    ///
    /// `y` holds one curve per row (m × n).
    pub fn fit_curves(
        &self,
        t: &Array1<f64>,
        y: &Array2<f64>,
        basis: &dyn BasisProvider,
    ) -> Result<CurvesFitResult> {
        if t.is_empty() || y.nrows() == 0 {
            return Err(PlsSmoothError::EmptyInput(format!(
                "{} sample points and {} curves",
                t.len(),
                y.nrows()
            )));
        }
        if y.ncols() != t.len() {
            return Err(PlsSmoothError::DimensionMismatch(format!(
                "curves have {} observations but there are {} sample points",
                y.ncols(),
                t.len()
            )));
        }

        let (solution, _, trace) = self.run(t, y.t().to_owned(), basis)?;

        Ok(CurvesFitResult {
            coefficients: solution.coefficients.t().to_owned(),
            fitted_values: solution.fitted_values.t().to_owned(),
            residuals: solution.residuals.t().to_owned(),
            rss: solution.rss,
            effective_df: solution.effective_df,
            lambda_used: solution.lambda,
            selection_trace: trace,
            derivative_order: self.config.derivative_order,
            covariance_unscaled: solution.covariance_unscaled,
        })
    }

    /// Validate, build B and P once, then solve or select λ.
    fn run(
        &self,
        t: &Array1<f64>,
        response: Array2<f64>,
        basis: &dyn BasisProvider,
    ) -> Result<(PenalizedSolution, f64, Option<Vec<(f64, f64)>>)> {
        if let Some(bad) = t.iter().find(|v| !v.is_finite()) {
            return Err(PlsSmoothError::InvalidValue(format!(
                "sample point {} is not finite",
                bad
            )));
        }
        if response.iter().any(|v| !v.is_finite()) {
            return Err(PlsSmoothError::InvalidValue(
                "observations contain non-finite values".to_string(),
            ));
        }
        basis.domain().check_points(t)?;

        log::debug!(
            "smoothing {} curve(s) of {} samples onto {} basis functions (m = {})",
            response.ncols(),
            t.len(),
            basis.dimension(),
            self.config.derivative_order
        );

        let design = design_matrix(t, basis)?;
        let penalty = penalty_matrix(basis, self.config.derivative_order)?;
        let solver = RegularizedSolver::new(design, penalty, response, self.config.solver)?;

        match self.config.lambda {
            Some(lambda) => {
                let solution = solver.solve(lambda)?;
                let score = self.config.selection.criterion.score(solver.n_obs(), &solution);
                Ok((solution, score, None))
            }
            None => {
                let selection = select_lambda(&solver, &self.config.selection)?;
                Ok((selection.solution, selection.score, selection.trace))
            }
        }
    }
}

/// Fit one curve with an explicit configuration.
pub fn fit(
    samples: &[(f64, f64)],
    basis: &dyn BasisProvider,
    config: &SmootherConfig,
) -> Result<FitResult> {
    Smoother::with_config(config.clone()).fit(samples, basis)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BSplineBasis, FourierBasis, PolynomialBasis};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn parabola() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)]
    }

    #[test]
    fn test_fixed_lambda_skips_selection() {
        let basis = PolynomialBasis::new(2, (0.0, 3.0)).unwrap();
        let fit = Smoother::new().lambda(0.5).fit(&parabola(), &basis).unwrap();
        assert_eq!(fit.lambda_used, 0.5);
        assert!(fit.selection_trace.is_none());
    }

    #[test]
    fn test_selected_fit_carries_trace() {
        let basis = PolynomialBasis::new(2, (0.0, 3.0)).unwrap();
        let samples: Vec<(f64, f64)> = (0..30)
            .map(|i| {
                let t = i as f64 * 0.1;
                (t, t * t + 0.05 * (13.0 * t).sin())
            })
            .collect();
        let fit = Smoother::new().fit(&samples, &basis).unwrap();
        assert_eq!(fit.selection_trace.as_ref().unwrap().len(), 20);
        assert!(fit.diagnostics.gcv.is_finite());
    }

    #[test]
    fn test_empty_samples() {
        let basis = PolynomialBasis::new(1, (0.0, 1.0)).unwrap();
        let err = Smoother::new().fit(&[], &basis).unwrap_err();
        assert!(matches!(err, PlsSmoothError::EmptyInput(_)));
    }

    #[test]
    fn test_out_of_domain_sample() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 6, 3).unwrap();
        let err = Smoother::new()
            .lambda(1.0)
            .fit(&[(0.2, 1.0), (1.5, 2.0)], &basis)
            .unwrap_err();
        assert_eq!(err, PlsSmoothError::OutOfDomain { value: 1.5, lower: 0.0, upper: 1.0 });
    }

    #[test]
    fn test_non_finite_inputs() {
        let basis = PolynomialBasis::new(1, (0.0, 1.0)).unwrap();
        let err = Smoother::new().fit(&[(0.5, f64::NAN)], &basis).unwrap_err();
        assert!(matches!(err, PlsSmoothError::InvalidValue(_)));
        let err = Smoother::new().fit(&[(f64::NAN, 1.0)], &basis).unwrap_err();
        assert!(matches!(err, PlsSmoothError::InvalidValue(_)));
    }

    #[test]
    fn test_invalid_derivative_order_surfaces() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 6, 2).unwrap();
        let err = Smoother::new()
            .derivative_order(3)
            .lambda(1.0)
            .fit(&[(0.1, 1.0), (0.5, 0.0), (0.9, 1.0)], &basis)
            .unwrap_err();
        assert_eq!(err, PlsSmoothError::InvalidDerivativeOrder { order: 3, max: 2 });
    }

    #[test]
    fn test_predict_matches_fitted_values_at_samples() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 8, 3).unwrap();
        let samples: Vec<(f64, f64)> = (0..25)
            .map(|i| {
                let t = i as f64 / 24.0;
                (t, (4.0 * t).cos())
            })
            .collect();
        let fit = Smoother::new().lambda(1e-3).fit(&samples, &basis).unwrap();
        let t: Array1<f64> = samples.iter().map(|s| s.0).collect();
        let predicted = fit.predict(&basis, &t).unwrap();
        for (p, f) in predicted.iter().zip(fit.fitted_values.iter()) {
            assert_abs_diff_eq!(p, f, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_predict_derivative_of_line() {
        let basis = PolynomialBasis::new(1, (0.0, 3.0)).unwrap();
        let fit = Smoother::new().lambda(0.0).fit(&parabola(), &basis).unwrap();
        let slope = fit.predict_derivative(&basis, &array![0.5, 2.5], 1).unwrap();
        assert_abs_diff_eq!(slope[0], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(slope[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_predict_with_wrong_basis() {
        let basis = PolynomialBasis::new(1, (0.0, 3.0)).unwrap();
        let other = FourierBasis::new(5, (0.0, 3.0)).unwrap();
        let fit = Smoother::new().lambda(0.0).fit(&parabola(), &basis).unwrap();
        let err = fit.predict(&other, &array![1.0]).unwrap_err();
        assert_eq!(err, PlsSmoothError::Dimension { expected: 2, found: 5 });
    }

    #[test]
    fn test_fit_curves_shape_and_shared_lambda() {
        let basis = FourierBasis::new(5, (0.0, 1.0)).unwrap();
        let t = Array1::linspace(0.0, 1.0, 40);
        let mut y = Array2::zeros((3, 40));
        for (s, mut row) in y.rows_mut().into_iter().enumerate() {
            let phase = s as f64;
            row.assign(&t.mapv(|ti| (2.0 * std::f64::consts::PI * ti + phase).sin()));
        }
        let fit = Smoother::new().fit_curves(&t, &y, &basis).unwrap();
        assert_eq!(fit.n_curves(), 3);
        assert_eq!(fit.coefficients.shape(), &[3, 5]);
        assert_eq!(fit.fitted_values.shape(), &[3, 40]);
        assert_eq!(fit.rss.len(), 3);

        let dense = Array1::linspace(0.0, 1.0, 7);
        assert_eq!(fit.predict(&basis, &dense).unwrap().shape(), &[3, 7]);
    }

    #[test]
    fn test_fit_curves_length_mismatch() {
        let basis = FourierBasis::new(3, (0.0, 1.0)).unwrap();
        let t = Array1::linspace(0.0, 1.0, 10);
        let y = Array2::zeros((2, 9));
        let err = Smoother::new().fit_curves(&t, &y, &basis).unwrap_err();
        assert!(matches!(err, PlsSmoothError::DimensionMismatch(_)));
    }

    #[test]
    fn test_free_function_uses_config() {
        let basis = PolynomialBasis::new(1, (0.0, 3.0)).unwrap();
        let config = SmootherConfig {
            lambda: Some(0.0),
            ..SmootherConfig::default()
        };
        let fit = fit(&parabola(), &basis, &config).unwrap();
        assert_eq!(fit.lambda_used, 0.0);
        assert_eq!(fit.derivative_order, 2);
    }
}
