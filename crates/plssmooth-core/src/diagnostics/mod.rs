// =============================================================================
// Fit Diagnostics
// =============================================================================
//
// Summary measures of a completed smooth:
//
// - RSS:               Σ (y − ŷ)²
// - Residual variance: σ̂² = RSS / (n − df), the usual estimator for a
//                      linear smoother with effective degrees of freedom df
// - R²:                1 − RSS / TSS
// - GCV:               criterion value at the λ that was used
//
// =============================================================================

use ndarray::ArrayView1;

/// Goodness-of-fit summary for a single smoothed curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitDiagnostics {
    /// Number of observations n
    pub n_obs: usize,

    /// Residual sum of squares
    pub rss: f64,

    /// σ̂² = RSS / (n − df); NaN when n − df ≤ 0
    pub residual_variance: f64,

    /// Coefficient of determination; NaN when y is constant
    pub r_squared: f64,

    /// Effective degrees of freedom tr(H)
    pub effective_df: f64,

    /// GCV score at the λ used; +∞ when the fit is degenerate
    pub gcv: f64,
}

impl FitDiagnostics {
    pub(crate) fn new(
        y: ArrayView1<f64>,
        fitted: ArrayView1<f64>,
        rss: f64,
        effective_df: f64,
        gcv: f64,
    ) -> Self {
        let n_obs = y.len();
        Self {
            n_obs,
            rss,
            residual_variance: residual_variance(rss, n_obs, effective_df),
            r_squared: r_squared(y, fitted),
            effective_df,
            gcv,
        }
    }

    /// Residual degrees of freedom n − df.
    pub fn residual_df(&self) -> f64 {
        self.n_obs as f64 - self.effective_df
    }
}

/// σ̂² = RSS / (n − df), NaN when the residual degrees of freedom are not positive.
pub fn residual_variance(rss: f64, n_obs: usize, effective_df: f64) -> f64 {
    let df_resid = n_obs as f64 - effective_df;
    if df_resid <= 0.0 {
        return f64::NAN;
    }
    rss / df_resid
}

/// R² = 1 − RSS / TSS.
pub fn r_squared(y: ArrayView1<f64>, fitted: ArrayView1<f64>) -> f64 {
    let mean = match y.mean() {
        Some(m) => m,
        None => return f64::NAN,
    };
    let tss: f64 = y.iter().map(|&yi| (yi - mean).powi(2)).sum();
    if tss == 0.0 {
        return f64::NAN;
    }
    let rss: f64 = y
        .iter()
        .zip(fitted.iter())
        .map(|(&yi, &fi)| (yi - fi).powi(2))
        .sum();
    1.0 - rss / tss
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_residual_variance() {
        assert_abs_diff_eq!(residual_variance(6.0, 10, 4.0), 1.0);
        assert!(residual_variance(6.0, 4, 4.0).is_nan());
    }

    #[test]
    fn test_r_squared_perfect_and_mean_fit() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(r_squared(y.view(), y.view()), 1.0);
        let mean_fit = array![2.5, 2.5, 2.5, 2.5];
        assert_abs_diff_eq!(r_squared(y.view(), mean_fit.view()), 0.0);
    }

    #[test]
    fn test_r_squared_constant_response() {
        let y = array![2.0, 2.0];
        assert!(r_squared(y.view(), y.view()).is_nan());
    }

    #[test]
    fn test_summary_fields() {
        let y = array![0.0, 1.0, 4.0, 9.0];
        let fitted = array![-1.0, 2.0, 5.0, 8.0];
        let d = FitDiagnostics::new(y.view(), fitted.view(), 4.0, 2.0, 4.0);
        assert_eq!(d.n_obs, 4);
        assert_abs_diff_eq!(d.residual_variance, 2.0);
        assert_abs_diff_eq!(d.residual_df(), 2.0);
        assert!(d.r_squared > 0.9);
    }
}
