// =============================================================================
// Pointwise Confidence Bands
// =============================================================================
//
// For a penalized fit ĉ = M⁻¹Bᵀy with M = BᵀB + λP, the curve value at a new
// point t is f̂(t) = b(t)ᵀĉ and
//
//     Var f̂(t) ≈ σ̂² · b(t)ᵀ M⁻¹ b(t)
//
// with σ̂² = RSS / (n − df). This is the Bayesian (Wahba) variance, which
// absorbs the smoothing bias; it is the interval most smoothing packages
// report.
//
// The band uses a Student-t critical value on n − df degrees of freedom,
// switching to the normal quantile once df is large.
//
// =============================================================================

use ndarray::Array1;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::basis::BasisProvider;
use crate::error::{PlsSmoothError, Result};
use crate::smoother::FitResult;
use crate::solvers::gcv_optimizer::DEGENERATE_TOLERANCE;

/// Residual degrees of freedom above which the normal quantile is used.
const NORMAL_APPROXIMATION_DF: f64 = 1000.0;

/// Pointwise interval around a fitted curve.
#[derive(Debug, Clone)]
pub struct ConfidenceBand {
    /// Points at which the band is evaluated
    pub points: Array1<f64>,
    /// f̂(t)
    pub fitted: Array1<f64>,
    /// Standard error of f̂(t)
    pub standard_error: Array1<f64>,
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    /// Confidence level, e.g. 0.95
    pub level: f64,
}

/// Two-sided critical value for `level` on `df` degrees of freedom.
pub fn critical_value(level: f64, df: f64) -> Result<f64> {
    if level.is_nan() || level <= 0.0 || level >= 1.0 {
        return Err(PlsSmoothError::InvalidValue(format!(
            "confidence level must lie in (0, 1), got {}",
            level
        )));
    }
    if df.is_nan() || df <= 0.0 {
        return Err(PlsSmoothError::DegenerateFit(format!(
            "no residual degrees of freedom (df = {})",
            df
        )));
    }

    let p = 0.5 * (1.0 + level);
    if df > NORMAL_APPROXIMATION_DF {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| PlsSmoothError::InvalidValue(e.to_string()))?;
        return Ok(normal.inverse_cdf(p));
    }
    let t_dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| PlsSmoothError::InvalidValue(e.to_string()))?;
    Ok(t_dist.inverse_cdf(p))
}

/// Pointwise confidence band for `fit` at `points`.
///
/// `basis` must be the basis the fit was computed with. Fails with
/// `DegenerateFit` when the fit leaves no residual degrees of freedom.
pub fn confidence_band(
    fit: &FitResult,
    basis: &dyn BasisProvider,
    points: &Array1<f64>,
    level: f64,
) -> Result<ConfidenceBand> {
    let df_resid = fit.diagnostics.residual_df();
    if df_resid <= DEGENERATE_TOLERANCE * fit.diagnostics.n_obs as f64 {
        return Err(PlsSmoothError::DegenerateFit(format!(
            "fit interpolates the data (n − df = {:e})",
            df_resid
        )));
    }
    let critical = critical_value(level, df_resid)?;
    let sigma2 = fit.diagnostics.rss / df_resid;

    let fitted = fit.predict(basis, points)?;
    let b = basis.evaluate(points)?;
    let bv = b.dot(&fit.covariance_unscaled);

    // diag(B M⁻¹ Bᵀ) one row at a time
    let standard_error: Array1<f64> = bv
        .rows()
        .into_iter()
        .zip(b.rows())
        .map(|(bv_row, b_row)| (sigma2 * bv_row.dot(&b_row).max(0.0)).sqrt())
        .collect();

    let margin = &standard_error * critical;
    let lower = &fitted - &margin;
    let upper = &fitted + &margin;

    log::debug!(
        "{:.0}% band at {} points: critical value {:.4} on {:.2} df",
        100.0 * level,
        points.len(),
        critical,
        df_resid
    );

    Ok(ConfidenceBand {
        points: points.clone(),
        fitted,
        standard_error,
        lower,
        upper,
        level,
    })
}

// =============================================================================
// Tests
// =============================================================================
