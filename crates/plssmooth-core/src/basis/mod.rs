// =============================================================================
// Basis Systems
// =============================================================================
//
// The solver core never looks inside a basis. It only needs four things:
//
//   - evaluate(points)      → n × k matrix, B[i][j] = φ_j(t_i)
//   - penalty(order)        → k × k roughness matrix ∫ D^m φ_i · D^m φ_j
//   - dimension()           → k
//   - domain()              → where the basis is defined
//
// The `BasisProvider` trait captures exactly that. New basis systems plug in by
// implementing it; nothing in `design`, `penalty`, `solvers` or `smoother`
// changes.
//
// Three reference systems ship with the crate:
//
//   - PolynomialBasis: monomials on a scaled interval
//   - BSplineBasis:    clamped B-splines (derivative or difference penalty)
//   - FourierBasis:    1, sin, cos pairs over one period
//
// =============================================================================

mod bspline;
mod fourier;
mod polynomial;

pub use bspline::BSplineBasis;
pub use fourier::FourierBasis;
pub use polynomial::PolynomialBasis;

use ndarray::{Array1, Array2};

use crate::error::{PlsSmoothError, Result};

/// Relative slack at the interval ends, so that grids such as
/// `linspace(lower, upper, n)` pass despite rounding in the last point.
const BOUNDARY_SLACK: f64 = 1e-12;

/// Region of the real line on which a basis is defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    /// Any finite point is admissible.
    Unrestricted,
    /// Closed interval [lower, upper].
    Interval { lower: f64, upper: f64 },
}

impl Domain {
    /// Build a closed interval, validating that it is finite and non-empty.
    pub fn interval(lower: f64, upper: f64) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(PlsSmoothError::InvalidValue(format!(
                "domain bounds must be finite with lower < upper, got [{}, {}]",
                lower, upper
            )));
        }
        Ok(Domain::Interval { lower, upper })
    }

    /// Whether `t` lies inside the domain.
    pub fn contains(&self, t: f64) -> bool {
        match *self {
            Domain::Unrestricted => t.is_finite(),
            Domain::Interval { lower, upper } => {
                let slack = BOUNDARY_SLACK * (upper - lower);
                t >= lower - slack && t <= upper + slack
            }
        }
    }

    /// Check every point, failing with `OutOfDomain` on the first violation.
    pub fn check_points(&self, points: &Array1<f64>) -> Result<()> {
        if let Domain::Interval { lower, upper } = *self {
            if let Some(&value) = points.iter().find(|&&t| !self.contains(t)) {
                return Err(PlsSmoothError::OutOfDomain { value, lower, upper });
            }
        }
        Ok(())
    }
}

/// Capability consumed by the smoothing core.
///
/// Implementations must be deterministic: evaluating the same points twice
/// has to produce the same matrix, and `dimension()` must agree with the
/// number of columns returned by `evaluate`.
pub trait BasisProvider: Send + Sync {
    /// Number of basis functions k.
    fn dimension(&self) -> usize;

    /// Domain on which the basis is defined.
    fn domain(&self) -> Domain {
        Domain::Unrestricted
    }

    /// Highest derivative order that can be penalized or evaluated.
    /// `None` means the basis is infinitely differentiable.
    fn max_derivative_order(&self) -> Option<usize> {
        None
    }

    /// Evaluate all basis functions at `points`, returning an n × k matrix.
    fn evaluate(&self, points: &Array1<f64>) -> Result<Array2<f64>> {
        self.evaluate_derivative(points, 0)
    }

    /// Evaluate the `order`-th derivative of all basis functions at `points`.
    fn evaluate_derivative(&self, points: &Array1<f64>, order: usize) -> Result<Array2<f64>>;

    /// Roughness penalty matrix for the given derivative order (k × k).
    fn penalty(&self, order: usize) -> Result<Array2<f64>>;
}

/// Fail with `InvalidDerivativeOrder` when `order` exceeds what the basis supports.
pub(crate) fn check_derivative_order(basis: &dyn BasisProvider, order: usize) -> Result<()> {
    match basis.max_derivative_order() {
        Some(max) if order > max => Err(PlsSmoothError::InvalidDerivativeOrder { order, max }),
        _ => Ok(()),
    }
}

/// Gauss–Legendre nodes and weights on [-1, 1].
///
/// An `n`-point rule integrates polynomials of degree 2n − 1 exactly. Nodes are
/// found by Newton iteration on P_n starting from the Chebyshev-like guess.
pub(crate) fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let nf = n as f64;

    for i in 0..(n + 1) / 2 {
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            // Three-term recurrence for P_n(x) and P_{n-1}(x)
            let mut p0 = 1.0;
            let mut p1 = x;
            for j in 2..=n {
                let jf = j as f64;
                let p2 = ((2.0 * jf - 1.0) * x * p1 - (jf - 1.0) * p0) / jf;
                p0 = p1;
                p1 = p2;
            }
            let pn = if n == 1 { x } else { p1 };
            let pn_1 = if n == 1 { 1.0 } else { p0 };
            dp = nf * (x * pn - pn_1) / (x * x - 1.0);
            let dx = pn / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}
