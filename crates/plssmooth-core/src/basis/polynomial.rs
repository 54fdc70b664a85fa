//! Monomial basis on a bounded interval.
//!
//! Basis functions are powers of the scaled variable u = (t − mid) / half,
//! which maps the domain onto [−1, 1] and keeps BᵀB well conditioned for the
//! low degrees this basis is meant for.

use ndarray::{Array1, Array2};

use super::{check_derivative_order, BasisProvider, Domain};
use crate::error::{PlsSmoothError, Result};

/// Polynomial basis {1, u, u², …, u^degree}.
#[derive(Debug, Clone)]
pub struct PolynomialBasis {
    degree: usize,
    lower: f64,
    upper: f64,
}

impl PolynomialBasis {
    /// Create a polynomial basis of the given degree on [lower, upper].
    pub fn new(degree: usize, domain: (f64, f64)) -> Result<Self> {
        Domain::interval(domain.0, domain.1)?;
        Ok(Self {
            degree,
            lower: domain.0,
            upper: domain.1,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    fn half_width(&self) -> f64 {
        0.5 * (self.upper - self.lower)
    }
}

/// j! / (j − m)!, zero when m > j.
fn falling_factorial(j: usize, m: usize) -> f64 {
    if m > j {
        return 0.0;
    }
    ((j - m + 1)..=j).map(|v| v as f64).product()
}

impl BasisProvider for PolynomialBasis {
    fn dimension(&self) -> usize {
        self.degree + 1
    }

    fn domain(&self) -> Domain {
        Domain::Interval {
            lower: self.lower,
            upper: self.upper,
        }
    }

    fn evaluate_derivative(&self, points: &Array1<f64>, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        let k = self.dimension();
        let mid = self.midpoint();
        let half = self.half_width();
        let chain = half.powi(-(order as i32));

        Ok(Array2::from_shape_fn((points.len(), k), |(i, j)| {
            let u = (points[i] - mid) / half;
            match falling_factorial(j, order) {
                c if c == 0.0 => 0.0,
                c => c * u.powi((j - order) as i32) * chain,
            }
        }))
    }

    fn penalty(&self, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        let k = self.dimension();
        let half = self.half_width();
        // dt = half · du and each derivative picks up 1 / half
        let scale = half.powi(1 - 2 * order as i32);

        let mut penalty = Array2::zeros((k, k));
        for i in order..k {
            for j in order..k {
                let power = i + j - 2 * order;
                if power % 2 == 1 {
                    continue;
                }
                let integral = 2.0 / (power as f64 + 1.0);
                penalty[[i, j]] =
                    falling_factorial(i, order) * falling_factorial(j, order) * integral * scale;
            }
        }

        if penalty.iter().any(|v: &f64| !v.is_finite()) {
            return Err(PlsSmoothError::InvalidValue(format!(
                "polynomial penalty of order {} overflowed",
                order
            )));
        }
        Ok(penalty)
    }
}
