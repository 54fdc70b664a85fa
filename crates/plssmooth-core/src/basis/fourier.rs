//! Fourier basis over one period.
//!
//! Functions are ordered 1, sin(ω₁s), cos(ω₁s), sin(ω₂s), cos(ω₂s), … with
//! s = t − lower and ω_j = 2πj / period. The functions are orthogonal over a
//! full period, so every derivative penalty is diagonal.

use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::{Array1, Array2};

use super::{check_derivative_order, BasisProvider, Domain};
use crate::error::{PlsSmoothError, Result};

#[derive(Debug, Clone)]
pub struct FourierBasis {
    n_basis: usize,
    lower: f64,
    upper: f64,
}

impl FourierBasis {
    /// Fourier basis with `n_basis` functions whose period is the domain length.
    pub fn new(n_basis: usize, domain: (f64, f64)) -> Result<Self> {
        Domain::interval(domain.0, domain.1)?;
        if n_basis == 0 {
            return Err(PlsSmoothError::InvalidValue(
                "a Fourier basis needs at least one function".to_string(),
            ));
        }
        Ok(Self {
            n_basis,
            lower: domain.0,
            upper: domain.1,
        })
    }

    pub fn period(&self) -> f64 {
        self.upper - self.lower
    }

    /// Angular frequency of basis function j (0 for the constant).
    fn frequency(&self, j: usize) -> f64 {
        let harmonic = (j + 1) / 2;
        2.0 * PI * harmonic as f64 / self.period()
    }
}

impl BasisProvider for FourierBasis {
    fn dimension(&self) -> usize {
        self.n_basis
    }

    fn domain(&self) -> Domain {
        Domain::Interval {
            lower: self.lower,
            upper: self.upper,
        }
    }

    fn evaluate_derivative(&self, points: &Array1<f64>, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        let shift = order as f64 * FRAC_PI_2;
        Ok(Array2::from_shape_fn((points.len(), self.n_basis), |(i, j)| {
            let s = points[i] - self.lower;
            if j == 0 {
                return if order == 0 { 1.0 } else { 0.0 };
            }
            let omega = self.frequency(j);
            let amplitude = omega.powi(order as i32);
            if j % 2 == 1 {
                amplitude * (omega * s + shift).sin()
            } else {
                amplitude * (omega * s + shift).cos()
            }
        }))
    }

    fn penalty(&self, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        let period = self.period();
        let mut penalty = Array2::zeros((self.n_basis, self.n_basis));
        penalty[[0, 0]] = if order == 0 { period } else { 0.0 };
        for j in 1..self.n_basis {
            penalty[[j, j]] = self.frequency(j).powi(2 * order as i32) * period / 2.0;
        }
        Ok(penalty)
    }
}
