//! Clamped B-spline basis.
//!
//! Evaluation is the bottom-up Cox–de Boor recursion. Derivatives reuse the
//! same recursion: start from the degree (p − r) values and apply
//!
//!   D^s B_{i,q} = q · [ D^{s-1}B_{i,q-1} / (t_{i+q} − t_i)
//!                     − D^{s-1}B_{i+1,q-1} / (t_{i+q+1} − t_{i+1}) ]
//!
//! r times. The roughness penalty integrates products of m-th derivatives with
//! a Gauss–Legendre rule on every knot span, which is exact because the
//! integrand is piecewise polynomial.

use ndarray::{s, Array1, Array2};

use super::{check_derivative_order, gauss_legendre, BasisProvider, Domain};
use crate::error::{PlsSmoothError, Result};
use crate::penalty::difference_penalty;

/// B-spline basis with a clamped knot vector.
#[derive(Debug, Clone)]
pub struct BSplineBasis {
    knots: Vec<f64>,
    degree: usize,
    difference_penalty: bool,
}

impl BSplineBasis {
    /// Uniform clamped basis with `n_basis` functions of the given degree on `domain`.
    pub fn uniform(domain: (f64, f64), n_basis: usize, degree: usize) -> Result<Self> {
        Domain::interval(domain.0, domain.1)?;
        if n_basis < degree + 1 {
            return Err(PlsSmoothError::InvalidValue(format!(
                "a degree {} B-spline basis needs at least {} functions, got {}",
                degree,
                degree + 1,
                n_basis
            )));
        }
        let n_breaks = n_basis - degree + 1;
        let breaks = Array1::linspace(domain.0, domain.1, n_breaks);

        let mut knots = Vec::with_capacity(n_basis + degree + 1);
        knots.extend(std::iter::repeat(domain.0).take(degree));
        knots.extend(breaks.iter().copied());
        knots.extend(std::iter::repeat(domain.1).take(degree));
        Self::with_knots(knots, degree)
    }

    /// Basis from an explicit, non-decreasing knot vector.
    ///
    /// The first and last `degree + 1` knots are expected to coincide with the
    /// domain ends. The domain is `[knots[degree], knots[len − degree − 1]]`.
    pub fn with_knots(knots: Vec<f64>, degree: usize) -> Result<Self> {
        if knots.len() < 2 * (degree + 1) {
            return Err(PlsSmoothError::InvalidValue(format!(
                "degree {} needs at least {} knots, got {}",
                degree,
                2 * (degree + 1),
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(PlsSmoothError::InvalidValue(
                "knot vector contains non-finite values".to_string(),
            ));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(PlsSmoothError::InvalidValue(
                "knot vector is not non-decreasing".to_string(),
            ));
        }
        let basis = Self {
            knots,
            degree,
            difference_penalty: false,
        };
        let (lower, upper) = basis.bounds();
        Domain::interval(lower, upper)?;
        Ok(basis)
    }

    /// Penalize coefficient differences (P-spline) instead of integrated derivatives.
    pub fn with_difference_penalty(mut self) -> Self {
        self.difference_penalty = true;
        self
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    fn bounds(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.knots.len() - self.degree - 1])
    }

    /// Degree-0 indicator values; the right domain end belongs to the last non-empty span.
    fn indicator_values(&self, x: f64) -> Vec<f64> {
        let t = &self.knots;
        let mut vals = vec![0.0; t.len() - 1];
        let (lower, upper) = self.bounds();
        let x = x.max(lower);
        if x >= upper {
            if let Some(j) = (0..t.len() - 1).rev().find(|&j| t[j] < t[j + 1] && t[j + 1] <= upper) {
                vals[j] = 1.0;
            }
            return vals;
        }
        if let Some(j) = (0..t.len() - 1).find(|&j| t[j] <= x && x < t[j + 1]) {
            vals[j] = 1.0;
        }
        vals
    }

    /// Values of all basis functions of `degree` at x (length knots − degree − 1).
    fn values_of_degree(&self, x: f64, degree: usize) -> Vec<f64> {
        let t = &self.knots;
        let mut vals = self.indicator_values(x);
        for q in 1..=degree {
            let len = t.len() - q - 1;
            let next: Vec<f64> = (0..len)
                .map(|i| {
                    let left = ratio(x - t[i], t[i + q] - t[i]) * vals[i];
                    let right = ratio(t[i + q + 1] - x, t[i + q + 1] - t[i + 1]) * vals[i + 1];
                    left + right
                })
                .collect();
            vals = next;
        }
        vals
    }

    /// `order`-th derivative of every basis function at x.
    fn derivative_row(&self, x: f64, order: usize) -> Vec<f64> {
        let t = &self.knots;
        let p = self.degree;
        if order > p {
            return vec![0.0; t.len() - p - 1];
        }
        let mut vals = self.values_of_degree(x, p - order);
        for q in (p - order + 1)..=p {
            let qf = q as f64;
            let len = t.len() - q - 1;
            let next: Vec<f64> = (0..len)
                .map(|i| {
                    qf * (ratio(vals[i], t[i + q] - t[i])
                        - ratio(vals[i + 1], t[i + q + 1] - t[i + 1]))
                })
                .collect();
            vals = next;
        }
        vals
    }

    fn integrated_derivative_penalty(&self, order: usize) -> Array2<f64> {
        let k = self.dimension();
        let (nodes, weights) = gauss_legendre(self.degree + 1);
        let mut penalty = Array2::zeros((k, k));

        for span in self.knots.windows(2) {
            let (a, b) = (span[0], span[1]);
            if b <= a {
                continue;
            }
            let half = 0.5 * (b - a);
            let mid = 0.5 * (a + b);
            for (&u, &w) in nodes.iter().zip(&weights) {
                let row = self.derivative_row(mid + half * u, order);
                let wt = w * half;
                for i in 0..k {
                    if row[i] == 0.0 {
                        continue;
                    }
                    for j in 0..k {
                        penalty[[i, j]] += wt * row[i] * row[j];
                    }
                }
            }
        }
        penalty
    }
}

/// num / den with the B-spline convention 0/0 = 0.
#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl BasisProvider for BSplineBasis {
    fn dimension(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    fn domain(&self) -> Domain {
        let (lower, upper) = self.bounds();
        Domain::Interval { lower, upper }
    }

    fn max_derivative_order(&self) -> Option<usize> {
        Some(self.degree)
    }

    fn evaluate_derivative(&self, points: &Array1<f64>, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        let k = self.dimension();
        let mut b = Array2::zeros((points.len(), k));
        for (i, &x) in points.iter().enumerate() {
            let row = self.derivative_row(x, order);
            b.slice_mut(s![i, ..]).assign(&Array1::from_vec(row));
        }
        Ok(b)
    }

    fn penalty(&self, order: usize) -> Result<Array2<f64>> {
        check_derivative_order(self, order)?;
        if self.difference_penalty {
            return difference_penalty(self.dimension(), order);
        }
        Ok(self.integrated_derivative_penalty(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_uniform_knot_layout() {
        let basis = BSplineBasis::uniform((-1.0, 1.0), 8, 3).unwrap();
        assert_eq!(basis.dimension(), 8);
        assert_eq!(basis.knots().len(), 12);
        assert_eq!(basis.domain(), Domain::Interval { lower: -1.0, upper: 1.0 });
    }

    #[test]
    fn test_partition_of_unity() {
        let basis = BSplineBasis::uniform((0.0, 10.0), 9, 3).unwrap();
        let x = Array1::linspace(0.0, 10.0, 41);
        let b = basis.evaluate(&x).unwrap();
        for row in b.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|&v| v >= -1e-15));
        }
    }

    #[test]
    fn test_right_endpoint_is_interpolated() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 6, 3).unwrap();
        let b = basis.evaluate(&Array1::from_vec(vec![1.0])).unwrap();
        assert_abs_diff_eq!(b[[0, 5]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 7, 3).unwrap();
        let h = 1e-6;
        let x = 0.37;
        let d = basis.evaluate_derivative(&Array1::from_vec(vec![x]), 1).unwrap();
        let plus = basis.evaluate(&Array1::from_vec(vec![x + h])).unwrap();
        let minus = basis.evaluate(&Array1::from_vec(vec![x - h])).unwrap();
        for j in 0..7 {
            let fd = (plus[[0, j]] - minus[[0, j]]) / (2.0 * h);
            assert_abs_diff_eq!(d[[0, j]], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_second_derivative_penalty_annihilates_linear_functions() {
        // Greville abscissae give the coefficients of f(t) = t
        let basis = BSplineBasis::uniform((0.0, 2.0), 8, 3).unwrap();
        let t = basis.knots();
        let c: Array1<f64> = (0..8).map(|i| (t[i + 1] + t[i + 2] + t[i + 3]) / 3.0).collect();
        let p = basis.penalty(2).unwrap();
        let roughness = c.dot(&p.dot(&c));
        assert_abs_diff_eq!(roughness, 0.0, epsilon = 1e-10);

        // and the constant function
        let ones = Array1::<f64>::ones(8);
        assert_abs_diff_eq!(ones.dot(&p.dot(&ones)), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_penalty_is_symmetric() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 10, 3).unwrap();
        let p = basis.penalty(2).unwrap();
        for i in 0..10 {
            for j in 0..10 {
                assert_abs_diff_eq!(p[[i, j]], p[[j, i]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_derivative_order_above_degree_is_rejected() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 8, 3).unwrap();
        assert_eq!(
            basis.penalty(4).unwrap_err(),
            PlsSmoothError::InvalidDerivativeOrder { order: 4, max: 3 }
        );
    }

    #[test]
    fn test_difference_penalty_variant() {
        let basis = BSplineBasis::uniform((0.0, 1.0), 6, 3).unwrap().with_difference_penalty();
        let p = basis.penalty(2).unwrap();
        assert_eq!(p[[0, 0]], 1.0);
        assert_eq!(p[[0, 1]], -2.0);
        assert_eq!(p[[2, 2]], 6.0);
    }

    #[test]
    fn test_too_few_functions() {
        assert!(BSplineBasis::uniform((0.0, 1.0), 3, 3).is_err());
    }
}
