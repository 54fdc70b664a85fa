// =============================================================================
// Design Matrix
// =============================================================================
//
// B(t) is the n × k matrix of basis functions evaluated at the sample points,
// B[i][j] = φ_j(t_i). It is built once per fit and reused for every λ the
// selector tries.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::basis::BasisProvider;
use crate::error::{PlsSmoothError, Result};

/// Assemble the n × k design matrix for `points`.
///
/// Fails with `Dimension` when the basis produces a column count different
/// from the dimension it reports, or a row count different from the number of
/// points.
pub fn design_matrix(points: &Array1<f64>, basis: &dyn BasisProvider) -> Result<Array2<f64>> {
    let n = points.len();
    let k = basis.dimension();

    if n == 0 {
        return Err(PlsSmoothError::EmptyInput("no evaluation points".to_string()));
    }
    if k == 0 {
        return Err(PlsSmoothError::Dimension { expected: 1, found: 0 });
    }

    let b = basis.evaluate(points)?;

    if b.ncols() != k {
        return Err(PlsSmoothError::Dimension {
            expected: k,
            found: b.ncols(),
        });
    }
    if b.nrows() != n {
        return Err(PlsSmoothError::DimensionMismatch(format!(
            "basis returned {} rows for {} evaluation points",
            b.nrows(),
            n
        )));
    }
    if b.iter().any(|v| !v.is_finite()) {
        return Err(PlsSmoothError::InvalidValue(
            "basis evaluation produced non-finite values".to_string(),
        ));
    }

    Ok(b)
}
