// =============================================================================
// Error Types
// =============================================================================
//
// Every fallible operation in the library returns `Result<T>`, an alias for
// `std::result::Result<T, PlsSmoothError>`.
//
// None of these errors are recovered internally. The one silent recovery in
// the crate is the Cholesky → pseudo-inverse switch inside the regularized
// solver, which is a choice of factorization rather than an error path.
//
// =============================================================================

use thiserror::Error;

/// Errors surfaced by a smoothing fit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlsSmoothError {
    /// Shapes of the design matrix, penalty matrix and response disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The basis reported a dimension that does not match what it produced.
    #[error("Basis dimension error: expected {expected} basis functions, got {found}")]
    Dimension { expected: usize, found: usize },

    /// The requested derivative order exceeds the basis' differentiability.
    #[error("Invalid derivative order {order}: basis is only differentiable up to order {max}")]
    InvalidDerivativeOrder { order: usize, max: usize },

    /// The regularized system could not be solved even by the pseudo-inverse.
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// No candidate smoothing parameter leaves positive residual degrees of freedom.
    #[error("Degenerate fit: {0}")]
    DegenerateFit(String),

    /// A sample point falls outside the domain declared by the basis.
    #[error("Sample point {value} lies outside the basis domain [{lower}, {upper}]")]
    OutOfDomain { value: f64, lower: f64, upper: f64 },

    /// The sample set (or another required input) is empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A value is non-finite or otherwise out of its admissible range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlsSmoothError>;
