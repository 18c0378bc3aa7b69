use thiserror::Error;

/// Errors that abort an embedding run
///
/// Argument errors are raised before any computation starts. Invariant
/// violations indicate a bug in graph construction. Degenerate distances
/// and curve-fit failures make the remaining pipeline meaningless.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UmapError {
    /// Malformed dimensions or parameters
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Two inputs that must agree in shape do not
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A point has no strictly positive distance to any of its neighbours
    #[error("Point {point} has no neighbour at a non-zero distance")]
    DegenerateDistances { point: usize },

    /// Entry (row, col) differs from entry (col, row)
    #[error("Fuzzy simplicial set is not symmetric at ({row}, {col})")]
    AsymmetricGraph { row: usize, col: usize },

    /// Self-loop stored in a fuzzy simplicial set
    #[error("Fuzzy simplicial set has a non-zero diagonal entry at vertex {vertex}")]
    NonZeroDiagonal { vertex: usize },

    /// Membership strength outside of [0, 1]
    #[error("Membership strength at ({row}, {col}) is outside of [0, 1]")]
    WeightOutOfRange { row: usize, col: usize },

    /// The (a, b) curve fit did not produce usable parameters
    #[error("Curve fit failed: {0}")]
    CurveFit(String),
}

/// Reasons why the spectral initialisation fell back to a random layout
///
/// These never abort the pipeline; they travel inside
/// [`crate::data::init::SpectralLayout::Fallback`].
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SpectralError {
    /// Vertex without any incident edge, so `D^(-1/2)` is undefined
    #[error("Vertex {vertex} has zero degree")]
    IsolatedVertex { vertex: usize },

    /// Not enough vertices for the requested number of eigenvectors
    #[error("Need more than {required} vertices, got {n_vertices}")]
    TooFewVertices { n_vertices: usize, required: usize },

    /// Krylov iterations exhausted before the residuals dropped below tol
    #[error("Eigensolver did not converge within {iterations} iterations (residual {residual:.3e})")]
    NonConvergence { iterations: usize, residual: f64 },

    /// The dense projected eigenproblem could not be solved
    #[error("Dense eigendecomposition failed: {0}")]
    DenseSolver(String),

    /// Eigenvectors contained NaN or infinite values
    #[error("Eigenvectors contain non-finite values")]
    NonFinite,
}

pub type Result<T> = std::result::Result<T, UmapError>;
