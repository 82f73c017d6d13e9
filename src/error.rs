//! Error types for vecspace

use thiserror::Error;

/// Result type alias for vecspace operations
pub type Result<T> = std::result::Result<T, SpaceError>;

/// Errors raised by the vector space and the search over it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpaceError {
    /// The token -> vector mapping could not be turned into a space
    #[error("Construction error: {0}")]
    Construction(String),

    /// Lookup of a token that is not in the vocabulary
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    /// Vector length differs from the space dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the space
        expected: usize,
        /// Length of the offending vector
        actual: usize,
    },

    /// Similarity is undefined for a zero vector
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// Malformed request parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SpaceError {
    pub(crate) fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}
