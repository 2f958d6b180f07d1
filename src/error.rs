//! Error types
//!
//! Every fallible operation in the crate returns [`NufftError`]. The variants
//! fall into four kinds (see [`ErrorKind`]): configuration problems caught at
//! construction, buffer/shape validation failures, numeric hazards during
//! density estimation, and failures reported by a transform backend.

use thiserror::Error;

use crate::shape::ImageShape;

/// Result type for NUFFT operations
pub type Result<T> = std::result::Result<T, NufftError>;

/// Broad classification of a [`NufftError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid construction parameters; not recoverable by retrying
    Configuration,
    /// A buffer or array does not have the expected shape
    Validation,
    /// A computation would divide by zero or produced non-finite values
    NumericHazard,
    /// The raw transform backend reported a failure
    RuntimeBackend,
}

/// Errors that can occur while building or applying a Fourier operator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NufftError {
    /// Coil count below one
    #[error("n_coils should be >= 1, got {0}")]
    InvalidCoilCount(usize),

    /// Explicit density weights do not match the number of samples
    #[error("density array and samples array should have the same length ({density} weights for {samples} samples)")]
    DensityLengthMismatch { density: usize, samples: usize },

    /// Requested backend is unknown or not compiled in
    #[error("NUFFT backend '{0}' is not available")]
    BackendUnavailable(String),

    /// Any other invalid construction parameter
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Buffer or array length mismatch
    #[error("{what} has {actual} elements, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Array with the right length laid out on a different grid
    #[error("{what} are shaped {actual}, expected {expected}")]
    GridMismatch {
        what: &'static str,
        expected: ImageShape,
        actual: ImageShape,
    },

    /// Division by a vanishing or non-finite quantity
    #[error("numeric hazard: {0}")]
    NumericHazard(String),

    /// Non-zero status returned by a transform backend
    #[error("backend '{backend}' failed with status {status}: {message}")]
    Backend {
        backend: &'static str,
        status: i32,
        message: String,
    },
}

impl NufftError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            NufftError::InvalidCoilCount(_)
            | NufftError::DensityLengthMismatch { .. }
            | NufftError::BackendUnavailable(_)
            | NufftError::Configuration(_) => ErrorKind::Configuration,
            NufftError::ShapeMismatch { .. } | NufftError::GridMismatch { .. } => ErrorKind::Validation,
            NufftError::NumericHazard(_) => ErrorKind::NumericHazard,
            NufftError::Backend { .. } => ErrorKind::RuntimeBackend,
        }
    }

    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        NufftError::ShapeMismatch { what, expected, actual }
    }
}

/// Check that a buffer has exactly the expected length
#[inline]
pub(crate) fn ensure_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(NufftError::shape(what, expected, actual));
    }
    Ok(())
}
