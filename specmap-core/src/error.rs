//! Error types for specmap-core.

use thiserror::Error;

/// Result type alias for specmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for specmap operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Mapping or analysis requested on a dataset without spatial coordinates.
    #[error("dataset is non-spatial or non-contiguous; mapping functions are not available")]
    NonSpatial,

    /// Two operands disagree on a dimension.
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Filter window is zero, even, or wider than the spectrum.
    #[error("invalid window size {window} for spectra with {channels} channels")]
    InvalidWindow { window: usize, channels: usize },

    /// Spectral region bounds are reversed or outside the spectrum.
    #[error("invalid spectral region [{min}, {max}] for spectra with {channels} channels")]
    InvalidRegion {
        min: usize,
        max: usize,
        channels: usize,
    },

    /// Lower wavelength bound lies beyond the spectral axis.
    #[error("no channel found at or beyond wavelength {0}")]
    WavelengthNotFound(f64),

    /// Requested component/endmember does not exist in the cached result.
    #[error("component {index} requested but only {available} available")]
    ComponentOutOfRange { index: usize, available: usize },

    /// A row index supplied to a sub-selection is outside the dataset.
    #[error("row index {index} out of range for dataset with {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },

    /// Dataset contains no spectra.
    #[error("dataset contains no spectra")]
    EmptyDataset,

    /// Method is declared but has no implementation.
    #[error("method not supported: {0}")]
    Unsupported(String),

    /// Method name not recognised.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Parameter outside its valid domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numerical decomposition did not produce a usable result.
    #[error("decomposition failed: {0}")]
    Decomposition(String),
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidParameter(err.to_string())
    }
}
