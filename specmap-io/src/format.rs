//! Native dataset file layout.
//!
//! A dataset file is the 8-byte magic `SPMAPDS1` followed by four matrix
//! fields in fixed order: spectra, x, y, wavelength. Each field is a pair of
//! little-endian `u64` (rows, columns) and then `rows * columns` little-endian
//! `f64` values in row-major order. Vectors are stored as single-column
//! matrices. A dataset without coordinates stores empty `x` and `y` fields.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// File signature.
pub const MAGIC: &[u8; 8] = b"SPMAPDS1";

/// Field names in storage order.
pub const FIELDS: [&str; 4] = ["spectra", "x", "y", "wavelength"];

/// Bytes in a field header (rows + columns).
pub(crate) const FIELD_HEADER_LEN: usize = 16;

/// Shape information read from a file header without loading the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileSummary {
    /// Number of spectra.
    pub rows: usize,
    /// Number of spectral channels.
    pub channels: usize,
    /// True when the file carries spatial coordinates.
    pub spatial: bool,
    /// Total file size in bytes.
    pub file_size: usize,
}
