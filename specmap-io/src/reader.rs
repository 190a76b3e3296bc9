//! Memory-mapped dataset reader.

use crate::format::{FileSummary, FIELDS, FIELD_HEADER_LEN, MAGIC};
use crate::{Error, Result};
use log::debug;
use memmap2::Mmap;
use ndarray::{Array1, Array2};
use specmap_core::SpectralData;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Memory-mapped file reader.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One stored matrix, still in its raw byte form.
struct Field<'a> {
    rows: usize,
    cols: usize,
    bytes: &'a [u8],
}

impl Field<'_> {
    fn to_matrix(&self, name: &str) -> Result<Array2<f64>> {
        let values: Vec<f64> = self
            .bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect();
        Array2::from_shape_vec((self.rows, self.cols), values)
            .map_err(|e| Error::InvalidFormat(format!("{name}: {e}")))
    }

    fn to_vector(&self, name: &str) -> Result<Array1<f64>> {
        if self.cols != 1 && self.rows * self.cols != 0 {
            return Err(Error::InvalidFormat(format!(
                "{name}: expected a single column, found {} columns",
                self.cols
            )));
        }
        Ok(self.to_matrix(name)?.into_iter().collect())
    }

    fn len(&self) -> usize {
        self.rows * self.cols
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let slice = bytes.get(offset..offset + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    Some(u64::from_le_bytes(buf))
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidFormat(format!("{what} {value} too large")))
}

/// Splits the file into its four fields.
fn parse_fields(bytes: &[u8]) -> Result<Vec<Field<'_>>> {
    if !bytes.starts_with(MAGIC) {
        return Err(Error::InvalidFormat("missing SPMAPDS1 signature".into()));
    }
    let mut offset = MAGIC.len();
    let mut fields = Vec::with_capacity(FIELDS.len());
    for name in FIELDS {
        let truncated = || Error::InvalidFormat(format!("{name}: truncated field header"));
        let rows = to_usize(read_u64(bytes, offset).ok_or_else(truncated)?, "row count")?;
        let cols = to_usize(read_u64(bytes, offset + 8).ok_or_else(truncated)?, "column count")?;
        offset += FIELD_HEADER_LEN;

        let byte_len = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(8))
            .ok_or_else(|| Error::InvalidFormat(format!("{name}: {rows}x{cols} overflows")))?;
        let end = offset
            .checked_add(byte_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "{name}: {rows}x{cols} values exceed the file size ({} bytes)",
                    bytes.len()
                ))
            })?;
        fields.push(Field {
            rows,
            cols,
            bytes: &bytes[offset..end],
        });
        offset = end;
    }
    if offset != bytes.len() {
        return Err(Error::InvalidFormat(format!(
            "{} trailing bytes after the last field",
            bytes.len() - offset
        )));
    }
    Ok(fields)
}

/// Reader for native dataset files.
pub struct DatasetFileReader {
    reader: MappedFileReader,
}

impl DatasetFileReader {
    /// Opens a dataset file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Reads the field shapes without decoding any values.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the layout is malformed.
    pub fn summary(&self) -> Result<FileSummary> {
        let fields = parse_fields(self.reader.as_bytes())?;
        Ok(FileSummary {
            rows: fields[0].rows,
            channels: fields[0].cols,
            spatial: fields[1].len() > 0 || fields[0].rows == 0,
            file_size: self.reader.len(),
        })
    }

    /// Decodes the whole dataset.
    ///
    /// Empty `x` and `y` fields with a non-empty matrix load as a dataset
    /// without coordinates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the layout is malformed, or
    /// [`Error::CoreError`] if the field shapes disagree.
    pub fn read(&self) -> Result<SpectralData> {
        let fields = parse_fields(self.reader.as_bytes())?;
        let spectra = fields[0].to_matrix(FIELDS[0])?;
        let x = fields[1].to_vector(FIELDS[1])?;
        let y = fields[2].to_vector(FIELDS[2])?;
        let wavelength = fields[3].to_vector(FIELDS[3])?;
        debug!(
            "read {}x{} spectra from {}",
            spectra.nrows(),
            spectra.ncols(),
            self.reader.path().display()
        );

        let data = if x.is_empty() && y.is_empty() && spectra.nrows() > 0 {
            SpectralData::without_coordinates(spectra, wavelength)?
        } else {
            SpectralData::new(spectra, wavelength, x, y)?
        };
        Ok(data)
    }
}

/// Loads a dataset saved with [`crate::save_dataset`].
///
/// # Errors
/// Returns an error if the file cannot be read or is malformed.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<SpectralData> {
    DatasetFileReader::open(path)?.read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn field(out: &mut Vec<u8>, rows: u64, cols: u64, values: &[f64]) {
        out.extend_from_slice(&rows.to_le_bytes());
        out.extend_from_slice(&cols.to_le_bytes());
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn write_bytes(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn two_by_three() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        field(&mut bytes, 2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        field(&mut bytes, 2, 1, &[0.0, 1.0]);
        field(&mut bytes, 2, 1, &[0.0, 0.0]);
        field(&mut bytes, 3, 1, &[500.0, 510.0, 520.0]);
        bytes
    }

    #[test]
    fn test_mapped_reader() {
        let file = write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 8);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes()[7], 8);
    }

    #[test]
    fn test_read_handwritten_file() {
        let file = write_bytes(&two_by_three());
        let reader = DatasetFileReader::open(file.path()).unwrap();
        let summary = reader.summary().unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.channels, 3);
        assert!(summary.spatial);

        let data = reader.read().unwrap();
        assert_eq!(data.spectra()[[1, 0]], 4.0);
        assert_eq!(data.x()[1], 1.0);
        assert_eq!(data.wavelength()[2], 520.0);
        assert!(!data.is_non_spatial());
    }

    #[test]
    fn test_missing_coordinates_load_non_spatial() {
        let mut bytes = MAGIC.to_vec();
        field(&mut bytes, 1, 2, &[1.0, 2.0]);
        field(&mut bytes, 0, 1, &[]);
        field(&mut bytes, 0, 1, &[]);
        field(&mut bytes, 2, 1, &[1.0, 2.0]);
        let file = write_bytes(&bytes);
        let data = load_dataset(file.path()).unwrap();
        assert!(data.is_non_spatial());
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut bytes = two_by_three();
        bytes[0] = b'X';
        let file = write_bytes(&bytes);
        assert!(matches!(
            load_dataset(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let bytes = two_by_three();
        let short = write_bytes(&bytes[..bytes.len() - 4]);
        assert!(matches!(
            load_dataset(short.path()),
            Err(Error::InvalidFormat(_))
        ));

        let mut long = bytes.clone();
        long.push(0);
        let long = write_bytes(&long);
        assert!(matches!(
            load_dataset(long.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_shape_disagreement_is_core_error() {
        let mut bytes = MAGIC.to_vec();
        field(&mut bytes, 2, 2, &[1.0, 2.0, 3.0, 4.0]);
        field(&mut bytes, 2, 1, &[0.0, 1.0]);
        field(&mut bytes, 2, 1, &[0.0, 0.0]);
        field(&mut bytes, 3, 1, &[1.0, 2.0, 3.0]);
        let file = write_bytes(&bytes);
        assert!(matches!(
            load_dataset(file.path()),
            Err(Error::CoreError(_))
        ));
    }
}
