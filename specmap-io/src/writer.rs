//! File writers for datasets and derived maps.

use crate::format::MAGIC;
use crate::Result;
use log::debug;
use ndarray::{ArrayBase, Data, Dimension};
use specmap_core::{DerivedMap, SpectralData};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for dataset files and map exports.
pub struct DataFileWriter {
    writer: BufWriter<File>,
}

impl DataFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes a dataset in the native binary layout.
    ///
    /// Format: magic, then spectra, x, y, wavelength. Each field is
    /// u64 (rows) + u64 (columns) + rows * columns f64, little-endian.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_dataset(&mut self, data: &SpectralData) -> Result<()> {
        self.writer.write_all(MAGIC)?;
        self.write_field(data.spectra(), data.spectra().nrows(), data.channels())?;
        self.write_field(data.x(), data.x().len(), 1)?;
        self.write_field(data.y(), data.y().len(), 1)?;
        self.write_field(data.wavelength(), data.wavelength().len(), 1)?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_field<S, D>(
        &mut self,
        values: &ArrayBase<S, D>,
        rows: usize,
        cols: usize,
    ) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.writer.write_all(&(rows as u64).to_le_bytes())?;
        self.writer.write_all(&(cols as u64).to_le_bytes())?;
        for v in values {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    /// Writes a derived map as CSV with an `x,y,value` header.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_map_csv(&mut self, map: &DerivedMap) -> Result<()> {
        writeln!(self.writer, "x,y,value")?;

        for ((x, y), value) in map.x().iter().zip(map.y()).zip(map.values()) {
            writeln!(self.writer, "{x},{y},{value}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Saves a dataset to `path` in the native binary layout.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn save_dataset<P: AsRef<Path>>(path: P, data: &SpectralData) -> Result<()> {
    let mut writer = DataFileWriter::create(&path)?;
    writer.write_dataset(data)?;
    debug!(
        "saved {}x{} spectra to {}",
        data.len(),
        data.channels(),
        path.as_ref().display()
    );
    Ok(())
}

/// Exports a derived map to a CSV file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_map_csv<P: AsRef<Path>>(path: P, map: &DerivedMap) -> Result<()> {
    DataFileWriter::create(path)?.write_map_csv(map)
}
