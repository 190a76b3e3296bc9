//! Spectral data container.
//!
//! [`SpectralData`] holds the spectra matrix (rows are spatial observations,
//! columns are spectral channels), the shared wavelength axis, and the spatial
//! coordinates of every row. It validates shapes on construction and on every
//! replacement of the matrix, so `spectra.nrows() == x.len() == y.len()` and
//! `spectra.ncols() == wavelength.len()` hold for spatial data.
#![allow(clippy::float_cmp, clippy::missing_errors_doc)]

use crate::{Error, Result};
use log::warn;
use ndarray::{Array1, Array2, ArrayView1, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Inclusive range of spectral channel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelRange {
    /// First channel (inclusive).
    pub min: usize,
    /// Last channel (inclusive).
    pub max: usize,
}

impl ChannelRange {
    /// Creates a channel range.
    #[must_use]
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Number of channels covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.max.saturating_sub(self.min) + 1
    }

    /// Always false: a range covers at least one channel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Checks the range against a spectrum width.
    pub fn validate(&self, channels: usize) -> Result<()> {
        if self.min > self.max || self.max >= channels {
            return Err(Error::InvalidRegion {
                min: self.min,
                max: self.max,
                channels,
            });
        }
        Ok(())
    }
}

/// Outcome of a wavelength-to-channel lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLookup {
    /// Channels nearest the requested wavelengths.
    pub range: ChannelRange,
    /// True when the upper bound was not found and the range collapsed to a
    /// single channel.
    pub collapsed: bool,
}

/// Spectra matrix with its spectral and spatial axes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectralData {
    spectra: Array2<f64>,
    wavelength: Array1<f64>,
    x: Array1<f64>,
    y: Array1<f64>,
    non_spatial: bool,
    flipped: bool,
}

impl SpectralData {
    /// Creates a spatial dataset.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the axes do not match the matrix.
    pub fn new(
        spectra: Array2<f64>,
        wavelength: Array1<f64>,
        x: Array1<f64>,
        y: Array1<f64>,
    ) -> Result<Self> {
        check_len("wavelength", spectra.ncols(), wavelength.len())?;
        check_len("x", spectra.nrows(), x.len())?;
        check_len("y", spectra.nrows(), y.len())?;
        Ok(Self {
            spectra,
            wavelength,
            x,
            y,
            non_spatial: false,
            flipped: false,
        })
    }

    /// Creates a dataset without spatial coordinates.
    pub fn without_coordinates(spectra: Array2<f64>, wavelength: Array1<f64>) -> Result<Self> {
        check_len("wavelength", spectra.ncols(), wavelength.len())?;
        Ok(Self {
            spectra,
            wavelength,
            x: Array1::zeros(0),
            y: Array1::zeros(0),
            non_spatial: true,
            flipped: false,
        })
    }

    /// Copies the given rows into a new, non-spatial dataset.
    ///
    /// Coordinates of the selected rows are carried along but the result
    /// is excluded from mapping.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let rows = self.spectra.nrows();
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(Error::RowOutOfRange { index, rows });
        }
        let (x, y) = if self.has_coordinates() {
            (
                self.x.select(Axis(0), indices),
                self.y.select(Axis(0), indices),
            )
        } else {
            (Array1::zeros(0), Array1::zeros(0))
        };
        Ok(Self {
            spectra: self.spectra.select(Axis(0), indices),
            wavelength: self.wavelength.clone(),
            x,
            y,
            non_spatial: true,
            flipped: self.flipped,
        })
    }

    /// Marks the source layout as y-major (y varies fastest).
    #[must_use]
    pub fn with_flipped(mut self, flipped: bool) -> Self {
        self.flipped = flipped;
        self
    }

    /// Replaces all data at once.
    pub fn set_data(
        &mut self,
        spectra: Array2<f64>,
        wavelength: Array1<f64>,
        x: Array1<f64>,
        y: Array1<f64>,
    ) -> Result<()> {
        let replacement = Self::new(spectra, wavelength, x, y)?;
        self.spectra = replacement.spectra;
        self.wavelength = replacement.wavelength;
        self.x = replacement.x;
        self.y = replacement.y;
        Ok(())
    }

    /// Swaps in a new spectra matrix of identical shape, returning the old one.
    pub fn replace_spectra(&mut self, spectra: Array2<f64>) -> Result<Array2<f64>> {
        check_len("spectra rows", self.spectra.nrows(), spectra.nrows())?;
        check_len("spectra columns", self.spectra.ncols(), spectra.ncols())?;
        Ok(std::mem::replace(&mut self.spectra, spectra))
    }

    /// Removes every row whose coordinates fall outside the rectangle.
    ///
    /// Returns the number of rows removed.
    pub fn crop(&mut self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<usize> {
        if !self.has_coordinates() {
            return Err(Error::NonSpatial);
        }
        let kept: Vec<usize> = self
            .x
            .iter()
            .zip(self.y.iter())
            .enumerate()
            .filter(|&(_, (&x, &y))| x >= x_min && x <= x_max && y >= y_min && y <= y_max)
            .map(|(i, _)| i)
            .collect();
        let removed = self.spectra.nrows() - kept.len();
        if removed > 0 {
            self.spectra = self.spectra.select(Axis(0), &kept);
            self.x = self.x.select(Axis(0), &kept);
            self.y = self.y.select(Axis(0), &kept);
        }
        Ok(removed)
    }

    /// Spectra matrix (rows are spectra).
    #[must_use]
    pub fn spectra(&self) -> &Array2<f64> {
        &self.spectra
    }

    /// Shared spectral abscissa.
    #[must_use]
    pub fn wavelength(&self) -> &Array1<f64> {
        &self.wavelength
    }

    /// Horizontal spatial coordinates (empty when absent).
    #[must_use]
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// Vertical spatial coordinates (empty when absent).
    #[must_use]
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Number of spectra.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spectra.nrows()
    }

    /// Returns true if there are no spectra.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spectra.nrows() == 0
    }

    /// Number of spectral channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.spectra.ncols()
    }

    /// True when mapping is disallowed.
    #[must_use]
    pub fn is_non_spatial(&self) -> bool {
        self.non_spatial
    }

    /// True when the source layout is y-major.
    #[must_use]
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    fn has_coordinates(&self) -> bool {
        !self.x.is_empty() && self.x.len() == self.spectra.nrows()
    }

    fn clamp_row(&self, index: usize) -> Option<usize> {
        let rows = self.spectra.nrows();
        (rows > 0).then(|| index.min(rows - 1))
    }

    /// Spectrum at `index`, clamped to the last row.
    #[must_use]
    pub fn point_spectrum(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        self.clamp_row(index).map(|row| self.spectra.row(row))
    }

    /// Horizontal coordinate at `index`, clamped to the last row.
    #[must_use]
    pub fn x_at(&self, index: usize) -> Option<f64> {
        let last = self.x.len().checked_sub(1)?;
        Some(self.x[index.min(last)])
    }

    /// Vertical coordinate at `index`, clamped to the last row.
    #[must_use]
    pub fn y_at(&self, index: usize) -> Option<f64> {
        let last = self.y.len().checked_sub(1)?;
        Some(self.y[index.min(last)])
    }

    /// Mean spectrum; with `with_std_dev` a second row holds the per-channel
    /// sample standard deviation.
    pub fn average_spectrum(&self, with_std_dev: bool) -> Result<Array2<f64>> {
        let mean = self.spectra.mean_axis(Axis(0)).ok_or(Error::EmptyDataset)?;
        let mut out = mean.insert_axis(Axis(0));
        if with_std_dev {
            let ddof = if self.spectra.nrows() > 1 { 1.0 } else { 0.0 };
            let std_dev = self.spectra.std_axis(Axis(0), ddof);
            out.push_row(std_dev.view())?;
        }
        Ok(out)
    }

    /// (min, max) of the wavelength axis.
    #[must_use]
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        min_max(self.wavelength.iter().copied())
    }

    /// (min, max) of the spectrum at `index`, clamped to the last row.
    #[must_use]
    pub fn point_spectrum_range(&self, index: usize) -> Option<(f64, f64)> {
        self.point_spectrum(index)
            .and_then(|row| min_max(row.iter().copied()))
    }

    /// (min, max) of the horizontal coordinates.
    #[must_use]
    pub fn key_range(&self) -> Option<(f64, f64)> {
        min_max(self.x.iter().copied())
    }

    /// (min, max) of the vertical coordinates.
    #[must_use]
    pub fn value_range(&self) -> Option<(f64, f64)> {
        min_max(self.y.iter().copied())
    }

    /// Number of distinct horizontal positions in the source layout.
    #[must_use]
    pub fn key_size(&self) -> usize {
        if self.flipped {
            leading_run(&self.y)
        } else {
            run_count(&self.x)
        }
    }

    /// Number of distinct vertical positions in the source layout.
    #[must_use]
    pub fn value_size(&self) -> usize {
        if self.flipped {
            run_count(&self.y)
        } else {
            leading_run(&self.x)
        }
    }

    /// Finds the channels nearest to the wavelengths `start` and `end`.
    ///
    /// Works for ascending and descending axes. When no channel reaches `end`
    /// the range collapses to the start channel and `collapsed` is set.
    ///
    /// # Errors
    /// Returns [`Error::WavelengthNotFound`] if no channel reaches `start`.
    pub fn find_range(&self, start: f64, end: f64) -> Result<RangeLookup> {
        let w = &self.wavelength;
        let ascending = w.len() < 2 || w[0] <= w[w.len() - 1];
        let reached = |value: f64, bound: f64| {
            if ascending {
                value >= bound
            } else {
                value <= bound
            }
        };

        let first = (0..w.len())
            .find(|&i| reached(w[i], start))
            .ok_or(Error::WavelengthNotFound(start))?;
        let min = nearest_of_pair(w, first, start);

        let Some(last) = (first..w.len()).find(|&i| reached(w[i], end)) else {
            warn!("upper wavelength limit {end} not found; using point region at channel {min}");
            return Ok(RangeLookup {
                range: ChannelRange::new(min, min),
                collapsed: true,
            });
        };
        let max = nearest_of_pair(w, last, end).max(min);

        Ok(RangeLookup {
            range: ChannelRange::new(min, max),
            collapsed: false,
        })
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Picks `i` or `i - 1`, whichever lies closer to `target`.
fn nearest_of_pair(axis: &Array1<f64>, i: usize, target: f64) -> usize {
    if i > 0 && (axis[i] - target).abs() > (axis[i - 1] - target).abs() {
        i - 1
    } else {
        i
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Number of runs of equal consecutive values.
fn run_count(values: &Array1<f64>) -> usize {
    let Some(&first) = values.first() else {
        return 0;
    };
    let mut count = 1;
    let mut current = first;
    for &v in values {
        if v != current {
            count += 1;
            current = v;
        }
    }
    count
}

/// Length of the leading run equal to the first value.
fn leading_run(values: &Array1<f64>) -> usize {
    let Some(&first) = values.first() else {
        return 0;
    };
    values.iter().take_while(|&&v| v == first).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn grid_3x2() -> SpectralData {
        // x-major layout: x constant while y varies
        let spectra = array![
            [1.0, 2.0, 3.0],
            [2.0, 3.0, 4.0],
            [3.0, 4.0, 5.0],
            [4.0, 5.0, 6.0],
            [5.0, 6.0, 7.0],
            [6.0, 7.0, 8.0],
        ];
        SpectralData::new(
            spectra,
            array![100.0, 200.0, 300.0],
            array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0],
            array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_validation() {
        let err = SpectralData::new(
            Array2::zeros((2, 3)),
            array![1.0, 2.0],
            array![0.0, 1.0],
            array![0.0, 1.0],
        );
        assert!(matches!(
            err,
            Err(Error::DimensionMismatch {
                what: "wavelength",
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_crop_removes_consecutive_rows() {
        let mut data = grid_3x2();
        // rows 0..4 have x <= 1; rows 0 and 1 are adjacent and both removed
        let removed = data.crop(1.0, 2.0, 0.0, 1.0).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(data.len(), 4);
        assert_eq!(data.x(), &array![1.0, 1.0, 2.0, 2.0]);
        assert_eq!(data.spectra().row(0), array![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_select_rows_is_non_spatial() {
        let data = grid_3x2();
        let subset = data.select_rows(&[1, 4]).unwrap();
        assert!(subset.is_non_spatial());
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.x(), &array![0.0, 2.0]);
        assert!(data.select_rows(&[6]).is_err());
    }

    #[test]
    fn test_clamped_accessors() {
        let data = grid_3x2();
        assert_eq!(data.point_spectrum(100).unwrap(), array![6.0, 7.0, 8.0]);
        assert_eq!(data.x_at(100), Some(2.0));
        assert_eq!(data.y_at(0), Some(0.0));
    }

    #[test]
    fn test_grid_sizes() {
        let data = grid_3x2();
        assert_eq!(data.key_size(), 3);
        assert_eq!(data.value_size(), 2);
    }

    #[test]
    fn test_average_spectrum_with_std() {
        let data = grid_3x2();
        let avg = data.average_spectrum(true).unwrap();
        assert_eq!(avg.nrows(), 2);
        assert_abs_diff_eq!(avg[[0, 0]], 3.5, epsilon = 1e-12);
        // sample std of 1..=6
        assert_abs_diff_eq!(avg[[1, 0]], 1.870_828_693, epsilon = 1e-8);
    }

    #[test]
    fn test_find_range_nearest_channels() {
        let data = grid_3x2();
        let lookup = data.find_range(160.0, 260.0).unwrap();
        assert!(!lookup.collapsed);
        assert_eq!(lookup.range, ChannelRange::new(1, 2));

        let lookup = data.find_range(110.0, 190.0).unwrap();
        assert_eq!(lookup.range, ChannelRange::new(0, 1));
    }

    #[test]
    fn test_find_range_collapses_to_point() {
        let data = grid_3x2();
        let lookup = data.find_range(200.0, 900.0).unwrap();
        assert!(lookup.collapsed);
        assert_eq!(lookup.range, ChannelRange::new(1, 1));
        assert!(data.find_range(1000.0, 2000.0).is_err());
    }

    #[test]
    fn test_find_range_descending_axis() {
        let data = SpectralData::without_coordinates(
            Array2::zeros((1, 4)),
            array![400.0, 300.0, 200.0, 100.0],
        )
        .unwrap();
        let lookup = data.find_range(310.0, 190.0).unwrap();
        assert_eq!(lookup.range, ChannelRange::new(1, 2));
    }
}
