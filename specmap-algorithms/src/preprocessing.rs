//! Spectra-matrix transforms.
//!
//! Every function here is pure: it reads a spectra matrix (rows are spectra,
//! columns are channels) and returns a new matrix of the same shape. The
//! dataset engine applies the result in place and keeps the undo snapshot.
//!
//! Windowed filters operate along the channel axis. The first and last
//! `(window - 1) / 2` channels of every row are passed through unchanged.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::float_cmp,
    clippy::missing_errors_doc
)]

use crate::linalg::{from_dmatrix, pseudo_inverse, sorted_svd, to_dmatrix};
use log::warn;
use nalgebra::DMatrix;
use ndarray::{s, Array2, ArrayView1, Axis, Zip};
use specmap_core::{BaselineMethod, Error, Result};

/// Shifts the matrix to be non-negative, then scales its global maximum to 1.
#[must_use]
pub fn min_max_normalize(spectra: &Array2<f64>) -> Array2<f64> {
    let min = spectra.iter().copied().fold(f64::INFINITY, f64::min);
    let mut out = spectra.clone();
    if min < 0.0 {
        out.mapv_inplace(|v| v - min);
    }
    let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 && max.is_finite() {
        out.mapv_inplace(|v| v / max);
    } else {
        warn!("min/max normalize: global maximum is {max}; values left unscaled");
    }
    out
}

/// Divides every row by its sum. Rows summing to zero are left unchanged.
#[must_use]
pub fn unit_area_normalize(spectra: &Array2<f64>) -> Array2<f64> {
    let mut out = spectra.clone();
    let mut skipped = 0usize;
    for mut row in out.rows_mut() {
        let sum = row.sum();
        if sum == 0.0 || !sum.is_finite() {
            skipped += 1;
            continue;
        }
        row.mapv_inplace(|v| v / sum);
    }
    if skipped > 0 {
        warn!("unit area normalize: {skipped} spectra with zero area left unchanged");
    }
    out
}

/// Standardizes every column to zero mean and unit sample standard deviation.
///
/// Columns with zero variance become all zeros.
#[must_use]
pub fn z_score_normalize(spectra: &Array2<f64>) -> Array2<f64> {
    let rows = spectra.nrows();
    let mut out = spectra.clone();
    if rows == 0 {
        return out;
    }
    let ddof = if rows > 1 { 1.0 } else { 0.0 };
    for mut column in out.columns_mut() {
        let mean = column.mean().unwrap_or(0.0);
        let std_dev = column.std(ddof);
        if std_dev > 0.0 && std_dev.is_finite() {
            column.mapv_inplace(|v| (v - mean) / std_dev);
        } else {
            column.fill(0.0);
        }
    }
    out
}

/// Subtracts `background` from every row.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] when `background` does not have one
/// value per channel.
pub fn subtract_background(
    spectra: &Array2<f64>,
    background: ArrayView1<'_, f64>,
) -> Result<Array2<f64>> {
    if background.len() != spectra.ncols() {
        return Err(Error::DimensionMismatch {
            what: "background",
            expected: spectra.ncols(),
            found: background.len(),
        });
    }
    Ok(spectra - &background.insert_axis(Axis(0)))
}

fn check_window(window: usize, channels: usize) -> Result<usize> {
    if window == 0 || window % 2 == 0 || window > channels {
        return Err(Error::InvalidWindow { window, channels });
    }
    Ok(window / 2)
}

/// Applies `reduce` to every full window in each row and writes the result
/// at the window centre.
fn windowed(
    spectra: &Array2<f64>,
    window: usize,
    mut reduce: impl FnMut(&mut [f64]) -> f64,
) -> Result<Array2<f64>> {
    let half = check_window(window, spectra.ncols())?;
    let mut out = spectra.clone();
    let mut buffer = vec![0.0; window];
    for (src, mut dst) in spectra.rows().into_iter().zip(out.rows_mut()) {
        for centre in half..src.len() - half {
            for (slot, &v) in buffer
                .iter_mut()
                .zip(src.slice(s![centre - half..=centre + half]))
            {
                *slot = v;
            }
            dst[centre] = reduce(&mut buffer);
        }
    }
    Ok(out)
}

fn median_of(buffer: &mut [f64]) -> f64 {
    buffer.sort_by(f64::total_cmp);
    buffer[buffer.len() / 2]
}

/// Replaces interior channels with the median of the surrounding odd window.
///
/// # Errors
/// Returns [`Error::InvalidWindow`] if `window` is even, zero, or wider than
/// the spectra.
pub fn median_filter(spectra: &Array2<f64>, window: usize) -> Result<Array2<f64>> {
    windowed(spectra, window, median_of)
}

/// Replaces interior channels with the mean of the surrounding odd window.
pub fn moving_average(spectra: &Array2<f64>, window: usize) -> Result<Array2<f64>> {
    windowed(spectra, window, |buffer| {
        buffer.iter().sum::<f64>() / buffer.len() as f64
    })
}

/// Median-filter baseline estimate.
///
/// Boundary channels equal the input, so they are zero after subtraction.
pub fn median_baseline(spectra: &Array2<f64>, window: usize) -> Result<Array2<f64>> {
    median_filter(spectra, window)
}

/// Subtracts the baseline estimated by `method`.
///
/// Returns `Ok(None)` when the method has no estimator; the caller treats
/// that as a no-op.
pub fn baseline_correct(
    spectra: &Array2<f64>,
    method: &BaselineMethod,
    window: usize,
) -> Result<Option<Array2<f64>>> {
    match method {
        BaselineMethod::MedianFilter => {
            let baseline = median_baseline(spectra, window)?;
            Ok(Some(spectra - &baseline))
        }
        BaselineMethod::Unknown(name) => {
            warn!("baseline method '{name}' has no estimator; spectra unchanged");
            Ok(None)
        }
    }
}

/// Reconstructs the spectra from the `rank` largest singular triplets.
///
/// A rank above `min(rows, cols)` is clamped.
///
/// # Errors
/// Returns [`Error::InvalidParameter`] for `rank == 0` and
/// [`Error::Decomposition`] if the SVD fails.
pub fn svd_denoise(spectra: &Array2<f64>, rank: usize) -> Result<Array2<f64>> {
    if rank == 0 {
        return Err(Error::InvalidParameter(
            "singular value count must be at least 1".into(),
        ));
    }
    if spectra.is_empty() {
        return Err(Error::EmptyDataset);
    }
    let svd = sorted_svd(to_dmatrix(spectra))?;
    let available = svd.singular_values.len();
    let k = if rank > available {
        warn!("truncated SVD: {rank} singular values requested, {available} available");
        available
    } else {
        rank
    };
    let u = svd.u.columns(0, k);
    let s = DMatrix::from_diagonal(&svd.singular_values.rows(0, k).into_owned());
    let v_t = svd.v_t.rows(0, k);
    Ok(from_dmatrix(&(u * s * v_t)))
}

/// Savitzky-Golay convolution table for a window of `window` points.
///
/// Row `r` holds the weights producing the `derivative`-th derivative at
/// position `r` within the window, so edge rows fit the polynomial at
/// off-centre points. Weights are scaled by `derivative! / spacing^derivative`.
pub fn savitzky_golay_table(
    derivative: usize,
    polynomial_order: usize,
    window: usize,
    spacing: f64,
) -> Result<Array2<f64>> {
    if polynomial_order < derivative {
        return Err(Error::InvalidParameter(format!(
            "polynomial order {polynomial_order} is below derivative order {derivative}"
        )));
    }
    if window % 2 == 0 || window <= polynomial_order {
        return Err(Error::InvalidParameter(format!(
            "window size {window} must be odd and exceed polynomial order {polynomial_order}"
        )));
    }
    if spacing == 0.0 || !spacing.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "sample spacing {spacing} must be finite and non-zero"
        )));
    }

    let terms = polynomial_order + 1;
    let scale =
        (1..=derivative).map(|v| v as f64).product::<f64>() / spacing.powi(derivative as i32);
    let mut table = Array2::zeros((window, window));
    for position in 0..window {
        let vandermonde = DMatrix::from_fn(window, terms, |i, p| {
            (i as f64 - position as f64).powi(p as i32)
        });
        let fit = pseudo_inverse(vandermonde)?;
        for j in 0..window {
            table[[position, j]] = fit[(derivative, j)] * scale;
        }
    }
    Ok(table)
}

/// Savitzky-Golay smoothing or differentiation along the channel axis.
///
/// # Errors
/// Returns [`Error::InvalidParameter`] when `polynomial_order < derivative`
/// or the window is even or not larger than the polynomial order, and
/// [`Error::InvalidWindow`] when the window is wider than the spectra.
pub fn savitzky_golay(
    spectra: &Array2<f64>,
    derivative: usize,
    polynomial_order: usize,
    window: usize,
) -> Result<Array2<f64>> {
    let table = savitzky_golay_table(derivative, polynomial_order, window, 1.0)?;
    let channels = spectra.ncols();
    let half = check_window(window, channels)?;
    let centre = table.row(half);

    let mut out = Array2::zeros(spectra.raw_dim());
    Zip::from(out.rows_mut())
        .and(spectra.rows())
        .for_each(|mut dst, src| {
            for c in 0..half {
                dst[c] = table.row(c).dot(&src.slice(s![..window]));
                let tail = half + 1 + c;
                dst[channels - window + tail] =
                    table.row(tail).dot(&src.slice(s![channels - window..]));
            }
            for c in half..channels - half {
                dst[c] = centre.dot(&src.slice(s![c - half..=c + half]));
            }
        });
    Ok(out)
}
