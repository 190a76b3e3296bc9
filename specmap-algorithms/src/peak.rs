//! Per-spectrum peak quantification over channel regions.
//!
//! Each function produces one scalar per spectrum plus the diagnostic curves
//! the presentation layer draws over the spectra (area baselines and
//! half-maximum lines).
#![allow(clippy::cast_precision_loss, clippy::float_cmp)]

use ndarray::{s, Array1, Array2, ArrayView1};
use specmap_core::{
    Baseline, ChannelRange, Error, IntegrationMethod, MapDiagnostics, Result, ValueMethod,
};

/// Values and diagnostics from a quantification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakQuantification {
    /// One value per spectrum.
    pub values: Array1<f64>,
    /// Curves retained for inspection.
    pub diagnostics: MapDiagnostics,
}

/// Map type label for a single-region map.
#[must_use]
pub fn univariate_map_type(method: ValueMethod) -> String {
    let label = match method {
        ValueMethod::Bandwidth => "Bandwidth (FWHM)",
        other => other.label(),
    };
    format!("1-Region Univariate ({label})")
}

/// Map type label for a two-region ratio map.
#[must_use]
pub fn band_ratio_map_type(method: ValueMethod) -> String {
    format!("2-Region Band Ratio Map ({})", method.label())
}

/// Straight line from the first to the last value of `region`.
fn linear_baseline(region: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = region.len();
    let start = region[0];
    let end = region[n - 1];
    if n == 1 {
        return Array1::from_elem(1, start);
    }
    let slope = (end - start) / (n - 1) as f64;
    Array1::from_shape_fn(n, |j| start + slope * j as f64)
}

fn intensity(region: ArrayView1<'_, f64>, z_scores_applied: bool) -> f64 {
    let max = region.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !z_scores_applied {
        return max;
    }
    // Standardized spectra may peak downward.
    let max_abs = region.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if max_abs == max {
        max
    } else {
        -max_abs
    }
}

fn area(region: ArrayView1<'_, f64>) -> (f64, Array1<f64>) {
    let baseline = linear_baseline(region);
    let value = (&region - &baseline).sum();
    (value, baseline)
}

/// Edges of a peak at half height, for one spectrum.
struct HalfMax {
    width: f64,
    left: usize,
    right: usize,
}

fn bandwidth(
    spectrum: ArrayView1<'_, f64>,
    wavelength: &Array1<f64>,
    region: ChannelRange,
) -> HalfMax {
    let window = spectrum.slice(s![region.min..=region.max]);
    let baseline = linear_baseline(window);

    let (local_peak, peak) = window
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        });
    let peak_index = region.min + local_peak;
    let half = baseline[local_peak] + (peak - baseline[local_peak]) / 2.0;

    let last = spectrum.len() - 1;
    let mut left = (0..=peak_index)
        .rev()
        .find(|&j| spectrum[j] < half)
        .unwrap_or(0);
    let mut right = (peak_index..=last)
        .find(|&j| spectrum[j] < half)
        .unwrap_or(last);

    let distance = |j: usize| (spectrum[j] - half).abs();
    if left > 0 && distance(left - 1) < distance(left) {
        left -= 1;
    }
    if right < last && distance(right + 1) < distance(right) {
        right += 1;
    }

    HalfMax {
        width: (wavelength[right] - wavelength[left]).abs(),
        left,
        right,
    }
}

fn check_inputs(spectra: &Array2<f64>, wavelength: &Array1<f64>) -> Result<()> {
    if wavelength.len() != spectra.ncols() {
        return Err(Error::DimensionMismatch {
            what: "wavelength",
            expected: spectra.ncols(),
            found: wavelength.len(),
        });
    }
    Ok(())
}

/// Quantifies one region of every spectrum.
///
/// `z_scores_applied` switches intensity to report strongly negative peaks
/// as `-max|value|`.
///
/// # Errors
/// Returns [`Error::InvalidRegion`] for a region outside the spectra and
/// [`Error::Unsupported`] for [`ValueMethod::Derivative`].
pub fn univariate(
    spectra: &Array2<f64>,
    wavelength: &Array1<f64>,
    region: ChannelRange,
    method: ValueMethod,
    integration: IntegrationMethod,
    z_scores_applied: bool,
) -> Result<PeakQuantification> {
    check_inputs(spectra, wavelength)?;
    region.validate(spectra.ncols())?;
    let rows = spectra.nrows();
    let span = s![region.min..=region.max];

    match method {
        ValueMethod::Intensity => Ok(PeakQuantification {
            values: spectra
                .rows()
                .into_iter()
                .map(|row| intensity(row.slice(span), z_scores_applied))
                .collect(),
            diagnostics: MapDiagnostics::default(),
        }),
        ValueMethod::Area => {
            let IntegrationMethod::RiemannSum = integration;
            let mut values = Array1::zeros(rows);
            let mut curves = Array2::zeros((rows, region.len()));
            for (i, row) in spectra.rows().into_iter().enumerate() {
                let (value, baseline) = area(row.slice(span));
                values[i] = value;
                curves.row_mut(i).assign(&baseline);
            }
            Ok(PeakQuantification {
                values,
                diagnostics: MapDiagnostics {
                    baselines: vec![Baseline { region, curves }],
                    half_max_lines: None,
                },
            })
        }
        ValueMethod::Bandwidth => {
            let mut values = Array1::zeros(rows);
            let mut lines = Array2::zeros((rows, 4));
            for (i, row) in spectra.rows().into_iter().enumerate() {
                let edges = bandwidth(row, wavelength, region);
                values[i] = edges.width;
                lines[[i, 0]] = wavelength[edges.left];
                lines[[i, 1]] = row[edges.left];
                lines[[i, 2]] = wavelength[edges.right];
                lines[[i, 3]] = row[edges.right];
            }
            Ok(PeakQuantification {
                values,
                diagnostics: MapDiagnostics {
                    baselines: Vec::new(),
                    half_max_lines: Some(lines),
                },
            })
        }
        ValueMethod::Derivative => Err(Error::Unsupported(
            "derivative peak quantification".into(),
        )),
    }
}

/// Ratio of two regions' values (`first / second`) for every spectrum.
///
/// Only area and intensity are defined for ratios. A zero denominator
/// yields an infinite or NaN value.
///
/// # Errors
/// Returns [`Error::InvalidRegion`] for a region outside the spectra and
/// [`Error::Unsupported`] for bandwidth and derivative methods.
pub fn band_ratio(
    spectra: &Array2<f64>,
    wavelength: &Array1<f64>,
    first: ChannelRange,
    second: ChannelRange,
    method: ValueMethod,
    integration: IntegrationMethod,
) -> Result<PeakQuantification> {
    check_inputs(spectra, wavelength)?;
    first.validate(spectra.ncols())?;
    second.validate(spectra.ncols())?;
    let rows = spectra.nrows();
    let first_span = s![first.min..=first.max];
    let second_span = s![second.min..=second.max];

    match method {
        ValueMethod::Intensity => Ok(PeakQuantification {
            values: spectra
                .rows()
                .into_iter()
                .map(|row| {
                    intensity(row.slice(first_span), false)
                        / intensity(row.slice(second_span), false)
                })
                .collect(),
            diagnostics: MapDiagnostics::default(),
        }),
        ValueMethod::Area => {
            let IntegrationMethod::RiemannSum = integration;
            let mut values = Array1::zeros(rows);
            let mut first_curves = Array2::zeros((rows, first.len()));
            let mut second_curves = Array2::zeros((rows, second.len()));
            for (i, row) in spectra.rows().into_iter().enumerate() {
                let (a, first_baseline) = area(row.slice(first_span));
                let (b, second_baseline) = area(row.slice(second_span));
                values[i] = a / b;
                first_curves.row_mut(i).assign(&first_baseline);
                second_curves.row_mut(i).assign(&second_baseline);
            }
            Ok(PeakQuantification {
                values,
                diagnostics: MapDiagnostics {
                    baselines: vec![
                        Baseline {
                            region: first,
                            curves: first_curves,
                        },
                        Baseline {
                            region: second,
                            curves: second_curves,
                        },
                    ],
                    half_max_lines: None,
                },
            })
        }
        ValueMethod::Bandwidth | ValueMethod::Derivative => Err(Error::Unsupported(format!(
            "{} band ratio",
            method.label().to_lowercase()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn gaussian_row(channels: usize, centre: f64, sigma: f64) -> Array1<f64> {
        Array1::from_shape_fn(channels, |j| {
            let d = j as f64 - centre;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
    }

    #[test]
    fn test_area_with_linear_baseline() {
        let spectra = array![
            [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0],
            [1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0]
        ];
        let wavelength = Array1::range(0.0, 7.0, 1.0);
        let out = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(0, 6),
            ValueMethod::Area,
            IntegrationMethod::RiemannSum,
            false,
        )
        .unwrap();
        assert_abs_diff_eq!(out.values[0], 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.values[1], 9.0, epsilon = 1e-12);
        let baseline = &out.diagnostics.baselines[0];
        assert_eq!(baseline.curves.dim(), (2, 7));
        assert_abs_diff_eq!(baseline.curves[[1, 3]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intensity_negative_peak_after_z_scores() {
        let spectra = array![[0.5, -2.0, 1.0], [0.5, 3.0, 1.0]];
        let wavelength = array![1.0, 2.0, 3.0];
        let region = ChannelRange::new(0, 2);
        let intensity = |z_scores_applied| {
            univariate(
                &spectra,
                &wavelength,
                region,
                ValueMethod::Intensity,
                IntegrationMethod::RiemannSum,
                z_scores_applied,
            )
            .unwrap()
        };
        let out = intensity(true);
        assert_eq!(out.values, array![-2.0, 3.0]);
        let raw = intensity(false);
        assert_eq!(raw.values, array![1.0, 3.0]);
    }

    #[test]
    fn test_bandwidth_on_gaussian() {
        let sigma = 3.0;
        let row = gaussian_row(41, 20.0, sigma);
        let spectra = row.insert_axis(ndarray::Axis(0));
        let wavelength = Array1::range(0.0, 41.0, 1.0);
        let out = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(5, 35),
            ValueMethod::Bandwidth,
            IntegrationMethod::RiemannSum,
            false,
        )
        .unwrap();
        let true_fwhm = 2.0 * (2.0 * 2.0_f64.ln()).sqrt() * sigma;
        assert!((out.values[0] - true_fwhm).abs() < 1.0);
        let lines = out.diagnostics.half_max_lines.unwrap();
        assert_eq!(lines[[0, 0]], 16.0);
        assert_eq!(lines[[0, 2]], 24.0);
    }

    #[test]
    fn test_bandwidth_edges_shift_to_closer_neighbour() {
        // First points below half height are channels 2 and 4, but the
        // outer neighbours sit nearer to 0.5.
        let spectra = array![[0.0, 0.48, 0.3, 1.0, 0.3, 0.48, 0.0]];
        let wavelength = Array1::range(0.0, 7.0, 1.0);
        let out = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(0, 6),
            ValueMethod::Bandwidth,
            IntegrationMethod::RiemannSum,
            false,
        )
        .unwrap();
        assert_abs_diff_eq!(out.values[0], 4.0, epsilon = 1e-12);
        let lines = out.diagnostics.half_max_lines.unwrap();
        assert_eq!(lines.row(0).to_vec(), vec![1.0, 0.48, 5.0, 0.48]);
    }

    #[test]
    fn test_bandwidth_edge_stays_when_neighbour_is_farther() {
        let spectra = array![[0.0, 0.1, 0.45, 1.0, 0.45, 0.1, 0.0]];
        let wavelength = Array1::range(0.0, 7.0, 1.0);
        let out = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(0, 6),
            ValueMethod::Bandwidth,
            IntegrationMethod::RiemannSum,
            false,
        )
        .unwrap();
        assert_abs_diff_eq!(out.values[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_unsupported() {
        let spectra = array![[1.0, 2.0, 1.0]];
        let wavelength = array![1.0, 2.0, 3.0];
        let result = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(0, 2),
            ValueMethod::Derivative,
            IntegrationMethod::RiemannSum,
            false,
        );
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_region_validation() {
        let spectra = array![[1.0, 2.0, 1.0]];
        let wavelength = array![1.0, 2.0, 3.0];
        let result = univariate(
            &spectra,
            &wavelength,
            ChannelRange::new(1, 3),
            ValueMethod::Intensity,
            IntegrationMethod::RiemannSum,
            false,
        );
        assert!(matches!(result, Err(Error::InvalidRegion { .. })));
    }

    #[test]
    fn test_band_ratio_intensity_and_area() {
        let spectra = array![[0.0, 4.0, 0.0, 0.0, 2.0, 0.0]];
        let wavelength = Array1::range(0.0, 6.0, 1.0);
        let first = ChannelRange::new(0, 2);
        let second = ChannelRange::new(3, 5);
        let ratio = |method| {
            band_ratio(
                &spectra,
                &wavelength,
                first,
                second,
                method,
                IntegrationMethod::RiemannSum,
            )
        };
        let intensity = ratio(ValueMethod::Intensity).unwrap();
        assert_abs_diff_eq!(intensity.values[0], 2.0);
        let area = ratio(ValueMethod::Area).unwrap();
        assert_abs_diff_eq!(area.values[0], 2.0);
        assert_eq!(area.diagnostics.baselines.len(), 2);
        assert!(ratio(ValueMethod::Bandwidth).is_err());
    }

    #[test]
    fn test_map_type_labels() {
        assert_eq!(
            univariate_map_type(ValueMethod::Bandwidth),
            "1-Region Univariate (Bandwidth (FWHM))"
        );
        assert_eq!(
            band_ratio_map_type(ValueMethod::Area),
            "2-Region Band Ratio Map (Area)"
        );
    }
}
