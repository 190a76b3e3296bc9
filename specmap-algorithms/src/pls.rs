//! Partial least squares regression (NIPALS, single response).
//!
//! Channels are the observations and pixels are the predictors: the spectra
//! matrix is transposed and regressed against the wavelength axis. Each X
//! loading column therefore holds one value per pixel and can be mapped.
#![allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]

use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use specmap_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// PLS configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlsConfig {
    /// Residual score norm below which extraction stops early.
    pub tolerance: f64,
}

impl Default for PlsConfig {
    fn default() -> Self {
        Self { tolerance: 1e-10 }
    }
}

impl PlsConfig {
    /// Set the early-stop tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Fitted PLS model.
#[derive(Debug, Clone, PartialEq)]
pub struct PlsModel {
    x_loadings: Array2<f64>,
    x_scores: Array2<f64>,
    weights: Array2<f64>,
    y_loadings: Array1<f64>,
    percent_variance: Array1<f64>,
}

impl PlsModel {
    /// Fits up to `components` latent variables.
    ///
    /// Extraction stops early once the residual predictors are exhausted, so
    /// [`PlsModel::component_count`] may be smaller than requested.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for zero components,
    /// [`Error::DimensionMismatch`] if `wavelength` does not match the
    /// channels, and [`Error::Decomposition`] when no component can be
    /// extracted.
    pub fn fit(
        spectra: &Array2<f64>,
        wavelength: &Array1<f64>,
        components: usize,
        config: &PlsConfig,
    ) -> Result<Self> {
        if components == 0 {
            return Err(Error::InvalidParameter(
                "PLS needs at least one component".into(),
            ));
        }
        if wavelength.len() != spectra.ncols() {
            return Err(Error::DimensionMismatch {
                what: "wavelength",
                expected: spectra.ncols(),
                found: wavelength.len(),
            });
        }

        // Rows are channels, columns are pixels.
        let mut x = spectra.t().to_owned();
        let x_mean = x.mean_axis(Axis(0)).ok_or(Error::EmptyDataset)?;
        x -= &x_mean.view().insert_axis(Axis(0));
        let mut y = wavelength - wavelength.mean().unwrap_or(0.0);
        let total_ss = x.iter().map(|v| v * v).sum::<f64>();

        let (observations, predictors) = x.dim();
        let mut x_loadings = Vec::with_capacity(components);
        let mut x_scores = Vec::with_capacity(components);
        let mut weights = Vec::with_capacity(components);
        let mut y_loadings = Vec::with_capacity(components);
        let mut explained = Vec::with_capacity(components);

        for a in 0..components {
            let mut w = x.t().dot(&y);
            let w_norm = w.dot(&w).sqrt();
            if w_norm <= config.tolerance {
                debug!("PLS stopped after {a} components: no covariance left");
                break;
            }
            w /= w_norm;
            let t = x.dot(&w);
            let tt = t.dot(&t);
            if tt <= config.tolerance {
                debug!("PLS stopped after {a} components: scores vanished");
                break;
            }
            let p = x.t().dot(&t) / tt;
            let q = y.dot(&t) / tt;

            let t_col = t.view().insert_axis(Axis(1));
            let p_row = p.view().insert_axis(Axis(0));
            x -= &t_col.dot(&p_row);
            y.scaled_add(-q, &t);

            explained.push(if total_ss > 0.0 {
                tt * p.dot(&p) / total_ss
            } else {
                0.0
            });
            x_loadings.push(p);
            x_scores.push(t);
            weights.push(w);
            y_loadings.push(q);
        }

        if x_loadings.is_empty() {
            return Err(Error::Decomposition(
                "PLS extracted no components".into(),
            ));
        }
        if x_loadings.len() < components {
            warn!(
                "PLS computed {} of {components} requested components",
                x_loadings.len()
            );
        }

        Ok(Self {
            x_loadings: stack_columns(&x_loadings, predictors),
            x_scores: stack_columns(&x_scores, observations),
            weights: stack_columns(&weights, predictors),
            y_loadings: Array1::from(y_loadings),
            percent_variance: Array1::from(explained) * 100.0,
        })
    }

    /// X loading column for `component` (0-based), one value per pixel.
    ///
    /// A component beyond the last computed one is clamped to the last; the
    /// returned flag is `false` in that case.
    #[must_use]
    pub fn results(&self, component: usize) -> (Array1<f64>, bool) {
        let last = self.component_count() - 1;
        let valid = component <= last;
        let k = component.min(last);
        (self.x_loadings.column(k).to_owned(), valid)
    }

    /// Number of components actually computed.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.x_loadings.ncols()
    }

    /// X loadings; row per pixel, column per component.
    #[must_use]
    pub fn x_loadings(&self) -> &Array2<f64> {
        &self.x_loadings
    }

    /// X scores; row per channel, column per component.
    #[must_use]
    pub fn x_scores(&self) -> &Array2<f64> {
        &self.x_scores
    }

    /// NIPALS weight vectors.
    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Response loadings.
    #[must_use]
    pub fn y_loadings(&self) -> &Array1<f64> {
        &self.y_loadings
    }

    /// Percentage of predictor variance explained by each component.
    #[must_use]
    pub fn percent_variance(&self) -> &Array1<f64> {
        &self.percent_variance
    }
}

fn stack_columns(columns: &[Array1<f64>], rows: usize) -> Array2<f64> {
    let mut out = Array2::zeros((rows, columns.len()));
    for (k, column) in columns.iter().enumerate() {
        out.column_mut(k).assign(column);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn rank_two_spectra() -> (Array2<f64>, Array1<f64>) {
        let wavelength: Array1<f64> = Array1::linspace(400.0, 700.0, 8);
        let a = wavelength.mapv(|w| (w - 400.0) / 300.0);
        let b = wavelength.mapv(|w| ((w - 550.0) / 50.0).powi(2));
        let spectra = Array2::from_shape_fn((4, 8), |(i, j)| {
            let i = i as f64;
            (1.0 + i) * a[j] + (2.0 - 0.5 * i) * b[j]
        });
        (spectra, wavelength)
    }

    #[test]
    fn test_loadings_are_per_pixel() {
        let (spectra, wavelength) = rank_two_spectra();
        let model = PlsModel::fit(&spectra, &wavelength, 2, &PlsConfig::default()).unwrap();
        assert_eq!(model.component_count(), 2);
        let (column, valid) = model.results(1);
        assert!(valid);
        assert_eq!(column.len(), 4);
    }

    #[test]
    fn test_clamps_to_highest_component() {
        let (spectra, wavelength) = rank_two_spectra();
        let model = PlsModel::fit(&spectra, &wavelength, 2, &PlsConfig::default()).unwrap();
        let (column, valid) = model.results(5);
        assert!(!valid);
        assert_eq!(column, model.x_loadings().column(1));
    }

    #[test]
    fn test_stops_at_rank() {
        let (spectra, wavelength) = rank_two_spectra();
        let model = PlsModel::fit(&spectra, &wavelength, 6, &PlsConfig::default()).unwrap();
        assert!(model.component_count() <= 3);
        assert!(model.component_count() >= 1);
        let total: f64 = model.percent_variance().sum();
        assert_abs_diff_eq!(total, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_bad_input() {
        let spectra = array![[1.0, 2.0, 3.0]];
        assert!(PlsModel::fit(&spectra, &array![1.0, 2.0], 1, &PlsConfig::default()).is_err());
        assert!(PlsModel::fit(&spectra, &array![1.0, 2.0, 3.0], 0, &PlsConfig::default()).is_err());
    }
}
