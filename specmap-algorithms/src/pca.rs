//! Principal component analysis.
//!
//! Components are the eigenvectors of the channel covariance matrix, sorted
//! by decreasing variance. Each coefficient column is sign-normalized so its
//! largest-magnitude loading is positive, which keeps repeated fits stable.
#![allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]

use crate::linalg::{
    from_dmatrix, from_dvector, normalize_column_signs, sorted_symmetric_eigen, to_dmatrix,
};
use ndarray::{Array1, Array2, Axis};
use specmap_core::{Error, Result};

/// Fitted principal component model.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaModel {
    mean: Array1<f64>,
    coefficients: Array2<f64>,
    scores: Array2<f64>,
    latent: Array1<f64>,
    tsquared: Array1<f64>,
}

impl PcaModel {
    /// Fits PCA to `spectra` (rows are observations).
    ///
    /// # Errors
    /// Returns [`Error::EmptyDataset`] when there are no spectra.
    pub fn fit(spectra: &Array2<f64>) -> Result<Self> {
        let rows = spectra.nrows();
        let mean = spectra.mean_axis(Axis(0)).ok_or(Error::EmptyDataset)?;
        if spectra.ncols() == 0 {
            return Err(Error::EmptyDataset);
        }
        let centered = spectra - &mean.view().insert_axis(Axis(0));
        let denom = rows.saturating_sub(1).max(1) as f64;
        let covariance = centered.t().dot(&centered) / denom;

        let (values, mut vectors) = sorted_symmetric_eigen(to_dmatrix(&covariance));
        normalize_column_signs(&mut vectors);
        let latent = from_dvector(&values).mapv(|v| v.max(0.0));
        let coefficients = from_dmatrix(&vectors);
        let scores = centered.dot(&coefficients);
        let tsquared = hotelling_t2(&scores, &latent);

        Ok(Self {
            mean,
            coefficients,
            scores,
            latent,
            tsquared,
        })
    }

    /// Score column for `component` (0-based). With `clamp_negative`,
    /// negative scores are set to zero.
    ///
    /// # Errors
    /// Returns [`Error::ComponentOutOfRange`] if `component` was not computed.
    pub fn results(&self, component: usize, clamp_negative: bool) -> Result<Array1<f64>> {
        if component >= self.component_count() {
            return Err(Error::ComponentOutOfRange {
                index: component,
                available: self.component_count(),
            });
        }
        let mut column = self.scores.column(component).to_owned();
        if clamp_negative {
            column.mapv_inplace(|v| v.max(0.0));
        }
        Ok(column)
    }

    /// Number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.coefficients.ncols()
    }

    /// Per-channel mean removed before projection.
    #[must_use]
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Loadings; column `k` is component `k`.
    #[must_use]
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Projections of each spectrum onto the components.
    #[must_use]
    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    /// Component variances, descending.
    #[must_use]
    pub fn latent(&self) -> &Array1<f64> {
        &self.latent
    }

    /// Hotelling's T² statistic per spectrum.
    #[must_use]
    pub fn tsquared(&self) -> &Array1<f64> {
        &self.tsquared
    }

    /// Fraction of total variance carried by each component.
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.latent.sum();
        if total > 0.0 {
            &self.latent / total
        } else {
            Array1::zeros(self.latent.len())
        }
    }
}

fn hotelling_t2(scores: &Array2<f64>, latent: &Array1<f64>) -> Array1<f64> {
    let tolerance = latent.first().copied().unwrap_or(0.0) * 1e-12;
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(latent.iter())
                .filter(|&(_, &l)| l > tolerance)
                .map(|(&s, &l)| s * s / l)
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_first_component_along_dominant_direction() {
        // points spread along (1, 1) with slight offset along (1, -1)
        let spectra = array![
            [-2.0, -2.1],
            [-1.0, -0.9],
            [0.0, 0.1],
            [1.0, 0.9],
            [2.0, 2.0],
        ];
        let model = PcaModel::fit(&spectra).unwrap();
        assert_eq!(model.component_count(), 2);
        let c = model.coefficients();
        assert_abs_diff_eq!(c[[0, 0]].abs(), c[[1, 0]].abs(), epsilon = 0.05);
        assert!(model.latent()[0] > model.latent()[1]);
        let ratio = model.explained_variance_ratio();
        assert!(ratio[0] > 0.99);
    }

    #[test]
    fn test_scores_are_centered_projections() {
        let spectra = array![[1.0, 2.0, 3.0], [2.0, 1.0, 0.0], [4.0, 4.0, 4.0], [0.0, 1.0, 1.0]];
        let model = PcaModel::fit(&spectra).unwrap();
        let scores = model.results(0, false).unwrap();
        assert_abs_diff_eq!(scores.sum(), 0.0, epsilon = 1e-10);
        // total variance is preserved
        let total_var: f64 = spectra.var_axis(Axis(0), 1.0).sum();
        assert_abs_diff_eq!(model.latent().sum(), total_var, epsilon = 1e-10);
    }

    #[test]
    fn test_clamp_negative_and_range() {
        let spectra = array![[1.0, 0.0], [0.0, 1.0], [2.0, 2.0]];
        let model = PcaModel::fit(&spectra).unwrap();
        let clamped = model.results(0, true).unwrap();
        assert!(clamped.iter().all(|&v| v >= 0.0));
        assert!(matches!(
            model.results(2, false),
            Err(Error::ComponentOutOfRange {
                index: 2,
                available: 2
            })
        ));
    }
}
