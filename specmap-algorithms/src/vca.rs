//! Vertex component analysis (endmember extraction) with least-squares
//! abundances.
//!
//! Pixels are projected onto the leading `p`-dimensional signal subspace and
//! rescaled projectively so the linear-mixing simplex becomes a flat face.
//! Endmembers are then picked one at a time as the pixel with the largest
//! projection onto a random direction orthogonal to the ones already chosen.
#![allow(clippy::missing_errors_doc, clippy::many_single_char_names)]

use crate::linalg::{from_dmatrix, pseudo_inverse, sorted_svd, to_dmatrix};
use log::debug;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use specmap_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// VCA configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VcaConfig {
    /// Seed for the random projection directions.
    pub seed: u64,
}

impl Default for VcaConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl VcaConfig {
    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Fitted endmember model.
#[derive(Debug, Clone, PartialEq)]
pub struct VcaModel {
    indices: Vec<usize>,
    endmembers: Array2<f64>,
    projected: Array2<f64>,
    abundances: Array2<f64>,
}

impl VcaModel {
    /// Extracts `endmember_count` endmembers from `spectra` (rows are pixels).
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] when `endmember_count` is zero or
    /// exceeds the number of pixels or channels.
    pub fn fit(spectra: &Array2<f64>, endmember_count: usize, config: &VcaConfig) -> Result<Self> {
        let (pixels, channels) = spectra.dim();
        if pixels == 0 {
            return Err(Error::EmptyDataset);
        }
        let p = endmember_count;
        if p == 0 || p > pixels || p > channels {
            return Err(Error::InvalidParameter(format!(
                "endmember count {p} must be between 1 and min(pixels = {pixels}, channels = {channels})"
            )));
        }

        // Columns are pixels.
        let r = to_dmatrix(spectra).transpose();
        let svd = sorted_svd(&r * r.transpose() / pixels as f64)?;
        let subspace = svd.u.columns(0, p).into_owned();
        let mut y = subspace.transpose() * &r;

        let mean: DVector<f64> = y.column_mean();
        for mut column in y.column_iter_mut() {
            let denom = column.dot(&mean);
            if denom.abs() > f64::EPSILON {
                column /= denom;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut a = DMatrix::<f64>::zeros(p, p);
        a[(p - 1, 0)] = 1.0;
        let mut indices = Vec::with_capacity(p);
        let identity = DMatrix::<f64>::identity(p, p);

        for i in 0..p {
            let w = DVector::from_fn(p, |_, _| rng.gen_range(-1.0..1.0));
            let projector = &identity - &a * pseudo_inverse(a.clone())?;
            let mut f = projector * w;
            let norm = f.norm();
            if norm > 0.0 {
                f /= norm;
            }
            let v = f.transpose() * &y;
            let (best, _) = v.iter().enumerate().fold((0, f64::NEG_INFINITY), |acc, (j, &val)| {
                if val.abs() > acc.1 {
                    (j, val.abs())
                } else {
                    acc
                }
            });
            debug!("endmember {i}: pixel {best}");
            indices.push(best);
            a.set_column(i, &y.column(best));
        }

        let e = DMatrix::from_fn(channels, p, |row, col| r[(row, indices[col])]);
        let abundances = pseudo_inverse(e.clone())? * &r;

        Ok(Self {
            indices,
            endmembers: from_dmatrix(&e),
            projected: from_dmatrix(&y),
            abundances: from_dmatrix(&abundances.transpose()),
        })
    }

    /// Abundance of endmember `k` (0-based) in every pixel.
    ///
    /// # Errors
    /// Returns [`Error::ComponentOutOfRange`] if `k` is not an endmember.
    pub fn results(&self, k: usize) -> Result<Array1<f64>> {
        if k >= self.indices.len() {
            return Err(Error::ComponentOutOfRange {
                index: k,
                available: self.indices.len(),
            });
        }
        Ok(self.abundances.column(k).to_owned())
    }

    /// Pixel index of each endmember.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Endmember spectra, one per column.
    #[must_use]
    pub fn endmembers(&self) -> &Array2<f64> {
        &self.endmembers
    }

    /// Pixels in the projected subspace, one per column.
    #[must_use]
    pub fn projected(&self) -> &Array2<f64> {
        &self.projected
    }

    /// Abundances; row per pixel, column per endmember.
    #[must_use]
    pub fn abundances(&self) -> &Array2<f64> {
        &self.abundances
    }

    /// Number of endmembers.
    #[must_use]
    pub fn endmember_count(&self) -> usize {
        self.indices.len()
    }
}
