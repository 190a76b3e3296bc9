//! K-means clustering of spectra.
//!
//! Lloyd iterations seeded with k-means++. Labels are 1-indexed so they can be
//! drawn directly as a crisp cluster map.
#![allow(clippy::cast_precision_loss)]

use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use specmap_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// K-means configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KMeansConfig {
    /// Maximum Lloyd iterations (default: 300).
    pub max_iterations: usize,
    /// Stop when no centroid moves further than this (default: 1e-9).
    pub tolerance: f64,
    /// Seed for k-means++ initialization.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-9,
            seed: 42,
        }
    }
}

impl KMeansConfig {
    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Result of a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster label per spectrum, in `1..=k`.
    pub labels: Array1<f64>,
    /// Cluster centres, one per row.
    pub centroids: Array2<f64>,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

impl KMeansResult {
    /// Number of clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centroids.nrows()
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(k, c)| (k, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn plus_plus_init(data: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    centroids.row_mut(0).assign(&data.row(rng.gen_range(0..n)));
    let mut distances: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            distances
                .iter()
                .position(|&d| {
                    target -= d;
                    target <= 0.0
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(chosen));
        for (d, row) in distances.iter_mut().zip(data.rows()) {
            *d = d.min(squared_distance(row, centroids.row(c)));
        }
    }
    centroids
}

/// Partitions the rows of `data` into `k` clusters.
///
/// An empty cluster is re-seeded with the point farthest from its centre.
///
/// # Errors
/// Returns [`Error::InvalidParameter`] if `k` is zero or exceeds the number
/// of rows.
pub fn kmeans(data: &Array2<f64>, k: usize, config: &KMeansConfig) -> Result<KMeansResult> {
    let n = data.nrows();
    if k == 0 || k > n {
        return Err(Error::InvalidParameter(format!(
            "cluster count {k} must be between 1 and the number of spectra ({n})"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut centroids = plus_plus_init(data, k, &mut rng);
    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for iteration in 1..=config.max_iterations {
        iterations = iteration;
        let mut farthest = (0usize, -1.0_f64);
        for (i, row) in data.rows().into_iter().enumerate() {
            let (label, distance) = nearest(row, &centroids);
            assignments[i] = label;
            if distance > farthest.1 {
                farthest = (i, distance);
            }
        }

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for (i, row) in data.rows().into_iter().enumerate() {
            let label = assignments[i];
            sums.row_mut(label).scaled_add(1.0, &row);
            counts[label] += 1;
        }

        let mut shift = 0.0_f64;
        for label in 0..k {
            let mut centre = sums.row_mut(label);
            if counts[label] == 0 {
                centre.assign(&data.row(farthest.0));
                assignments[farthest.0] = label;
                shift = f64::INFINITY;
            } else {
                centre /= counts[label] as f64;
            }
            shift = shift.max(squared_distance(centre.view(), centroids.row(label)).sqrt());
        }
        centroids = sums;

        if shift <= config.tolerance {
            break;
        }
    }
    debug!("k-means converged after {iterations} iterations");

    // Final assignment against the settled centres.
    for (i, row) in data.rows().into_iter().enumerate() {
        assignments[i] = nearest(row, &centroids).0;
    }

    Ok(KMeansResult {
        labels: assignments.iter().map(|&l| (l + 1) as f64).collect(),
        centroids,
        iterations,
    })
}
