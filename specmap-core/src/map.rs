//! Derived maps: one scalar per spectrum, aligned with the spatial axis.

use crate::data::ChannelRange;
use crate::{Error, Result};
use ndarray::{Array1, Array2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear baselines drawn under one spectral region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Baseline {
    /// Region the baselines span.
    pub region: ChannelRange,
    /// One row per spectrum, one column per channel in `region`.
    pub curves: Array2<f64>,
}

/// Auxiliary curves kept alongside a map for inspection.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapDiagnostics {
    /// Baselines subtracted during area quantification (one set per region).
    pub baselines: Vec<Baseline>,
    /// Half-maximum lines from bandwidth quantification. Columns are
    /// left wavelength, left value, right wavelength, right value.
    pub half_max_lines: Option<Array2<f64>>,
}

impl MapDiagnostics {
    /// Returns true when no curves were retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty() && self.half_max_lines.is_none()
    }
}

/// Named result vector produced by a mapping or analysis operation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DerivedMap {
    name: String,
    map_type: String,
    values: Array1<f64>,
    x: Array1<f64>,
    y: Array1<f64>,
    gradient_index: u32,
    crisp_clusters: bool,
    cluster_count: usize,
    diagnostics: MapDiagnostics,
}

impl DerivedMap {
    /// Creates a map from its values and the coordinates they belong to.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if `x` or `y` differ in length
    /// from `values`.
    pub fn new(
        name: impl Into<String>,
        map_type: impl Into<String>,
        values: Array1<f64>,
        x: Array1<f64>,
        y: Array1<f64>,
    ) -> Result<Self> {
        for (what, len) in [("map x", x.len()), ("map y", y.len())] {
            if len != values.len() {
                return Err(Error::DimensionMismatch {
                    what,
                    expected: values.len(),
                    found: len,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            map_type: map_type.into(),
            values,
            x,
            y,
            gradient_index: 0,
            crisp_clusters: false,
            cluster_count: 0,
            diagnostics: MapDiagnostics::default(),
        })
    }

    /// Sets the color gradient index forwarded to the presentation layer.
    #[must_use]
    pub fn with_gradient(mut self, index: u32) -> Self {
        self.gradient_index = index;
        self
    }

    /// Marks the values as crisp cluster labels.
    #[must_use]
    pub fn with_clusters(mut self, count: usize) -> Self {
        self.crisp_clusters = true;
        self.cluster_count = count;
        self
    }

    /// Attaches diagnostic curves.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: MapDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method and parameter description, e.g. `"1-Region Univariate (Area)"`.
    #[must_use]
    pub fn map_type(&self) -> &str {
        &self.map_type
    }

    #[must_use]
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    #[must_use]
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    #[must_use]
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    #[must_use]
    pub fn gradient_index(&self) -> u32 {
        self.gradient_index
    }

    #[must_use]
    pub fn crisp_clusters(&self) -> bool {
        self.crisp_clusters
    }

    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    #[must_use]
    pub fn diagnostics(&self) -> &MapDiagnostics {
        &self.diagnostics
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (min, max) of the finite values, for color scale setup.
    #[must_use]
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_length_mismatch_rejected() {
        let result = DerivedMap::new(
            "m",
            "t",
            array![1.0, 2.0],
            array![0.0, 1.0, 2.0],
            array![0.0, 1.0],
        );
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { what: "map x", .. })
        ));
    }

    #[test]
    fn test_cluster_builder() {
        let map = DerivedMap::new(
            "clusters",
            "k-means clustering",
            array![1.0, 2.0, 1.0],
            array![0.0, 1.0, 2.0],
            array![0.0, 0.0, 0.0],
        )
        .unwrap()
        .with_clusters(2)
        .with_gradient(7);
        assert!(map.crisp_clusters());
        assert_eq!(map.cluster_count(), 2);
        assert_eq!(map.gradient_index(), 7);
        assert!(map.diagnostics().is_empty());
    }

    #[test]
    fn test_value_range_skips_nan() {
        let map = DerivedMap::new(
            "ratio",
            "2-Region Band Ratio Map (Area)",
            array![f64::NAN, 2.0, -1.0],
            array![0.0, 1.0, 2.0],
            array![0.0, 0.0, 0.0],
        )
        .unwrap();
        assert_eq!(map.value_range(), Some((-1.0, 2.0)));
    }
}
