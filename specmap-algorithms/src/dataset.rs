//! The spectral dataset engine.
//!
//! [`SpectralDataset`] owns the spectra and axes, applies preprocessing
//! transforms in place with a one-level undo, runs the mapping and
//! multivariate analyses, and keeps the derived maps in a [`MapRegistry`].
//!
//! Every map-producing operation refuses to run on a non-spatial dataset
//! and leaves the registry untouched when it fails.
#![allow(clippy::missing_errors_doc)]

use crate::cache::AnalysisCache;
use crate::kmeans::{kmeans, KMeansConfig, KMeansResult};
use crate::pca::PcaModel;
use crate::peak::{band_ratio, band_ratio_map_type, univariate, univariate_map_type};
use crate::pls::{PlsConfig, PlsModel};
use crate::preprocessing;
use crate::vca::{VcaConfig, VcaModel};
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1};
use specmap_core::{
    BaselineMethod, ChannelRange, DerivedMap, Error, IntegrationMethod, MapRegistry, Result,
    SpectralData, ValueMethod,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for the multivariate analyses.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// Endmember extraction settings.
    pub vca: VcaConfig,
    /// PLS settings.
    pub pls: PlsConfig,
    /// Clustering settings.
    pub kmeans: KMeansConfig,
}

impl AnalysisConfig {
    /// Set the VCA configuration.
    #[must_use]
    pub fn with_vca(mut self, vca: VcaConfig) -> Self {
        self.vca = vca;
        self
    }

    /// Set the PLS configuration.
    #[must_use]
    pub fn with_pls(mut self, pls: PlsConfig) -> Self {
        self.pls = pls;
        self
    }

    /// Set the k-means configuration.
    #[must_use]
    pub fn with_kmeans(mut self, kmeans: KMeansConfig) -> Self {
        self.kmeans = kmeans;
        self
    }
}

/// Non-fatal condition reported alongside a new map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapWarning {
    /// The requested component was not computed; the highest one was used.
    ComponentClamped {
        /// Component asked for (0-based).
        requested: usize,
        /// Component actually mapped (0-based).
        used: usize,
    },
}

/// Outcome of a successful mapping call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOutcome {
    /// Registry index of the new map.
    pub index: usize,
    /// Condition to surface to the user, if any.
    pub warning: Option<MapWarning>,
}

/// Axis labels forwarded to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisDescriptions {
    /// Horizontal spatial axis.
    pub x: String,
    /// Vertical spatial axis.
    pub y: String,
    /// Spectral abscissa (e.g. Raman shift).
    pub spectral_abscissa: String,
    /// Spectral ordinate (e.g. intensity).
    pub spectral_ordinate: String,
}

impl Default for AxisDescriptions {
    fn default() -> Self {
        Self {
            x: "x".into(),
            y: "y".into(),
            spectral_abscissa: "Wavelength".into(),
            spectral_ordinate: "Intensity".into(),
        }
    }
}

/// In-memory spectral dataset with its transforms, analyses, and maps.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    name: String,
    data: SpectralData,
    axes: AxisDescriptions,
    config: AnalysisConfig,
    previous_spectra: Option<Array2<f64>>,
    last_operation: String,
    z_scores_applied: bool,
    previous_z_scores_applied: bool,
    generation: u64,
    pca: AnalysisCache<(), PcaModel>,
    vca: AnalysisCache<(usize, VcaConfig), VcaModel>,
    pls: AnalysisCache<(usize, PlsConfig), PlsModel>,
    kmeans: AnalysisCache<(usize, KMeansConfig), KMeansResult>,
    maps: MapRegistry,
}

impl SpectralDataset {
    /// Wraps loaded data in a dataset engine.
    pub fn new(name: impl Into<String>, data: SpectralData) -> Self {
        Self {
            name: name.into(),
            data,
            axes: AxisDescriptions::default(),
            config: AnalysisConfig::default(),
            previous_spectra: None,
            last_operation: String::new(),
            z_scores_applied: false,
            previous_z_scores_applied: false,
            generation: 0,
            pca: AnalysisCache::default(),
            vca: AnalysisCache::default(),
            pls: AnalysisCache::default(),
            kmeans: AnalysisCache::default(),
            maps: MapRegistry::new(),
        }
    }

    /// Creates a non-spatial dataset from selected rows of `source`.
    pub fn from_selection(
        name: impl Into<String>,
        source: &SpectralDataset,
        rows: &[usize],
    ) -> Result<Self> {
        let data = source.data.select_rows(rows)?;
        let mut dataset = Self::new(name, data).with_axes(source.axes.clone());
        dataset.config = source.config.clone();
        Ok(dataset)
    }

    /// Set the axis descriptions.
    #[must_use]
    pub fn with_axes(mut self, axes: AxisDescriptions) -> Self {
        self.axes = axes;
        self
    }

    /// Set the analysis configuration.
    #[must_use]
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    // ---- accessors -------------------------------------------------------

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the dataset.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Spectra, axes, and the range and size queries on them.
    #[must_use]
    pub fn data(&self) -> &SpectralData {
        &self.data
    }

    /// Axis descriptions.
    #[must_use]
    pub fn axes(&self) -> &AxisDescriptions {
        &self.axes
    }

    /// Label of the most recent transform.
    #[must_use]
    pub fn last_operation(&self) -> &str {
        &self.last_operation
    }

    /// True while the current spectra are z-score standardized.
    ///
    /// Undo swaps this flag along with the spectra; `set_data` clears it.
    #[must_use]
    pub fn z_scores_applied(&self) -> bool {
        self.z_scores_applied
    }

    /// True when an undo snapshot exists.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.previous_spectra.is_some()
    }

    /// Counter bumped on every change to the spectra.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Derived maps.
    #[must_use]
    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    /// Most recent PCA fit, if any.
    #[must_use]
    pub fn principal_components(&self) -> Option<&PcaModel> {
        self.pca.get()
    }

    /// Most recent VCA fit, if any.
    #[must_use]
    pub fn vertex_components(&self) -> Option<&VcaModel> {
        self.vca.get()
    }

    /// True once PCA has been computed, even if the spectra changed since.
    #[must_use]
    pub fn principal_components_calculated(&self) -> bool {
        self.pca.is_calculated()
    }

    /// True once VCA has been computed.
    #[must_use]
    pub fn vertex_components_calculated(&self) -> bool {
        self.vca.is_calculated()
    }

    /// True once PLS has been computed.
    #[must_use]
    pub fn partial_least_squares_calculated(&self) -> bool {
        self.pls.is_calculated()
    }

    /// True once k-means has been computed.
    #[must_use]
    pub fn k_means_calculated(&self) -> bool {
        self.kmeans.is_calculated()
    }

    /// Most recent PLS fit, if any.
    #[must_use]
    pub fn partial_least_squares(&self) -> Option<&PlsModel> {
        self.pls.get()
    }

    /// Most recent clustering, if any.
    #[must_use]
    pub fn k_means(&self) -> Option<&KMeansResult> {
        self.kmeans.get()
    }

    /// Replaces all data.
    ///
    /// The undo snapshot and every cached analysis are discarded, and the
    /// z-score flag is cleared.
    pub fn set_data(
        &mut self,
        spectra: Array2<f64>,
        wavelength: Array1<f64>,
        x: Array1<f64>,
        y: Array1<f64>,
    ) -> Result<()> {
        self.data.set_data(spectra, wavelength, x, y)?;
        self.previous_spectra = None;
        self.z_scores_applied = false;
        self.clear_analyses();
        self.generation += 1;
        Ok(())
    }

    fn clear_analyses(&mut self) {
        self.pca.clear();
        self.vca.clear();
        self.pls.clear();
        self.kmeans.clear();
    }

    // ---- transforms ------------------------------------------------------

    fn apply(&mut self, label: &str, spectra: Array2<f64>) -> Result<()> {
        let old = self.data.replace_spectra(spectra)?;
        self.previous_spectra = Some(old);
        self.previous_z_scores_applied = self.z_scores_applied;
        self.last_operation = label.to_string();
        self.generation += 1;
        Ok(())
    }

    /// Removes every spectrum whose position falls outside the rectangle.
    ///
    /// Cropping changes the row count, so the undo snapshot and the cached
    /// analyses are discarded. Returns the number of spectra removed.
    pub fn crop(&mut self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<usize> {
        let removed = self.data.crop(x_min, x_max, y_min, y_max)?;
        info!(
            "crop applied: x [{x_min}, {x_max}], y [{y_min}, {y_max}]; {removed} spectra removed"
        );
        self.previous_spectra = None;
        self.clear_analyses();
        self.last_operation = "crop".into();
        self.generation += 1;
        Ok(removed)
    }

    /// Min/max normalization of the whole matrix.
    pub fn min_max_normalize(&mut self) -> Result<()> {
        let out = preprocessing::min_max_normalize(self.data.spectra());
        self.apply("min/max normalize", out)?;
        info!("min/max normalize applied");
        Ok(())
    }

    /// Scales every spectrum to unit area.
    pub fn unit_area_normalize(&mut self) -> Result<()> {
        let out = preprocessing::unit_area_normalize(self.data.spectra());
        self.apply("unit area normalize", out)?;
        info!("unit area normalize applied");
        Ok(())
    }

    /// Standardizes every channel in place.
    pub fn z_score_normalize(&mut self) -> Result<()> {
        let out = preprocessing::z_score_normalize(self.data.spectra());
        self.apply("Z-score normalize", out)?;
        self.z_scores_applied = true;
        info!("Z-score normalize applied");
        Ok(())
    }

    /// Standardized copy of the spectra; the dataset is unchanged.
    #[must_use]
    pub fn z_score_norm_copy(&self) -> Array2<f64> {
        preprocessing::z_score_normalize(self.data.spectra())
    }

    /// Subtracts a background spectrum from every row.
    pub fn subtract_background(&mut self, background: ArrayView1<'_, f64>) -> Result<()> {
        let out = preprocessing::subtract_background(self.data.spectra(), background)?;
        self.apply("background correction", out)?;
        info!("background correction applied");
        Ok(())
    }

    /// Subtracts an estimated baseline. Unknown methods change nothing.
    pub fn baseline(&mut self, method: &BaselineMethod, window: usize) -> Result<()> {
        let Some(out) = preprocessing::baseline_correct(self.data.spectra(), method, window)? else {
            return Ok(());
        };
        self.apply("baseline correction", out)?;
        info!("baseline correction applied: method = {method}, window = {window}");
        Ok(())
    }

    /// Median filter along the channel axis.
    pub fn median_filter(&mut self, window: usize) -> Result<()> {
        let out = preprocessing::median_filter(self.data.spectra(), window)?;
        self.apply("median filter", out)?;
        info!("median filter applied: window = {window}");
        Ok(())
    }

    /// Moving-average filter along the channel axis.
    pub fn linear_moving_average(&mut self, window: usize) -> Result<()> {
        let out = preprocessing::moving_average(self.data.spectra(), window)?;
        self.apply("moving average filter", out)?;
        info!("moving average filter applied: window = {window}");
        Ok(())
    }

    /// Truncated SVD reconstruction.
    pub fn singular_value_denoise(&mut self, singular_values: usize) -> Result<()> {
        let out = preprocessing::svd_denoise(self.data.spectra(), singular_values)?;
        self.apply("truncated SVD de-noise", out)?;
        info!("truncated SVD de-noise applied: singular values = {singular_values}");
        Ok(())
    }

    /// Savitzky-Golay smoothing or differentiation.
    pub fn derivatize(
        &mut self,
        derivative_order: usize,
        polynomial_order: usize,
        window: usize,
    ) -> Result<()> {
        let out = preprocessing::savitzky_golay(
            self.data.spectra(),
            derivative_order,
            polynomial_order,
            window,
        )?;
        self.apply("Savitzky-Golay filtering", out)?;
        info!(
            "Savitzky-Golay filtering applied: derivative = {derivative_order}, polynomial = {polynomial_order}, window = {window}"
        );
        Ok(())
    }

    /// Swaps the spectra with the undo snapshot. Calling it twice redoes.
    /// The z-score flag is swapped with them.
    ///
    /// Returns `false` when there is no snapshot.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.previous_spectra.take() else {
            warn!("undo requested but no previous spectra are stored");
            return false;
        };
        match self.data.replace_spectra(previous) {
            Ok(current) => {
                self.previous_spectra = Some(current);
                std::mem::swap(&mut self.z_scores_applied, &mut self.previous_z_scores_applied);
                self.last_operation = "Undo".into();
                self.generation += 1;
                info!("Undo applied");
                true
            }
            Err(err) => {
                warn!("undo snapshot no longer matches the data: {err}");
                false
            }
        }
    }

    // ---- mapping ---------------------------------------------------------

    fn ensure_spatial(&self) -> Result<()> {
        if self.data.is_non_spatial() {
            warn!("dataset '{}' is non-spatial; mapping refused", self.name);
            return Err(Error::NonSpatial);
        }
        Ok(())
    }

    fn register(&mut self, map: DerivedMap, warning: Option<MapWarning>) -> MapOutcome {
        let index = self.maps.add(map);
        MapOutcome { index, warning }
    }

    fn new_map(&self, name: String, map_type: String, values: Array1<f64>) -> Result<DerivedMap> {
        DerivedMap::new(
            name,
            map_type,
            values,
            self.data.x().clone(),
            self.data.y().clone(),
        )
    }

    /// Single-region peak map.
    pub fn univariate(
        &mut self,
        region: ChannelRange,
        name: impl Into<String>,
        value_method: ValueMethod,
        integration_method: IntegrationMethod,
        gradient_index: u32,
    ) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!(
            "Univariate: region = [{}, {}], name = {name}, value method = {value_method}, integration method = {integration_method}, gradient = {gradient_index}",
            region.min, region.max
        );
        let quantified = univariate(
            self.data.spectra(),
            self.data.wavelength(),
            region,
            value_method,
            integration_method,
            self.z_scores_applied,
        )?;
        let map = self
            .new_map(name, univariate_map_type(value_method), quantified.values)?
            .with_gradient(gradient_index)
            .with_diagnostics(quantified.diagnostics);
        Ok(self.register(map, None))
    }

    /// Ratio of two regions.
    pub fn band_ratio(
        &mut self,
        first: ChannelRange,
        second: ChannelRange,
        name: impl Into<String>,
        value_method: ValueMethod,
        integration_method: IntegrationMethod,
        gradient_index: u32,
    ) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!(
            "BandRatio: first = [{}, {}], second = [{}, {}], name = {name}, value method = {value_method}, integration method = {integration_method}, gradient = {gradient_index}",
            first.min, first.max, second.min, second.max
        );
        let quantified = band_ratio(
            self.data.spectra(),
            self.data.wavelength(),
            first,
            second,
            value_method,
            integration_method,
        )?;
        let map = self
            .new_map(name, band_ratio_map_type(value_method), quantified.values)?
            .with_gradient(gradient_index)
            .with_diagnostics(quantified.diagnostics);
        Ok(self.register(map, None))
    }

    /// Map of principal component scores (`component` is 0-based).
    pub fn principal_components_map(
        &mut self,
        component: usize,
        name: impl Into<String>,
        gradient_index: u32,
        clamp_negative: bool,
        recalculate: bool,
    ) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!(
            "PrincipalComponents: component = {component}, name = {name}, gradient = {gradient_index}, recalculate = {recalculate}"
        );
        let spectra = self.data.spectra();
        let model = self
            .pca
            .get_or_try_insert_with((), self.generation, recalculate, || PcaModel::fit(spectra))?;
        let values = model.results(component, clamp_negative)?;
        let map_type = format!("(Principal Component {})", component + 1);
        let map = self.new_map(name, map_type, values)?.with_gradient(gradient_index);
        Ok(self.register(map, None))
    }

    /// Map of endmember abundances (`component` is 0-based).
    pub fn vertex_components_map(
        &mut self,
        endmembers: usize,
        component: usize,
        name: impl Into<String>,
        gradient_index: u32,
        recalculate: bool,
    ) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!(
            "VertexComponents: endmembers = {endmembers}, component = {component}, name = {name}, gradient = {gradient_index}, recalculate = {recalculate}"
        );
        let spectra = self.data.spectra();
        let config = &self.config.vca;
        let model = self.vca.get_or_try_insert_with(
            (endmembers, config.clone()),
            self.generation,
            recalculate,
            || VcaModel::fit(spectra, endmembers, config),
        )?;
        let values = model.results(component)?;
        let map_type = format!("(Vertex Component {})", component + 1);
        let map = self.new_map(name, map_type, values)?.with_gradient(gradient_index);
        Ok(self.register(map, None))
    }

    /// Map of a PLS X-loading column (`component` is 0-based).
    ///
    /// A component beyond those computed maps the highest one and reports
    /// [`MapWarning::ComponentClamped`].
    pub fn partial_least_squares_map(
        &mut self,
        components: usize,
        component: usize,
        name: impl Into<String>,
        gradient_index: u32,
        recalculate: bool,
    ) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!(
            "PartialLeastSquares: components = {components}, component = {component}, name = {name}, gradient = {gradient_index}, recalculate = {recalculate}"
        );
        let spectra = self.data.spectra();
        let wavelength = self.data.wavelength();
        let config = &self.config.pls;
        let model = self.pls.get_or_try_insert_with(
            (components, config.clone()),
            self.generation,
            recalculate,
            || PlsModel::fit(spectra, wavelength, components, config),
        )?;
        let computed = model.component_count();
        let (values, valid) = model.results(component);
        let used = component.min(computed - 1);
        let warning = (!valid).then(|| {
            warn!(
                "PLS component {component} requested but only {computed} computed; mapping component {used}"
            );
            MapWarning::ComponentClamped {
                requested: component,
                used,
            }
        });
        let map_type = format!(
            "Partial Least Squares Map number of components = {computed}. Component number {}",
            used + 1
        );
        let map = self.new_map(name, map_type, values)?.with_gradient(gradient_index);
        Ok(self.register(map, warning))
    }

    /// Crisp cluster map with labels `1..=clusters`.
    pub fn k_means_map(&mut self, clusters: usize, name: impl Into<String>) -> Result<MapOutcome> {
        self.ensure_spatial()?;
        let name = name.into();
        info!("KMeans: clusters = {clusters}, name = {name}");
        let spectra = self.data.spectra();
        let config = &self.config.kmeans;
        let result = self.kmeans.get_or_try_insert_with(
            (clusters, config.clone()),
            self.generation,
            false,
            || kmeans(spectra, clusters, config),
        )?;
        let values = result.labels.clone();
        let map_type = format!("K-means clustering map. Number of clusters = {clusters}");
        let map = self.new_map(name, map_type, values)?.with_clusters(clusters);
        Ok(self.register(map, None))
    }

    // ---- registry --------------------------------------------------------

    /// Appends an externally built map.
    pub fn add_map(&mut self, map: DerivedMap) -> usize {
        self.maps.add(map)
    }

    /// Removes the map at `index`.
    pub fn remove_map_at(&mut self, index: usize) -> Option<DerivedMap> {
        self.maps.remove_at(index)
    }

    /// Removes every map named `name`.
    pub fn remove_maps_named(&mut self, name: &str) -> usize {
        self.maps.remove_by_name(name)
    }

    /// Names of the current maps, in order.
    #[must_use]
    pub fn map_names(&self) -> Vec<&str> {
        self.maps.names_in_order()
    }

    /// Number of maps ever created on this dataset.
    #[must_use]
    pub fn map_loading_count(&self) -> usize {
        self.maps.count_created()
    }
}
