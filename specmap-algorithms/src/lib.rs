//! specmap-algorithms: Transforms and analyses for spectral datasets.
//!
//! This crate provides:
//! - **Preprocessing** - normalization, background and baseline removal,
//!   windowed filters, truncated SVD, Savitzky-Golay
//! - **Peak quantification** - intensity, area, and bandwidth maps, band ratios
//! - **Multivariate analysis** - PCA, VCA, PLS, k-means
//! - **SpectralDataset** - the engine that applies all of the above in place
//!   and collects the resulting maps
//!
#![warn(missing_docs)]

mod cache;
mod dataset;
mod kmeans;
mod linalg;
mod pca;
mod peak;
mod pls;
pub mod preprocessing;
mod vca;

pub use dataset::{AnalysisConfig, AxisDescriptions, MapOutcome, MapWarning, SpectralDataset};
pub use kmeans::{kmeans, KMeansConfig, KMeansResult};
pub use pca::PcaModel;
pub use peak::{
    band_ratio, band_ratio_map_type, univariate, univariate_map_type, PeakQuantification,
};
pub use pls::{PlsConfig, PlsModel};
pub use vca::{VcaConfig, VcaModel};

// Re-export the core data model
pub use specmap_core::{
    BaselineMethod, ChannelRange, DerivedMap, Error, IntegrationMethod, MapRegistry, Result,
    SpectralData, ValueMethod,
};
