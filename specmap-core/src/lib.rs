//! specmap-core: Core data model for spectral imaging datasets.
//!
//! This crate provides the spectra container with its axes, the derived map
//! type produced by mapping and analysis operations, the map registry, and
//! the method selectors shared by the algorithm crates.
//!

pub mod data;
pub mod error;
pub mod map;
pub mod method;
pub mod registry;

pub use data::{ChannelRange, RangeLookup, SpectralData};
pub use error::{Error, Result};
pub use map::{Baseline, DerivedMap, MapDiagnostics};
pub use method::{BaselineMethod, IntegrationMethod, ValueMethod};
pub use registry::MapRegistry;
