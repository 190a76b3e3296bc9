//! specmap-io: Dataset persistence and map export for specmap.
//!
//! This crate provides:
//! - A native little-endian dataset format, read through memory-mapped files
//!   via memmap2
//! - CSV export of derived maps
//! - Optional HDF5 storage behind the `hdf5` feature
//!

mod error;
mod format;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use format::{FileSummary, FIELDS, MAGIC};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_dataset_hdf5, write_dataset_hdf5, Hdf5Dataset, Hdf5WriteOptions};
pub use reader::{load_dataset, DatasetFileReader, MappedFileReader};
pub use writer::{export_map_csv, save_dataset, DataFileWriter};
