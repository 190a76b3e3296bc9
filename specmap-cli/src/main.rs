//! specmap: command-line front end for spectral datasets.
//!
//! Loads a dataset, applies preprocessing steps, and exports derived maps.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

mod steps;

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use ndarray::{Array1, Array2};
use serde::Serialize;
use specmap_algorithms::{
    AnalysisConfig, BaselineMethod, ChannelRange, IntegrationMethod, KMeansConfig, MapOutcome,
    MapWarning, SpectralData, SpectralDataset, ValueMethod, VcaConfig,
};
use specmap_io::{DatasetFileReader, FileSummary};
use std::path::{Path, PathBuf};
use std::time::Instant;
use steps::Step;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SpecmapIo(#[from] specmap_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] specmap_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    Argument(String),
}

/// Peak quantification method.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    /// Largest value within the region
    Intensity,
    /// Baseline-corrected area
    Area,
    /// Full width at half maximum
    Bandwidth,
    /// Derivative peak (not available)
    Derivative,
}

impl From<Method> for ValueMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Intensity => ValueMethod::Intensity,
            Method::Area => ValueMethod::Area,
            Method::Bandwidth => ValueMethod::Bandwidth,
            Method::Derivative => ValueMethod::Derivative,
        }
    }
}

/// Spectral dataset transforms and mapping.
#[derive(Parser)]
#[command(name = "specmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a dataset file
    Info {
        /// Input dataset
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply preprocessing steps and save the result
    Preprocess {
        /// Input dataset
        input: PathBuf,

        /// Output dataset
        #[arg(short, long)]
        output: PathBuf,

        /// Steps in order: minmax, unit-area, zscore, background:<file>,
        /// baseline:<method>:<window>, median:<w>, moving-average:<w>,
        /// svd:<rank>, sg:<deriv>:<poly>:<w>, crop:<x0>:<x1>:<y0>:<y1>, undo
        #[arg(required = true)]
        steps: Vec<Step>,
    },

    /// Compute a derived map and export it as CSV
    Map {
        /// Input dataset
        input: PathBuf,

        /// Output CSV file (x,y,value)
        #[arg(short, long)]
        output: PathBuf,

        /// Map name
        #[arg(long, default_value = "map")]
        name: String,

        /// Color gradient index forwarded with the map
        #[arg(long, default_value = "0")]
        gradient: u32,

        #[command(subcommand)]
        analysis: Analysis,
    },

    /// Write a synthetic two-peak dataset for trials
    Synth {
        /// Output dataset
        #[arg(short, long)]
        output: PathBuf,

        /// Grid width
        #[arg(long, default_value = "16")]
        width: usize,

        /// Grid height
        #[arg(long, default_value = "16")]
        height: usize,

        /// Spectral channels
        #[arg(long, default_value = "256")]
        channels: usize,
    },
}

#[derive(Subcommand)]
enum Analysis {
    /// Single-region peak map
    Univariate {
        /// Region start wavelength
        #[arg(long)]
        start: f64,
        /// Region end wavelength
        #[arg(long)]
        end: f64,
        #[arg(short, long, value_enum, default_value = "intensity")]
        method: Method,
    },

    /// Ratio of two regions
    BandRatio {
        /// First region as start,end
        #[arg(long, num_args = 2, value_delimiter = ',', required = true)]
        first: Vec<f64>,
        /// Second region as start,end
        #[arg(long, num_args = 2, value_delimiter = ',', required = true)]
        second: Vec<f64>,
        #[arg(short, long, value_enum, default_value = "intensity")]
        method: Method,
    },

    /// Principal component score map
    Pca {
        /// Component number (1-based)
        #[arg(long, default_value = "1")]
        component: usize,
        /// Set negative scores to zero
        #[arg(long)]
        clamp_negative: bool,
    },

    /// Vertex component abundance map
    Vca {
        /// Number of endmembers
        #[arg(long)]
        endmembers: usize,
        /// Component number (1-based)
        #[arg(long, default_value = "1")]
        component: usize,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Partial least squares loading map
    Pls {
        /// Number of components to compute
        #[arg(long)]
        components: usize,
        /// Component number (1-based)
        #[arg(long, default_value = "1")]
        component: usize,
    },

    /// K-means cluster map
    Kmeans {
        /// Number of clusters
        #[arg(long)]
        clusters: usize,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Report printed by `specmap info`.
#[derive(Serialize)]
struct InfoReport {
    file: String,
    #[serde(flatten)]
    summary: FileSummary,
    wavelength_range: Option<(f64, f64)>,
    value_range: Option<(f64, f64)>,
    key_size: usize,
    value_size: usize,
}

fn is_hdf5(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "h5" | "hdf5" | "nxs"))
}

fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("dataset")
        .to_string()
}

fn load(path: &Path) -> Result<SpectralDataset> {
    if is_hdf5(path) {
        return load_hdf5(path);
    }
    let data = specmap_io::load_dataset(path)?;
    Ok(SpectralDataset::new(dataset_name(path), data))
}

#[cfg(feature = "hdf5")]
fn load_hdf5(path: &Path) -> Result<SpectralDataset> {
    let stored = specmap_io::read_dataset_hdf5(path)?;
    let name = if stored.name.is_empty() {
        dataset_name(path)
    } else {
        stored.name
    };
    Ok(SpectralDataset::new(name, stored.data))
}

#[cfg(not(feature = "hdf5"))]
fn load_hdf5(path: &Path) -> Result<SpectralDataset> {
    Err(CliError::Argument(format!(
        "{} looks like HDF5; rebuild with the `hdf5` feature",
        path.display()
    )))
}

fn save(path: &Path, dataset: &SpectralDataset) -> Result<()> {
    if is_hdf5(path) {
        return save_hdf5(path, dataset);
    }
    specmap_io::save_dataset(path, dataset.data())?;
    Ok(())
}

#[cfg(feature = "hdf5")]
fn save_hdf5(path: &Path, dataset: &SpectralDataset) -> Result<()> {
    specmap_io::write_dataset_hdf5(
        path,
        dataset.name(),
        dataset.data(),
        &specmap_io::Hdf5WriteOptions::default(),
    )?;
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn save_hdf5(path: &Path, _dataset: &SpectralDataset) -> Result<()> {
    Err(CliError::Argument(format!(
        "{} looks like HDF5; rebuild with the `hdf5` feature",
        path.display()
    )))
}

fn region(dataset: &SpectralDataset, start: f64, end: f64) -> Result<ChannelRange> {
    let lookup = dataset.data().find_range(start, end)?;
    if lookup.collapsed {
        warn!("no channel found for {end}; region collapsed to channel {}", lookup.range.min);
    }
    Ok(lookup.range)
}

fn component_index(component: usize) -> Result<usize> {
    component
        .checked_sub(1)
        .ok_or_else(|| CliError::Argument("component numbers start at 1".into()))
}

fn apply_step(dataset: &mut SpectralDataset, step: &Step) -> Result<()> {
    match step {
        Step::MinMax => dataset.min_max_normalize()?,
        Step::UnitArea => dataset.unit_area_normalize()?,
        Step::ZScore => dataset.z_score_normalize()?,
        Step::Background(path) => {
            let background = specmap_io::load_dataset(path)?.average_spectrum(false)?;
            dataset.subtract_background(background.row(0))?;
        }
        Step::Baseline { method, window } => {
            dataset.baseline(&BaselineMethod::from(method.as_str()), *window)?;
        }
        Step::Median(window) => dataset.median_filter(*window)?,
        Step::MovingAverage(window) => dataset.linear_moving_average(*window)?,
        Step::Svd(rank) => dataset.singular_value_denoise(*rank)?,
        Step::SavitzkyGolay {
            derivative,
            polynomial,
            window,
        } => dataset.derivatize(*derivative, *polynomial, *window)?,
        Step::Crop {
            x_min,
            x_max,
            y_min,
            y_max,
        } => {
            let removed = dataset.crop(*x_min, *x_max, *y_min, *y_max)?;
            info!("crop removed {removed} spectra");
        }
        Step::Undo => {
            if !dataset.undo() {
                warn!("nothing to undo");
            }
        }
    }
    Ok(())
}

fn run_analysis(
    dataset: &mut SpectralDataset,
    analysis: &Analysis,
    name: &str,
    gradient: u32,
) -> Result<MapOutcome> {
    let integration = IntegrationMethod::RiemannSum;
    let outcome = match analysis {
        Analysis::Univariate { start, end, method } => {
            let range = region(dataset, *start, *end)?;
            dataset.univariate(range, name, (*method).into(), integration, gradient)?
        }
        Analysis::BandRatio {
            first,
            second,
            method,
        } => {
            let first = region(dataset, first[0], first[1])?;
            let second = region(dataset, second[0], second[1])?;
            dataset.band_ratio(first, second, name, (*method).into(), integration, gradient)?
        }
        Analysis::Pca {
            component,
            clamp_negative,
        } => dataset.principal_components_map(
            component_index(*component)?,
            name,
            gradient,
            *clamp_negative,
            false,
        )?,
        Analysis::Vca {
            endmembers,
            component,
            ..
        } => dataset.vertex_components_map(
            *endmembers,
            component_index(*component)?,
            name,
            gradient,
            false,
        )?,
        Analysis::Pls {
            components,
            component,
        } => dataset.partial_least_squares_map(
            *components,
            component_index(*component)?,
            name,
            gradient,
            false,
        )?,
        Analysis::Kmeans { clusters, .. } => dataset.k_means_map(*clusters, name)?,
    };
    Ok(outcome)
}

/// Two Gaussian bands whose heights vary across the grid, on a sloped baseline.
fn synthesize(width: usize, height: usize, channels: usize) -> Result<SpectralData> {
    if width == 0 || height == 0 || channels < 8 {
        return Err(CliError::Argument(
            "synthetic grid needs a non-zero size and at least 8 channels".into(),
        ));
    }
    let rows = width * height;
    let wavelength = Array1::linspace(400.0, 400.0 + channels as f64, channels);
    let first_centre = channels as f64 / 3.0;
    let second_centre = 2.0 * channels as f64 / 3.0;
    let sigma = channels as f64 / 40.0 + 1.0;

    let mut spectra = Array2::zeros((rows, channels));
    let mut x = Array1::zeros(rows);
    let mut y = Array1::zeros(rows);
    for i in 0..rows {
        let (col, row) = (i / height, i % height);
        x[i] = col as f64;
        y[i] = row as f64;
        let a = (col as f64 + 1.0) / width as f64;
        let b = (row as f64 + 1.0) / height as f64;
        for j in 0..channels {
            let t = j as f64;
            let band = |centre: f64| (-(t - centre).powi(2) / (2.0 * sigma * sigma)).exp();
            spectra[[i, j]] = a * band(first_centre) + b * band(second_centre) + 0.05 + 1e-4 * t;
        }
    }
    Ok(SpectralData::new(spectra, wavelength, x, y)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Info { input, json } => {
            let dataset = load(&input)?;
            let data = dataset.data();
            let summary = if is_hdf5(&input) {
                FileSummary {
                    rows: data.len(),
                    channels: data.channels(),
                    spatial: !data.is_non_spatial(),
                    file_size: usize::try_from(std::fs::metadata(&input)?.len())
                        .unwrap_or(usize::MAX),
                }
            } else {
                DatasetFileReader::open(&input)?.summary()?
            };
            let report = InfoReport {
                file: input.display().to_string(),
                summary,
                wavelength_range: data.wavelength_range(),
                value_range: data.value_range(),
                key_size: data.key_size(),
                value_size: data.value_size(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("File: {}", report.file);
                println!(
                    "Size: {} bytes ({:.2} MB)",
                    report.summary.file_size,
                    report.summary.file_size as f64 / 1_000_000.0
                );
                println!("Spectra: {}", report.summary.rows);
                println!("Channels: {}", report.summary.channels);
                println!("Spatial: {}", report.summary.spatial);
                if let Some((min, max)) = report.wavelength_range {
                    println!("Wavelength range: {} - {}", min, max);
                }
                if let Some((min, max)) = report.value_range {
                    println!("Y range: {} - {}", min, max);
                }
                println!("Grid: {} x {}", report.key_size, report.value_size);
            }
        }

        Commands::Preprocess {
            input,
            output,
            steps,
        } => {
            let start = Instant::now();
            let mut dataset = load(&input)?;
            for step in &steps {
                apply_step(&mut dataset, step)?;
            }
            save(&output, &dataset)?;
            println!(
                "Applied {} step(s) in {:.2}s; last operation: {}",
                steps.len(),
                start.elapsed().as_secs_f64(),
                dataset.last_operation()
            );
        }

        Commands::Map {
            input,
            output,
            name,
            gradient,
            analysis,
        } => {
            let mut dataset = load(&input)?;
            let config = match &analysis {
                Analysis::Vca { seed, .. } => {
                    AnalysisConfig::default().with_vca(VcaConfig::default().with_seed(*seed))
                }
                Analysis::Kmeans { seed, .. } => AnalysisConfig::default()
                    .with_kmeans(KMeansConfig::default().with_seed(*seed)),
                _ => AnalysisConfig::default(),
            };
            dataset = dataset.with_config(config);

            let outcome = run_analysis(&mut dataset, &analysis, &name, gradient)?;
            if let Some(MapWarning::ComponentClamped { requested, used }) = outcome.warning {
                println!(
                    "Component {} was not computed; mapped component {} instead",
                    requested + 1,
                    used + 1
                );
            }
            let map = dataset
                .maps()
                .get(outcome.index)
                .ok_or_else(|| CliError::Argument("map was not registered".into()))?;
            specmap_io::export_map_csv(&output, map)?;
            println!("{}: {} ({} values)", map.name(), map.map_type(), map.len());
            println!("Written to: {}", output.display());
        }

        Commands::Synth {
            output,
            width,
            height,
            channels,
        } => {
            let data = synthesize(width, height, channels)?;
            let dataset = SpectralDataset::new(dataset_name(&output), data);
            save(&output, &dataset)?;
            println!(
                "Wrote {} spectra x {} channels to {}",
                dataset.data().len(),
                dataset.data().channels(),
                output.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_grid_layout() {
        let data = synthesize(4, 3, 64).unwrap();
        assert_eq!(data.len(), 12);
        assert_eq!(data.channels(), 64);
        assert_eq!(data.key_size(), 4);
        assert_eq!(data.value_size(), 3);
        assert!(synthesize(0, 3, 64).is_err());
    }

    #[test]
    fn test_steps_and_maps_on_synthetic_data() {
        let data = synthesize(4, 4, 64).unwrap();
        let mut dataset = SpectralDataset::new("synth", data);
        for step in ["median:3", "minmax", "undo"] {
            apply_step(&mut dataset, &step.parse().unwrap()).unwrap();
        }
        assert_eq!(dataset.last_operation(), "Undo");

        let analysis = Analysis::Kmeans {
            clusters: 2,
            seed: 42,
        };
        let outcome = run_analysis(&mut dataset, &analysis, "k", 0).unwrap();
        assert_eq!(dataset.maps().get(outcome.index).unwrap().len(), 16);
    }

    #[test]
    fn test_method_help_text() {
        let help = |method: Method| {
            method
                .to_possible_value()
                .and_then(|value| value.get_help().map(ToString::to_string))
                .unwrap()
        };
        assert_eq!(help(Method::Intensity), "Largest value within the region");
        assert!(help(Method::Area).contains("Baseline-corrected"));
    }

    #[test]
    fn test_component_numbers_start_at_one() {
        assert_eq!(component_index(1).unwrap(), 0);
        assert!(component_index(0).is_err());
    }

    #[test]
    fn test_hdf5_extension() {
        assert!(is_hdf5(Path::new("scan.H5")));
        assert!(!is_hdf5(Path::new("scan.spmap")));
    }
}
