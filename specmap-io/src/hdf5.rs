//! HDF5 dataset I/O.
//!
//! Layout: a root attribute `specmap_format_version`, and an `/entry` group
//! (`NX_class = NXentry`) holding a `name` attribute plus the datasets
//! `spectra` (rows x channels), `x`, `y` and `wavelength`.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use log::debug;
use ndarray::{Array1, Array2};
use specmap_core::SpectralData;
use std::path::Path;
use std::str::FromStr;

const FORMAT_VERSION: &str = "0.1";

/// HDF5 write options.
#[derive(Clone, Debug)]
pub struct Hdf5WriteOptions {
    /// Deflate level (0-9), or `None` for no compression.
    pub compression: Option<u8>,
    /// Enable the shuffle filter alongside compression.
    pub shuffle: bool,
}

impl Default for Hdf5WriteOptions {
    fn default() -> Self {
        Self {
            compression: Some(4),
            shuffle: true,
        }
    }
}

impl Hdf5WriteOptions {
    /// Set the deflate level.
    #[must_use]
    pub fn with_compression(mut self, level: Option<u8>) -> Self {
        self.compression = level;
        self
    }

    /// Enable or disable the shuffle filter.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Named dataset read back from an HDF5 file.
#[derive(Debug, Clone)]
pub struct Hdf5Dataset {
    /// Dataset name stored on `/entry`.
    pub name: String,
    /// Spectra and axes.
    pub data: SpectralData,
}

/// Writes a dataset to an HDF5 file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_dataset_hdf5<P: AsRef<Path>>(
    path: P,
    name: &str,
    data: &SpectralData,
    options: &Hdf5WriteOptions,
) -> Result<()> {
    let file = File::create(&path)?;
    set_attr_str_file(&file, "specmap_format_version", FORMAT_VERSION)?;

    let entry = file.create_group("entry")?;
    set_attr_str_group(&entry, "NX_class", "NXentry")?;
    set_attr_str_group(&entry, "name", name)?;

    let spectra = data.spectra();
    let spectra_ds = create_fixed_dataset::<f64, _>(
        &entry,
        "spectra",
        (spectra.nrows(), spectra.ncols()),
        spectra.len(),
        options,
    )?;
    write_values(&spectra_ds, spectra.iter().copied().collect())?;

    let axes = [
        ("x", data.x()),
        ("y", data.y()),
        ("wavelength", data.wavelength()),
    ];
    for (field, values) in axes {
        let ds =
            create_fixed_dataset::<f64, _>(&entry, field, values.len(), values.len(), options)?;
        write_values(&ds, values.to_vec())?;
    }

    debug!(
        "wrote {}x{} spectra to {}",
        spectra.nrows(),
        spectra.ncols(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a dataset written by [`write_dataset_hdf5`].
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the stored shapes are inconsistent.
pub fn read_dataset_hdf5<P: AsRef<Path>>(path: P) -> Result<Hdf5Dataset> {
    let file = File::open(path)?;
    let entry = file.group("entry")?;
    let name = read_attr_opt_string(&entry, "name")?.unwrap_or_default();

    let spectra_ds = entry.dataset("spectra")?;
    let shape = spectra_ds.shape();
    let [rows, cols] = shape[..] else {
        return Err(Error::InvalidFormat(format!(
            "spectra must be two-dimensional, found shape {shape:?}"
        )));
    };
    let spectra = Array2::from_shape_vec((rows, cols), spectra_ds.read_raw::<f64>()?)
        .map_err(|e| Error::InvalidFormat(format!("spectra: {e}")))?;

    let x = Array1::from(read_dataset_vec::<f64>(&entry, "x")?);
    let y = Array1::from(read_dataset_vec::<f64>(&entry, "y")?);
    let wavelength = Array1::from(read_dataset_vec::<f64>(&entry, "wavelength")?);

    let data = if x.is_empty() && y.is_empty() && rows > 0 {
        SpectralData::without_coordinates(spectra, wavelength)?
    } else {
        SpectralData::new(spectra, wavelength, x, y)?
    };
    Ok(Hdf5Dataset { name, data })
}

fn create_fixed_dataset<T: H5Type, S>(
    group: &Group,
    name: &str,
    shape: S,
    len: usize,
    options: &Hdf5WriteOptions,
) -> Result<Dataset>
where
    S: Into<hdf5::Extents>,
{
    let mut builder = group.new_dataset::<T>().shape(shape);

    // Filters need chunked storage, which cannot be empty.
    if len > 0 {
        if let Some(level) = options.compression {
            builder = builder.deflate(level);
            if options.shuffle {
                builder = builder.shuffle();
            }
        }
    }

    Ok(builder.create(name)?)
}

fn write_values(dataset: &Dataset, values: Vec<f64>) -> Result<()> {
    if !values.is_empty() {
        dataset.write_raw(values.as_slice())?;
    }
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn read_attr_opt_string(group: &Group, name: &str) -> Result<Option<String>> {
    match group.attr(name) {
        Ok(attr) => {
            let value: VarLenUnicode = attr.read_scalar()?;
            Ok(Some(value.to_string()))
        }
        Err(_) => Ok(None),
    }
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
