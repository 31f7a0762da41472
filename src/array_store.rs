// Keyed array storage: HDF5 datasets and NumPy `.npz` archives.

use std::fs::File;
use std::path::Path;

use log::{debug, info};
use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::dataset::PreparedDataset;
use crate::error::PrepError;

pub const CORRELATIONS_KEY: &str = "corr_matrix";
pub const TIME_SERIES_KEY: &str = "ts_data";
pub const FNC_KEY: &str = "flattened_fc";
pub const LABELS_KEY: &str = "labels";

/// Reads the array stored under `key`, widening `f32` storage to `f64`.
///
/// The format follows the extension: `.h5`/`.hdf5` files are read as HDF5
/// datasets, `.npz` files as NumPy archives.
pub fn read_dataset(path: &Path, key: &str) -> Result<ArrayD<f64>, PrepError> {
    std::fs::metadata(path).map_err(|source| PrepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("h5") | Some("hdf5") => read_h5_dataset(path, key),
        Some("npz") => read_npz_dataset(path, key),
        _ => Err(PrepError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// `key` may be a nested path such as `group/data`; top-level keys are
/// checked against the file's members first so a typo lists what exists.
pub fn read_h5_dataset(path: &Path, key: &str) -> Result<ArrayD<f64>, PrepError> {
    let h5_err = |source| PrepError::Hdf5 {
        path: path.to_path_buf(),
        source,
    };
    let file = hdf5::File::open(path).map_err(h5_err)?;
    let name = key.trim_start_matches('/');

    if !name.contains('/') {
        let available = file.member_names().map_err(h5_err)?;
        if !available.iter().any(|member| member == name) {
            return Err(PrepError::MissingDataset {
                key: key.to_string(),
                path: path.to_path_buf(),
                available,
            });
        }
    }
    debug!("Reading HDF5 dataset '{}' from {}", name, path.display());

    let dataset = file.dataset(name).map_err(h5_err)?;
    dataset.read_dyn::<f64>().map_err(h5_err)
}

/// `numpy.savez` names entries `key.npy`; both spellings are accepted.
pub fn read_npz_dataset(path: &Path, key: &str) -> Result<ArrayD<f64>, PrepError> {
    let npz_err = |source| PrepError::NpzRead {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| PrepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(npz_err)?;

    let available = npz.names().map_err(npz_err)?;
    let with_suffix = format!("{}.npy", key);
    let entry = available
        .iter()
        .find(|name| name.as_str() == key || *name == &with_suffix)
        .cloned()
        .ok_or_else(|| PrepError::MissingDataset {
            key: key.to_string(),
            path: path.to_path_buf(),
            available: available.clone(),
        })?;
    debug!("Reading entry '{}' from {}", entry, path.display());

    match npz.by_name::<OwnedRepr<f64>, IxDyn>(&entry) {
        Ok(array) => Ok(array),
        Err(f64_err) => match npz.by_name::<OwnedRepr<f32>, IxDyn>(&entry) {
            Ok(array) => {
                debug!("Entry '{}' is stored as f32; widening to f64.", entry);
                Ok(array.mapv(f64::from))
            }
            Err(_) => Err(npz_err(f64_err)),
        },
    }
}

/// Writes the four aligned arrays of a prepared dataset into one archive.
pub fn write_prepared(path: &Path, dataset: &PreparedDataset) -> Result<(), PrepError> {
    let npz_err = |source| PrepError::NpzWrite {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|source| PrepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzWriter::new(file);
    npz.add_array(CORRELATIONS_KEY, &dataset.correlations)
        .map_err(npz_err)?;
    npz.add_array(TIME_SERIES_KEY, &dataset.time_series)
        .map_err(npz_err)?;
    npz.add_array(FNC_KEY, &dataset.fnc).map_err(npz_err)?;
    npz.add_array(LABELS_KEY, &dataset.labels).map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;

    info!(
        "Wrote {} subjects to {}",
        dataset.subject_count(),
        path.display()
    );
    Ok(())
}
