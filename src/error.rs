use std::path::PathBuf;

use thiserror::Error;

/// Every way loading or preparing the dataset can fail. None of these are
/// recoverable; callers are expected to surface them and stop.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read tabular file '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to read array archive '{path}': {source}")]
    NpzRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },
    #[error("Failed to write array archive '{path}': {source}")]
    NpzWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpzError,
    },
    #[error("Failed to read HDF5 file '{path}': {source}")]
    Hdf5 {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },
    #[error("Unsupported array storage '{path}': expected a .h5, .hdf5 or .npz file.")]
    UnsupportedFormat { path: PathBuf },
    #[error("Dataset '{key}' not found in '{path}'. Available entries: {available:?}")]
    MissingDataset {
        key: String,
        path: PathBuf,
        available: Vec<String>,
    },
    #[error("'{path}' line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("'{path}' has {found} rows, expected {expected}.")]
    RowCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}.")]
    Shape {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("{what} index {index} is out of bounds for length {len}.")]
    IndexOutOfBounds {
        what: &'static str,
        index: i64,
        len: usize,
    },
}
