//! # Dataset Assembly
//!
//! Turns the raw array archive and the three index files of a dataset root
//! into a `PreparedDataset`: component-selected time courses, per-subject
//! correlation matrices, flattened connectivity features and labels, all
//! gathered by the same subject index so that row `s` of every array
//! describes the same subject.

use std::ops::Range;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, Array3, ArrayD, Axis};

use crate::array_store::read_dataset;
use crate::connectivity::{subject_connectivity, upper_triangle_len};
use crate::error::PrepError;
use crate::layout::{DatasetLayout, SplitSizes};
use crate::tabular::{read_index_column, read_index_column_exact};

/// Four subject-aligned arrays ready for model training.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedDataset {
    /// Shape: [subjects, selected, selected].
    pub correlations: Array3<f64>,
    /// Shape: [subjects, selected, timepoints].
    pub time_series: Array3<f64>,
    /// Strict upper triangles of `correlations`.
    /// Shape: [subjects, selected * (selected - 1) / 2].
    pub fnc: Array2<f64>,
    /// Shape: [subjects].
    pub labels: Array1<i64>,
}

/// Contiguous partitions of a prepared dataset.
#[derive(Clone, Debug)]
pub struct DatasetSplits {
    pub train: PreparedDataset,
    pub test: PreparedDataset,
    pub validation: PreparedDataset,
}

impl PreparedDataset {
    pub fn subject_count(&self) -> usize {
        self.labels.len()
    }

    /// Checks that all four arrays agree on subject count and component count.
    pub fn validate(&self) -> Result<(), PrepError> {
        let subjects = self.subject_count();
        let (corr_subjects, corr_rows, corr_cols) = self.correlations.dim();
        let (ts_subjects, ts_components, ts_timepoints) = self.time_series.dim();
        let (fnc_subjects, fnc_features) = self.fnc.dim();

        if corr_subjects != subjects || corr_rows != ts_components || corr_cols != ts_components {
            return Err(PrepError::Shape {
                what: "correlation tensor".to_string(),
                expected: vec![subjects, ts_components, ts_components],
                found: vec![corr_subjects, corr_rows, corr_cols],
            });
        }
        if ts_subjects != subjects {
            return Err(PrepError::Shape {
                what: "time-series tensor".to_string(),
                expected: vec![subjects, ts_components, ts_timepoints],
                found: vec![ts_subjects, ts_components, ts_timepoints],
            });
        }
        let expected_features = upper_triangle_len(ts_components);
        if fnc_subjects != subjects || fnc_features != expected_features {
            return Err(PrepError::Shape {
                what: "flattened connectivity".to_string(),
                expected: vec![subjects, expected_features],
                found: vec![fnc_subjects, fnc_features],
            });
        }
        Ok(())
    }

    /// Gathers subjects by index in all four arrays at once.
    ///
    /// Indices may repeat (rows are duplicated) and need not be sorted; the
    /// result has exactly `indices.len()` subjects.
    pub fn select_subjects(&self, indices: &[i64]) -> Result<Self, PrepError> {
        let rows = resolve_indices(indices, self.subject_count(), "subject")?;
        Ok(Self {
            correlations: self.correlations.select(Axis(0), &rows),
            time_series: self.time_series.select(Axis(0), &rows),
            fnc: self.fnc.select(Axis(0), &rows),
            labels: self.labels.select(Axis(0), &rows),
        })
    }

    /// Splits into train, test and validation blocks, in that order.
    ///
    /// Sizes larger than what is left are clamped; any subjects beyond the
    /// three blocks are dropped.
    pub fn split(&self, sizes: &SplitSizes) -> DatasetSplits {
        let subjects = self.subject_count();
        if sizes.total() != subjects {
            warn!(
                "Split sizes ({} + {} + {}) do not sum to the {} available subjects.",
                sizes.train, sizes.test, sizes.validation, subjects
            );
        }
        let train_end = sizes.train.min(subjects);
        let test_end = (train_end + sizes.test).min(subjects);
        let validation_end = (test_end + sizes.validation).min(subjects);

        DatasetSplits {
            train: self.slice_subjects(0..train_end),
            test: self.slice_subjects(train_end..test_end),
            validation: self.slice_subjects(test_end..validation_end),
        }
    }

    fn slice_subjects(&self, range: Range<usize>) -> Self {
        Self {
            correlations: self.correlations.slice(s![range.clone(), .., ..]).to_owned(),
            time_series: self.time_series.slice(s![range.clone(), .., ..]).to_owned(),
            fnc: self.fnc.slice(s![range.clone(), ..]).to_owned(),
            labels: self.labels.slice(s![range]).to_owned(),
        }
    }

    /// `(correlations, time_series, fnc, labels)`.
    pub fn into_parts(self) -> (Array3<f64>, Array3<f64>, Array2<f64>, Array1<i64>) {
        (self.correlations, self.time_series, self.fnc, self.labels)
    }
}

fn resolve_indices(indices: &[i64], len: usize, what: &'static str) -> Result<Vec<usize>, PrepError> {
    indices
        .iter()
        .map(|&index| {
            usize::try_from(index)
                .ok()
                .filter(|&i| i < len)
                .ok_or(PrepError::IndexOutOfBounds { what, index, len })
        })
        .collect()
}

/// Reshapes the raw archive contents to `[subjects, raw_components, timepoints]`,
/// reading elements in row-major order regardless of the stored memory layout.
pub fn reshape_subjects(raw: ArrayD<f64>, layout: &DatasetLayout) -> Result<Array3<f64>, PrepError> {
    let target = (layout.subjects, layout.raw_components, layout.timepoints);
    let shape_err = || PrepError::Shape {
        what: format!("raw dataset '{}'", layout.dataset_key),
        expected: vec![target.0, target.1, target.2],
        found: raw.shape().to_vec(),
    };
    if raw.len() != layout.raw_element_count() {
        return Err(shape_err());
    }
    let elements: Vec<f64> = raw.iter().copied().collect();
    Array3::from_shape_vec(target, elements).map_err(|_| shape_err())
}

/// Keeps the components listed (one-based) in `one_based`, in that order.
pub fn select_components(data: &Array3<f64>, one_based: &[i64]) -> Result<Array3<f64>, PrepError> {
    let zero_based: Vec<i64> = one_based.iter().map(|&i| i - 1).collect();
    let columns = resolve_indices(&zero_based, data.dim().1, "component")?;
    Ok(data.select(Axis(1), &columns))
}

/// Loads and prepares one dataset root.
pub struct DatasetLoader {
    root: PathBuf,
    layout: DatasetLayout,
    progress: ProgressBar,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>, layout: DatasetLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            progress: ProgressBar::hidden(),
        }
    }

    /// Advances `progress` once per subject while computing connectivity.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn load(&self) -> Result<PreparedDataset, PrepError> {
        let layout = &self.layout;
        let root = self.root.as_path();

        let array_path = layout.array_path(root);
        info!(
            "Reading dataset '{}' from {}",
            layout.dataset_key,
            array_path.display()
        );
        let raw = read_dataset(&array_path, &layout.dataset_key)?;
        info!("Raw dataset shape: {:?}", raw.shape());
        let reshaped = reshape_subjects(raw, layout)?;
        info!("Reshaped to: {:?}", reshaped.shape());

        let component_path = layout.component_index_path(root);
        info!("Reading component indices from {}", component_path.display());
        let component_indices =
            read_index_column_exact(&component_path, layout.selected_components)?;
        let time_series = select_components(&reshaped, &component_indices)?;
        drop(reshaped);
        info!("Selected components: {:?}", time_series.shape());

        self.progress.set_length(layout.subjects as u64);
        let (correlations, fnc) = subject_connectivity(time_series.view(), &self.progress);
        self.progress.finish_with_message("Connectivity complete.");
        info!("Flattened connectivity shape: {:?}", fnc.shape());

        let subject_path = layout.subject_index_path(root);
        let subject_indices = read_index_column(&subject_path)?;
        debug!(
            "Read {} subject indices from {}",
            subject_indices.len(),
            subject_path.display()
        );
        let labels = read_index_column_exact(&layout.labels_path(root), layout.subjects)?;

        let full = PreparedDataset {
            correlations,
            time_series,
            fnc,
            labels: Array1::from_vec(labels),
        };
        let prepared = full.select_subjects(&subject_indices)?;
        prepared.validate()?;
        info!(
            "Selected {} of {} subjects.",
            prepared.subject_count(),
            layout.subjects
        );
        Ok(prepared)
    }
}

/// Loads `root` with the default OASIS-3 layout.
pub fn load_dataset(root: &Path) -> Result<PreparedDataset, PrepError> {
    DatasetLoader::new(root, DatasetLayout::default()).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn, ShapeBuilder};

    fn small_layout() -> DatasetLayout {
        DatasetLayout {
            subjects: 2,
            raw_components: 3,
            timepoints: 2,
            selected_components: 2,
            ..DatasetLayout::oasis3()
        }
    }

    fn numbered(subjects: usize) -> PreparedDataset {
        let k = 3;
        PreparedDataset {
            correlations: Array3::from_shape_fn((subjects, k, k), |(s, i, j)| (s * 100 + i * 10 + j) as f64),
            time_series: Array3::from_shape_fn((subjects, k, 4), |(s, c, t)| (s * 100 + c * 10 + t) as f64),
            fnc: Array2::from_shape_fn((subjects, upper_triangle_len(k)), |(s, f)| (s * 100 + f) as f64),
            labels: Array1::from_shape_fn(subjects, |s| s as i64 % 2),
        }
    }

    #[test]
    fn reshape_reads_row_major() {
        let raw = ArrayD::from_shape_vec(IxDyn(&[12]), (0..12).map(f64::from).collect()).unwrap();
        let reshaped = reshape_subjects(raw, &small_layout()).unwrap();
        assert_eq!(reshaped.dim(), (2, 3, 2));
        assert_eq!(reshaped[[0, 0, 1]], 1.0);
        assert_eq!(reshaped[[0, 2, 0]], 4.0);
        assert_eq!(reshaped[[1, 0, 0]], 6.0);
    }

    #[test]
    fn reshape_ignores_fortran_memory_order() {
        let c_order = ArrayD::from_shape_vec(IxDyn(&[2, 6]), (0..12).map(f64::from).collect()).unwrap();
        let mut f_order = ArrayD::<f64>::zeros(IxDyn(&[2, 6]).f());
        f_order.assign(&c_order);

        let from_c = reshape_subjects(c_order, &small_layout()).unwrap();
        let from_f = reshape_subjects(f_order, &small_layout()).unwrap();
        assert_eq!(from_c, from_f);
    }

    #[test]
    fn reshape_rejects_wrong_element_count() {
        let raw = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 3]));
        match reshape_subjects(raw, &small_layout()).unwrap_err() {
            PrepError::Shape { expected, found, .. } => {
                assert_eq!(expected, vec![2, 3, 2]);
                assert_eq!(found, vec![2, 3, 3]);
            }
            other => panic!("Expected Shape error, got {:?}", other),
        }
    }

    #[test]
    fn component_indices_are_one_based() {
        let data = Array3::from_shape_fn((1, 3, 2), |(_, c, t)| (c * 10 + t) as f64);
        let selected = select_components(&data, &[1, 3]).unwrap();
        assert_eq!(selected, array![[[0.0, 1.0], [20.0, 21.0]]]);

        let reordered = select_components(&data, &[3, 1]).unwrap();
        assert_eq!(reordered, array![[[20.0, 21.0], [0.0, 1.0]]]);
    }

    #[test]
    fn component_index_out_of_range_is_fatal() {
        let data = Array3::<f64>::zeros((1, 3, 2));
        assert!(matches!(
            select_components(&data, &[0]).unwrap_err(),
            PrepError::IndexOutOfBounds { what: "component", index: -1, len: 3 }
        ));
        assert!(matches!(
            select_components(&data, &[4]).unwrap_err(),
            PrepError::IndexOutOfBounds { what: "component", index: 3, len: 3 }
        ));
    }

    #[test]
    fn identity_selection_is_a_no_op() {
        let dataset = numbered(4);
        let selected = dataset.select_subjects(&[0, 1, 2, 3]).unwrap();
        assert_eq!(selected, dataset);
        assert_eq!(selected.select_subjects(&[0, 1, 2, 3]).unwrap(), dataset);
    }

    #[test]
    fn reversed_selection_reverses_every_array() {
        let dataset = numbered(4);
        let reversed = dataset.select_subjects(&[3, 2, 1, 0]).unwrap();
        for (new_row, old_row) in (0..4).zip((0..4).rev()) {
            assert_eq!(
                reversed.correlations.index_axis(Axis(0), new_row),
                dataset.correlations.index_axis(Axis(0), old_row)
            );
            assert_eq!(
                reversed.time_series.index_axis(Axis(0), new_row),
                dataset.time_series.index_axis(Axis(0), old_row)
            );
            assert_eq!(reversed.fnc.row(new_row), dataset.fnc.row(old_row));
            assert_eq!(reversed.labels[new_row], dataset.labels[old_row]);
        }
    }

    #[test]
    fn selection_filters_and_duplicates() {
        let dataset = numbered(5);
        let selected = dataset.select_subjects(&[4, 1, 1]).unwrap();
        assert_eq!(selected.subject_count(), 3);
        assert_eq!(selected.fnc.column(0).to_vec(), vec![400.0, 100.0, 100.0]);
        assert_eq!(selected.labels.to_vec(), vec![0, 1, 1]);
        assert_eq!(selected.correlations.dim(), (3, 3, 3));
        assert_eq!(selected.time_series.dim(), (3, 3, 4));
        selected.validate().unwrap();
    }

    #[test]
    fn subject_index_out_of_range_is_fatal() {
        let dataset = numbered(3);
        assert!(matches!(
            dataset.select_subjects(&[0, 3]).unwrap_err(),
            PrepError::IndexOutOfBounds { what: "subject", index: 3, len: 3 }
        ));
        assert!(matches!(
            dataset.select_subjects(&[-1]).unwrap_err(),
            PrepError::IndexOutOfBounds { what: "subject", index: -1, len: 3 }
        ));
    }

    #[test]
    fn validate_catches_misaligned_arrays() {
        let mut dataset = numbered(3);
        dataset.labels = Array1::zeros(2);
        assert!(matches!(dataset.validate().unwrap_err(), PrepError::Shape { .. }));
    }

    #[test]
    fn split_is_contiguous_and_ordered() {
        let dataset = numbered(10);
        let splits = dataset.split(&SplitSizes {
            train: 6,
            test: 2,
            validation: 2,
        });
        assert_eq!(splits.train.subject_count(), 6);
        assert_eq!(splits.test.subject_count(), 2);
        assert_eq!(splits.validation.subject_count(), 2);
        assert_eq!(splits.test.fnc[[0, 0]], 600.0);
        assert_eq!(splits.validation.fnc[[1, 0]], 900.0);
        splits.train.validate().unwrap();
    }

    #[test]
    fn split_clamps_to_available_subjects() {
        let dataset = numbered(5);
        let splits = dataset.split(&SplitSizes::oasis3());
        assert_eq!(splits.train.subject_count(), 5);
        assert_eq!(splits.test.subject_count(), 0);
        assert_eq!(splits.validation.subject_count(), 0);
        assert_eq!(splits.test.correlations.dim(), (0, 3, 3));
    }
}
