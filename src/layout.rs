//! Fixed on-disk layout of the OASIS-3 ICA time-course release.
//!
//! Every count and file name the loader depends on lives here, so a run
//! against a different cohort only has to override a `DatasetLayout`.

use std::path::{Path, PathBuf};

use crate::connectivity::upper_triangle_len;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    pub array_file: String,
    /// Dataset name inside the HDF5 file (or entry name in an `.npz` archive).
    pub dataset_key: String,
    /// One-based component indices, one per row.
    pub component_index_file: String,
    /// Zero-based subject indices, one per row, applied as the final gather.
    pub subject_index_file: String,
    /// Integer class per subject, in original subject order.
    pub labels_file: String,
    pub subjects: usize,
    pub raw_components: usize,
    pub timepoints: usize,
    pub selected_components: usize,
}

impl DatasetLayout {
    pub fn oasis3() -> Self {
        Self {
            array_file: "OASIS3_AllData.h5".to_string(),
            dataset_key: "OASIS3_dataset".to_string(),
            component_index_file: "correct_indices_GSP.csv".to_string(),
            subject_index_file: "index_array_labelled_OASIS3.csv".to_string(),
            labels_file: "labels_OASIS3.csv".to_string(),
            subjects: 372,
            raw_components: 100,
            timepoints: 120,
            selected_components: 53,
        }
    }

    /// Number of strict-upper-triangle entries per subject.
    pub fn feature_count(&self) -> usize {
        upper_triangle_len(self.selected_components)
    }

    pub fn raw_element_count(&self) -> usize {
        self.subjects * self.raw_components * self.timepoints
    }

    pub fn array_path(&self, root: &Path) -> PathBuf {
        root.join(&self.array_file)
    }

    pub fn component_index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.component_index_file)
    }

    pub fn subject_index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.subject_index_file)
    }

    pub fn labels_path(&self, root: &Path) -> PathBuf {
        root.join(&self.labels_file)
    }
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::oasis3()
    }
}

/// Contiguous train/test/validation partition sizes over the reordered cohort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub test: usize,
    pub validation: usize,
}

impl SplitSizes {
    pub fn oasis3() -> Self {
        Self {
            train: 244,
            test: 64,
            validation: 64,
        }
    }

    /// Keeps the OASIS-3 test and validation fractions (64/372 each) for a
    /// cohort of `subjects`; train takes the remainder.
    pub fn scaled_to(subjects: usize) -> Self {
        let reference = Self::oasis3();
        let reference_total = reference.total();
        let held_out = |size: usize| (subjects * size + reference_total / 2) / reference_total;
        let test = held_out(reference.test);
        let validation = held_out(reference.validation).min(subjects - test);
        Self {
            train: subjects - test - validation,
            test,
            validation,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.test + self.validation
    }
}

impl Default for SplitSizes {
    fn default() -> Self {
        Self::oasis3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oasis3_constants() {
        let layout = DatasetLayout::default();
        assert_eq!(layout.feature_count(), 1378);
        assert_eq!(layout.raw_element_count(), 372 * 100 * 120);
        assert_eq!(SplitSizes::default().total(), layout.subjects);
    }

    #[test]
    fn scaled_split_matches_cohort_size() {
        assert_eq!(SplitSizes::scaled_to(372), SplitSizes::oasis3());
        let small = SplitSizes::scaled_to(100);
        assert_eq!(small.total(), 100);
        assert_eq!((small.train, small.test, small.validation), (66, 17, 17));
        assert_eq!(SplitSizes::scaled_to(0).total(), 0);
        assert_eq!(SplitSizes::scaled_to(1).total(), 1);
    }

    #[test]
    fn paths_are_joined_onto_root() {
        let layout = DatasetLayout::oasis3();
        let root = Path::new("/data/OASIS");
        assert_eq!(
            layout.labels_path(root),
            PathBuf::from("/data/OASIS/labels_OASIS3.csv")
        );
        assert_eq!(
            layout.array_path(root),
            PathBuf::from("/data/OASIS/OASIS3_AllData.h5")
        );
    }
}
