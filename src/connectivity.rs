//! Functional connectivity: per-subject Pearson correlation between component
//! time courses, and the flattened strict upper triangle used as features.

use indicatif::ProgressBar;
use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

/// Pearson correlation between the rows of `series`.
///
/// Rows are variables (components) and columns are observations (timepoints),
/// the same convention as `numpy.corrcoef`. A `(k, t)` input yields a `(k, k)`
/// matrix. Values are clipped to `[-1, 1]`. Rows with zero variance are not
/// special-cased and produce NaN through `0 / 0`.
pub fn pearson_matrix(series: ArrayView2<f64>) -> Array2<f64> {
    let n_vars = series.nrows();
    let Some(means) = series.mean_axis(Axis(1)) else {
        // No observations: nothing to correlate.
        return Array2::from_elem((n_vars, n_vars), f64::NAN);
    };
    let centered = &series - &means.insert_axis(Axis(1));

    // The 1/(n-1) normalisation cancels between covariance and std devs.
    let mut corr = centered.dot(&centered.t());
    let std_devs = corr.diag().mapv(f64::sqrt);

    for ((i, j), value) in corr.indexed_iter_mut() {
        *value = (*value / std_devs[i] / std_devs[j]).clamp(-1.0, 1.0);
    }
    corr
}

/// Number of strictly-above-diagonal entries in an `n x n` matrix.
pub fn upper_triangle_len(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Strict upper triangle of a square matrix in row-major order:
/// `(0,1), (0,2), .., (0,n-1), (1,2), ..`.
pub fn upper_triangle(matrix: ArrayView2<f64>) -> Array1<f64> {
    let n = matrix.nrows();
    let mut flat = Vec::with_capacity(upper_triangle_len(n));
    for i in 0..n {
        for j in (i + 1)..n {
            flat.push(matrix[[i, j]]);
        }
    }
    Array1::from_vec(flat)
}

/// Correlation matrices `(subjects, k, k)` and flattened features
/// `(subjects, k(k-1)/2)` for a `(subjects, k, timepoints)` tensor.
///
/// Subjects are processed in parallel; output row `s` always belongs to
/// input subject `s`.
pub fn subject_connectivity(
    time_series: ArrayView3<f64>,
    progress: &ProgressBar,
) -> (Array3<f64>, Array2<f64>) {
    let (num_subjects, num_components, num_timepoints) = time_series.dim();
    let num_features = upper_triangle_len(num_components);
    debug!(
        "Computing connectivity for {} subjects ({} components x {} timepoints).",
        num_subjects, num_components, num_timepoints
    );

    let per_subject: Vec<(Array2<f64>, Array1<f64>)> = (0..num_subjects)
        .into_par_iter()
        .map(|subject_idx| {
            let corr = pearson_matrix(time_series.index_axis(Axis(0), subject_idx));
            let flat = upper_triangle(corr.view());
            progress.inc(1);
            (corr, flat)
        })
        .collect();

    let mut correlations = Array3::<f64>::zeros((num_subjects, num_components, num_components));
    let mut fnc = Array2::<f64>::zeros((num_subjects, num_features));
    for (subject_idx, (corr, flat)) in per_subject.into_iter().enumerate() {
        correlations
            .index_axis_mut(Axis(0), subject_idx)
            .assign(&corr);
        fnc.row_mut(subject_idx).assign(&flat);
    }
    (correlations, fnc)
}
