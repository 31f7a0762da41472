// Headerless single-column integer files (index lists and labels).

use std::path::Path;

use log::debug;

use crate::error::PrepError;

pub fn read_index_column(path: &Path) -> Result<Vec<i64>, PrepError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| PrepError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut values = Vec::new();
    for (row_idx, record_result) in reader.records().enumerate() {
        let record = record_result.map_err(|source| PrepError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record
            .position()
            .map_or(row_idx as u64 + 1, |pos| pos.line()) as usize;

        if record.len() != 1 {
            return Err(PrepError::Parse {
                path: path.to_path_buf(),
                line,
                message: format!("expected a single column, found {} fields", record.len()),
            });
        }
        let field = &record[0];
        let value = parse_integer(field).ok_or_else(|| PrepError::Parse {
            path: path.to_path_buf(),
            line,
            message: format!("'{}' is not an integer", field),
        })?;
        values.push(value);
    }

    debug!("Read {} values from {}", values.len(), path.display());
    Ok(values)
}

/// Accepts `7` as well as `7.0`, which is how pandas writes an integer column
/// that once held a float.
fn parse_integer(field: &str) -> Option<i64> {
    if let Ok(value) = field.parse::<i64>() {
        return Some(value);
    }
    let float = field.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

/// Like `read_index_column`, but the file must hold exactly `expected` rows.
pub fn read_index_column_exact(path: &Path, expected: usize) -> Result<Vec<i64>, PrepError> {
    let values = read_index_column(path)?;
    if values.len() != expected {
        return Err(PrepError::RowCount {
            path: path.to_path_buf(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}
