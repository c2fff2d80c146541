//! Ordination results (e.g. PCoA coordinates) for sample configurations.

use crate::error::{DivError, Result};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A named coordinate set: one row of coordinates per sample, one column per
/// ordination axis. Axes are expected to be ordered by descending explained
/// variance, as produced by PCoA and friends.
#[derive(Debug, Clone)]
pub struct Ordination {
    /// Name of the ordination method (e.g. "PCoA").
    pub method: String,
    /// Sample identifiers, one per coordinate row.
    pub sample_ids: Vec<String>,
    /// Axis labels, one per coordinate column.
    pub axis_labels: Vec<String>,
    /// Coordinates (samples × axes).
    pub coordinates: DMatrix<f64>,
    /// Eigenvalue per axis (may be empty when unknown).
    pub eigenvalues: Vec<f64>,
    /// Proportion of variance explained per axis (may be empty when unknown).
    pub proportion_explained: Vec<f64>,
}

impl Ordination {
    /// Create an ordination, validating that identifiers match the
    /// coordinate shape.
    pub fn new(
        method: impl Into<String>,
        sample_ids: Vec<String>,
        axis_labels: Vec<String>,
        coordinates: DMatrix<f64>,
    ) -> Result<Self> {
        if coordinates.nrows() != sample_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: coordinates.nrows(),
                actual: sample_ids.len(),
            });
        }
        if coordinates.ncols() != axis_labels.len() {
            return Err(DivError::DimensionMismatch {
                expected: coordinates.ncols(),
                actual: axis_labels.len(),
            });
        }
        Ok(Self {
            method: method.into(),
            sample_ids,
            axis_labels,
            coordinates,
            eigenvalues: Vec::new(),
            proportion_explained: Vec::new(),
        })
    }

    /// Attach per-axis eigenvalues and proportions of explained variance.
    pub fn with_axis_stats(
        mut self,
        eigenvalues: Vec<f64>,
        proportion_explained: Vec<f64>,
    ) -> Self {
        self.eigenvalues = eigenvalues;
        self.proportion_explained = proportion_explained;
        self
    }

    /// Number of samples (coordinate rows).
    pub fn n_samples(&self) -> usize {
        self.coordinates.nrows()
    }

    /// Number of axes (coordinate columns).
    pub fn n_axes(&self) -> usize {
        self.coordinates.ncols()
    }

    /// Position of a sample ID, if present.
    pub fn sample_position(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Reorder coordinate rows to match the given sample order.
    ///
    /// Fails with [`DivError::SampleSetMismatch`] if the ID sets differ.
    pub fn reordered_to(&self, sample_ids: &[String]) -> Result<Self> {
        if sample_ids.len() != self.sample_ids.len() {
            return Err(DivError::SampleSetMismatch);
        }
        let positions: Vec<usize> = sample_ids
            .iter()
            .map(|id| self.sample_position(id).ok_or(DivError::SampleSetMismatch))
            .collect::<Result<_>>()?;

        let mut coords = DMatrix::zeros(self.n_samples(), self.n_axes());
        for (new_row, &old_row) in positions.iter().enumerate() {
            coords.set_row(new_row, &self.coordinates.row(old_row));
        }

        Ok(Self {
            method: self.method.clone(),
            sample_ids: sample_ids.to_vec(),
            axis_labels: self.axis_labels.clone(),
            coordinates: coords,
            eigenvalues: self.eigenvalues.clone(),
            proportion_explained: self.proportion_explained.clone(),
        })
    }

    /// Load an ordination from a TSV coordinate file.
    ///
    /// Expected format:
    /// - First row: header with axis labels (first column is the sample ID header)
    /// - Subsequent rows: sample ID followed by coordinates
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty ordination file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DivError::EmptyData(
                "Ordination must have at least one axis".to_string(),
            ));
        }
        let axis_labels: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_axes = axis_labels.len();

        let mut sample_ids = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for (row_idx, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != n_axes + 1 {
                return Err(DivError::DimensionMismatch {
                    expected: n_axes + 1,
                    actual: fields.len(),
                });
            }
            sample_ids.push(fields[0].to_string());
            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let value: f64 = value_str.trim().parse().map_err(|_| DivError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                values.push(value);
            }
        }

        if sample_ids.is_empty() {
            return Err(DivError::EmptyData("No samples in ordination".to_string()));
        }

        let coordinates = DMatrix::from_row_slice(sample_ids.len(), n_axes, &values);
        Ordination::new("ordination", sample_ids, axis_labels, coordinates)
    }

    /// Write the coordinates to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample-id")?;
        for label in &self.axis_labels {
            write!(writer, "\t{}", label)?;
        }
        writeln!(writer)?;

        for (row, sample_id) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sample_id)?;
            for col in 0..self.n_axes() {
                write!(writer, "\t{}", self.coordinates[(row, col)])?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_ordination() -> Ordination {
        let coords = DMatrix::from_row_slice(3, 2, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        Ordination::new(
            "PCoA",
            vec!["A".into(), "B".into(), "C".into()],
            vec!["PC1".into(), "PC2".into()],
            coords,
        )
        .unwrap()
        .with_axis_stats(vec![1.5, 0.5], vec![0.75, 0.25])
    }

    #[test]
    fn test_shape_validation() {
        let coords = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 0.0]);
        assert!(Ordination::new(
            "PCoA",
            vec!["A".into()],
            vec!["PC1".into(), "PC2".into()],
            coords
        )
        .is_err());
    }

    #[test]
    fn test_reordered_to() {
        let ord = create_test_ordination();
        let reordered = ord
            .reordered_to(&["C".to_string(), "A".to_string(), "B".to_string()])
            .unwrap();
        assert_eq!(reordered.sample_ids, vec!["C", "A", "B"]);
        assert_eq!(reordered.coordinates[(0, 0)], 0.5);
        assert_eq!(reordered.coordinates[(1, 0)], 0.1);
        assert_eq!(reordered.coordinates[(2, 1)], 0.4);
    }

    #[test]
    fn test_reordered_to_different_set_fails() {
        let ord = create_test_ordination();
        let result = ord.reordered_to(&["A".to_string(), "B".to_string(), "Z".to_string()]);
        assert!(matches!(result, Err(DivError::SampleSetMismatch)));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let ord = create_test_ordination();
        let temp_file = NamedTempFile::new().unwrap();
        ord.to_tsv(temp_file.path()).unwrap();

        let loaded = Ordination::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.sample_ids, ord.sample_ids);
        assert_eq!(loaded.axis_labels, ord.axis_labels);
        for row in 0..3 {
            for col in 0..2 {
                assert!(
                    (loaded.coordinates[(row, col)] - ord.coordinates[(row, col)]).abs() < 1e-12
                );
            }
        }
    }
}
