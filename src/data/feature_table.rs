//! Sparse feature table for community abundance data.

use crate::error::{DivError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse table of feature abundances across samples.
///
/// Rows represent features (taxa/ASVs/genes), columns represent samples.
/// Uses CSR (Compressed Sparse Row) format; entries are non-negative counts
/// and a sample's column total is its sequencing depth.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Sparse matrix in CSR format (features × samples)
    data: CsMat<u64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl FeatureTable {
    /// Create a new FeatureTable from a sparse matrix and identifiers.
    pub fn new(data: CsMat<u64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a table from dense per-sample count columns.
    ///
    /// `columns[j][i]` is the count of feature `i` in sample `j`.
    pub fn from_columns(
        columns: &[Vec<u64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_features = feature_ids.len();
        let mut tri_mat = TriMat::new((n_features, columns.len()));
        for (col, counts) in columns.iter().enumerate() {
            if counts.len() != n_features {
                return Err(DivError::DimensionMismatch {
                    expected: n_features,
                    actual: counts.len(),
                });
            }
            for (row, &val) in counts.iter().enumerate() {
                if val > 0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Load a feature table from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the feature ID header)
    /// - Subsequent rows: feature ID followed by counts
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DivError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for (row_idx, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            feature_ids.push(fields[0].to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                if col_idx >= n_samples {
                    break;
                }
                let value: u64 = value_str.trim().parse().map_err(|_| DivError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(DivError::EmptyData("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Write the feature table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature-id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for col_idx in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row_idx, col_idx))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Position of a sample ID, if present.
    pub fn sample_position(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Get a dense count vector for a specific sample (column).
    pub fn sample_counts(&self, col: usize) -> Vec<u64> {
        (0..self.n_features()).map(|row| self.get(row, col)).collect()
    }

    /// Total count (sequencing depth) per sample.
    pub fn sample_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Total count per feature.
    pub fn feature_sums(&self) -> Vec<u64> {
        (0..self.n_features())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Largest per-sample total, or 0 for a table with no samples.
    pub fn max_sample_sum(&self) -> u64 {
        self.sample_sums().into_iter().max().unwrap_or(0)
    }

    /// Feature IDs that have nonzero abundance in at least one sample.
    pub fn observed_feature_ids(&self) -> Vec<&str> {
        self.feature_sums()
            .iter()
            .zip(self.feature_ids.iter())
            .filter(|(&sum, _)| sum > 0)
            .map(|(_, id)| id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_table() -> FeatureTable {
        // 3 features × 4 samples
        let mut tri_mat = TriMat::new((3, 4));
        tri_mat.add_triplet(0, 0, 10);
        tri_mat.add_triplet(0, 1, 20);
        tri_mat.add_triplet(0, 3, 5);
        tri_mat.add_triplet(1, 0, 100);
        tri_mat.add_triplet(1, 1, 200);
        tri_mat.add_triplet(1, 2, 150);
        tri_mat.add_triplet(1, 3, 175);
        tri_mat.add_triplet(2, 0, 1);
        // feature 2 only present in sample 0

        let feature_ids = vec!["O1".to_string(), "O2".to_string(), "O3".to_string()];
        let sample_ids = vec![
            "S1".to_string(),
            "S2".to_string(),
            "S3".to_string(),
            "S4".to_string(),
        ];

        FeatureTable::new(tri_mat.to_csr(), feature_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_features(), 3);
        assert_eq!(table.n_samples(), 4);
    }

    #[test]
    fn test_get_values() {
        let table = create_test_table();
        assert_eq!(table.get(0, 0), 10);
        assert_eq!(table.get(0, 2), 0);
        assert_eq!(table.get(2, 0), 1);
        assert_eq!(table.get(2, 1), 0);
    }

    #[test]
    fn test_sample_counts() {
        let table = create_test_table();
        assert_eq!(table.sample_counts(0), vec![10, 100, 1]);
        assert_eq!(table.sample_counts(2), vec![0, 150, 0]);
    }

    #[test]
    fn test_sample_sums() {
        let table = create_test_table();
        assert_eq!(table.sample_sums(), vec![111, 220, 150, 180]);
        assert_eq!(table.max_sample_sum(), 220);
    }

    #[test]
    fn test_feature_sums() {
        let table = create_test_table();
        assert_eq!(table.feature_sums(), vec![35, 625, 1]);
    }

    #[test]
    fn test_from_columns_matches_triplets() {
        let table = create_test_table();
        let columns: Vec<Vec<u64>> = (0..table.n_samples())
            .map(|col| table.sample_counts(col))
            .collect();
        let rebuilt = FeatureTable::from_columns(
            &columns,
            table.feature_ids().to_vec(),
            table.sample_ids().to_vec(),
        )
        .unwrap();
        for row in 0..table.n_features() {
            for col in 0..table.n_samples() {
                assert_eq!(rebuilt.get(row, col), table.get(row, col));
            }
        }
    }

    #[test]
    fn test_tsv_roundtrip() {
        let table = create_test_table();

        let temp_file = NamedTempFile::new().unwrap();
        table.to_tsv(temp_file.path()).unwrap();

        let loaded = FeatureTable::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.feature_ids(), table.feature_ids());
        assert_eq!(loaded.sample_ids(), table.sample_ids());
        for row in 0..table.n_features() {
            for col in 0..table.n_samples() {
                assert_eq!(loaded.get(row, col), table.get(row, col));
            }
        }
    }

    #[test]
    fn test_observed_feature_ids() {
        let mut tri_mat = TriMat::new((3, 2));
        tri_mat.add_triplet(0, 0, 4);
        tri_mat.add_triplet(2, 1, 1);
        let table = FeatureTable::new(
            tri_mat.to_csr(),
            vec!["A".into(), "B".into(), "C".into()],
            vec!["S1".into(), "S2".into()],
        )
        .unwrap();
        assert_eq!(table.observed_feature_ids(), vec!["A", "C"]);
    }

    #[test]
    fn test_mismatched_ids_rejected() {
        let tri_mat: TriMat<u64> = TriMat::new((2, 2));
        let result = FeatureTable::new(
            tri_mat.to_csr(),
            vec!["A".into()],
            vec!["S1".into(), "S2".into()],
        );
        assert!(result.is_err());
    }
}
