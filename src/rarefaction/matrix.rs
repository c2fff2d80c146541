//! The per-metric rarefaction value matrix.

use serde::{Deserialize, Serialize};

/// Values of one alpha metric indexed by row (sample or group) and by
/// (depth, iteration) column pairs.
///
/// Columns are depth-major: for row `r`, the values of depth index `d`
/// occupy the contiguous iteration slots `d * iterations ..
/// (d + 1) * iterations`. A NaN entry means the row was excluded at that
/// depth (its total count was below the rarefaction depth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarefactionMatrix {
    /// What the rows represent: `"sample-id"` or a grouping column name.
    row_label: String,
    /// Row identifiers (sample IDs or group labels).
    row_ids: Vec<String>,
    /// Depth schedule, ascending.
    depths: Vec<u64>,
    /// Iterations per depth.
    iterations: usize,
    /// Row-major values, `row_ids.len() × depths.len() * iterations`.
    values: Vec<f64>,
}

impl RarefactionMatrix {
    /// Create a matrix filled with NaN.
    pub fn filled_nan(
        row_label: impl Into<String>,
        row_ids: Vec<String>,
        depths: Vec<u64>,
        iterations: usize,
    ) -> Self {
        let n_cols = depths.len() * iterations;
        let n_rows = row_ids.len();
        Self {
            row_label: row_label.into(),
            row_ids,
            depths,
            iterations,
            values: vec![f64::NAN; n_rows * n_cols],
        }
    }

    /// What the rows represent.
    pub fn row_label(&self) -> &str {
        &self.row_label
    }

    /// Row identifiers.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Depth schedule.
    pub fn depths(&self) -> &[u64] {
        &self.depths
    }

    /// Iterations per depth.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Number of (depth, iteration) columns.
    pub fn n_cols(&self) -> usize {
        self.depths.len() * self.iterations
    }

    #[inline]
    fn offset(&self, row: usize, depth_idx: usize, iteration: usize) -> usize {
        row * self.n_cols() + depth_idx * self.iterations + iteration
    }

    /// Value at (row, depth index, iteration index).
    pub fn get(&self, row: usize, depth_idx: usize, iteration: usize) -> f64 {
        self.values[self.offset(row, depth_idx, iteration)]
    }

    /// Set the value at (row, depth index, iteration index).
    pub fn set(&mut self, row: usize, depth_idx: usize, iteration: usize, value: f64) {
        let offset = self.offset(row, depth_idx, iteration);
        self.values[offset] = value;
    }

    /// All iteration values of a row at one depth.
    pub fn depth_values(&self, row: usize, depth_idx: usize) -> &[f64] {
        let start = self.offset(row, depth_idx, 0);
        &self.values[start..start + self.iterations]
    }

    /// Full (depth, iteration) row as a slice.
    pub fn row_values(&self, row: usize) -> &[f64] {
        let start = row * self.n_cols();
        &self.values[start..start + self.n_cols()]
    }

    /// Position of a depth in the schedule.
    pub fn depth_position(&self, depth: u64) -> Option<usize> {
        self.depths.iter().position(|&d| d == depth)
    }

    /// Position of a row ID.
    pub fn row_position(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|r| r == row_id)
    }

    /// Rebuild a matrix from explicit rows; used by regrouping.
    pub(crate) fn from_rows(
        row_label: impl Into<String>,
        rows: Vec<(String, Vec<f64>)>,
        depths: Vec<u64>,
        iterations: usize,
    ) -> Self {
        let n_cols = depths.len() * iterations;
        let mut row_ids = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for (id, row) in rows {
            debug_assert_eq!(row.len(), n_cols);
            row_ids.push(id);
            values.extend(row);
        }
        Self {
            row_label: row_label.into(),
            row_ids,
            depths,
            iterations,
            values,
        }
    }
}
