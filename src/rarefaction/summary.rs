//! Per-depth distributional summaries of rarefaction matrices.

use crate::error::{DivError, Result};
use crate::rarefaction::matrix::RarefactionMatrix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Quantile levels of the seven-number summary, in percent.
pub const SUMMARY_PERCENTILES: [f64; 7] = [2.0, 9.0, 25.0, 50.0, 75.0, 91.0, 98.0];

/// Distribution of one row's metric values across iterations at one depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Row identifier (sample ID or group label).
    pub label: String,
    /// Rarefaction depth.
    pub depth: u64,
    /// Number of non-missing iterations.
    pub count: usize,
    /// Smallest non-missing value, NaN when count is 0.
    pub min: f64,
    /// Largest non-missing value, NaN when count is 0.
    pub max: f64,
    /// 2nd percentile.
    pub q02: f64,
    /// 9th percentile.
    pub q09: f64,
    /// 25th percentile.
    pub q25: f64,
    /// Median.
    pub q50: f64,
    /// 75th percentile.
    pub q75: f64,
    /// 91st percentile.
    pub q91: f64,
    /// 98th percentile.
    pub q98: f64,
}

/// Flat summary table: one record per (row, depth) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTable {
    /// Name of the identifying column (`"sample-id"` or a grouping column).
    pub index_label: String,
    /// Records in row-major order: matrix row order, then depth ascending.
    pub records: Vec<SummaryRecord>,
}

impl SummaryTable {
    /// Render the table as TSV text.
    pub fn to_tsv_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\tdepth\tcount\tmin\t2%\t9%\t25%\t50%\t75%\t91%\t98%\tmax\n",
            self.index_label
        ));
        for r in &self.records {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                r.label,
                r.depth,
                r.count,
                r.min,
                r.q02,
                r.q09,
                r.q25,
                r.q50,
                r.q75,
                r.q91,
                r.q98,
                r.max
            ));
        }
        out
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.to_tsv_string().as_bytes())?;
        Ok(())
    }

    /// Serialize the table as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(DivError::from)
    }
}

/// Summarize a rarefaction matrix at the given depths.
///
/// For every (row, depth): the count of non-missing iteration values, their
/// min and max, and linearly interpolated percentiles at
/// {2, 9, 25, 50, 75, 91, 98}. A (row, depth) with zero non-missing
/// iterations yields NaN statistics with count 0; it is never an error.
pub fn summarize(matrix: &RarefactionMatrix, depths: &[u64]) -> SummaryTable {
    let mut records = Vec::with_capacity(matrix.n_rows() * depths.len());

    for (row, label) in matrix.row_ids().iter().enumerate() {
        for &depth in depths {
            let Some(depth_idx) = matrix.depth_position(depth) else {
                continue;
            };
            let mut values: Vec<f64> = matrix
                .depth_values(row, depth_idx)
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            values.sort_by(|a, b| a.total_cmp(b));

            records.push(seven_number_summary(label, depth, &values));
        }
    }

    SummaryTable {
        index_label: matrix.row_label().to_string(),
        records,
    }
}

/// Build the summary record for one sorted, NaN-free value set.
fn seven_number_summary(label: &str, depth: u64, sorted: &[f64]) -> SummaryRecord {
    let count = sorted.len();
    let q = |p: f64| quantile_linear(sorted, p / 100.0);
    SummaryRecord {
        label: label.to_string(),
        depth,
        count,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        max: sorted.last().copied().unwrap_or(f64::NAN),
        q02: q(SUMMARY_PERCENTILES[0]),
        q09: q(SUMMARY_PERCENTILES[1]),
        q25: q(SUMMARY_PERCENTILES[2]),
        q50: q(SUMMARY_PERCENTILES[3]),
        q75: q(SUMMARY_PERCENTILES[4]),
        q91: q(SUMMARY_PERCENTILES[5]),
        q98: q(SUMMARY_PERCENTILES[6]),
    }
}

/// Quantile with linear interpolation between order statistics. The input
/// must be sorted ascending and NaN-free; an empty input yields NaN.
fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
