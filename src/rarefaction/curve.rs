//! Rarefaction curve computation across a depth schedule.
//!
//! # Algorithm
//!
//! 1. Validate the depth range, step count, iteration count, and metric
//!    requirements against the table.
//! 2. Build the depth schedule: evenly spaced integer depths from
//!    `min_depth` to `max_depth`, deduplicated ascending.
//! 3. For every (depth, iteration) cell, rarefy the table with that cell's
//!    private random substream and evaluate every requested metric on the
//!    rarefied table.
//! 4. Assemble one [`RarefactionMatrix`] per metric, rows = all table
//!    samples, NaN where a sample's total was below the depth.
//!
//! Cells are independent; with `parallel` enabled they are computed with
//! rayon and the result is identical to the serial order because every cell
//! derives its own generator from the configured seed.

use crate::alpha::{alpha_diversity, rarefy, AlphaMetric};
use crate::data::{FeatureTable, Phylogeny};
use crate::error::{DivError, Result};
use crate::rarefaction::matrix::RarefactionMatrix;
use crate::rng::SeededRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Row label used for ungrouped rarefaction matrices.
pub const SAMPLE_ID_LABEL: &str = "sample-id";

/// Configuration for rarefaction curve computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarefactionConfig {
    /// Smallest rarefaction depth (>= 1).
    pub min_depth: u64,
    /// Largest rarefaction depth (<= the largest sample total).
    pub max_depth: u64,
    /// Number of depths in the schedule (>= 2).
    pub steps: usize,
    /// Random redraws per depth (>= 1).
    pub iterations: usize,
    /// Seed for the per-cell random substreams.
    pub seed: u64,
    /// Whether to compute cells with rayon.
    pub parallel: bool,
}

impl RarefactionConfig {
    /// Defaults matching the conventional curve settings: depths from 1 to
    /// `max_depth` over 10 steps, 10 iterations each.
    pub fn new(max_depth: u64) -> Self {
        Self {
            min_depth: 1,
            max_depth,
            steps: 10,
            iterations: 10,
            seed: 42,
            parallel: true,
        }
    }

    /// Load a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DivError::from)
    }

    /// Serialize the configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DivError::from)
    }
}

/// Rarefaction matrices for a set of metrics, sharing one depth schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarefactionCurves {
    /// The depth schedule used for every metric.
    pub depths: Vec<u64>,
    /// Iterations per depth.
    pub iterations: usize,
    matrices: Vec<(AlphaMetric, RarefactionMatrix)>,
}

impl RarefactionCurves {
    /// The matrix for a metric, if it was requested.
    pub fn matrix(&self, metric: AlphaMetric) -> Option<&RarefactionMatrix> {
        self.matrices
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, matrix)| matrix)
    }

    /// Iterate over (metric, matrix) pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (AlphaMetric, &RarefactionMatrix)> {
        self.matrices.iter().map(|(m, matrix)| (*m, matrix))
    }

    /// Number of metrics.
    pub fn n_metrics(&self) -> usize {
        self.matrices.len()
    }
}

/// Build the depth schedule: `steps` evenly spaced points from `min_depth`
/// to `max_depth` inclusive, truncated to integers, deduplicated ascending.
pub fn depth_schedule(min_depth: u64, max_depth: u64, steps: usize) -> Vec<u64> {
    let span = (max_depth - min_depth) as f64;
    let mut depths: Vec<u64> = Vec::with_capacity(steps);
    for i in 0..steps {
        let depth = min_depth as f64 + span * i as f64 / (steps - 1) as f64;
        let depth = depth as u64;
        if depths.last() != Some(&depth) {
            depths.push(depth);
        }
    }
    depths
}

/// Compute rarefaction curves for every requested metric.
///
/// All validation happens before any sampling; per-(sample, depth) missing
/// data is represented as NaN in the matrices, never as an error.
pub fn compute_rarefaction_curves(
    table: &FeatureTable,
    metrics: &[AlphaMetric],
    phylogeny: Option<&Phylogeny>,
    config: &RarefactionConfig,
) -> Result<RarefactionCurves> {
    let metrics = validate(table, metrics, phylogeny, config)?;
    let depths = depth_schedule(config.min_depth, config.max_depth, config.steps);

    let cells: Vec<(usize, usize)> = (0..depths.len())
        .flat_map(|d| (0..config.iterations).map(move |i| (d, i)))
        .collect();

    let compute_cell = |&(depth_idx, iter_idx): &(usize, usize)| -> Result<Vec<Vec<f64>>> {
        let stream = (depth_idx * config.iterations + iter_idx) as u64;
        let mut rng = SeededRng::substream(config.seed, stream);
        let rarefied = rarefy(table, depths[depth_idx], &mut rng)?;

        metrics
            .iter()
            .map(|&metric| {
                let series = alpha_diversity(&rarefied, metric, phylogeny)?;
                let mut aligned = vec![f64::NAN; table.n_samples()];
                for (sample_id, &value) in series.sample_ids.iter().zip(&series.values) {
                    if let Some(pos) = table.sample_position(sample_id) {
                        aligned[pos] = value;
                    }
                }
                Ok(aligned)
            })
            .collect()
    };

    let results: Vec<Vec<Vec<f64>>> = if config.parallel {
        cells.par_iter().map(compute_cell).collect::<Result<_>>()?
    } else {
        cells.iter().map(compute_cell).collect::<Result<_>>()?
    };

    let mut matrices: Vec<(AlphaMetric, RarefactionMatrix)> = metrics
        .iter()
        .map(|&metric| {
            (
                metric,
                RarefactionMatrix::filled_nan(
                    SAMPLE_ID_LABEL,
                    table.sample_ids().to_vec(),
                    depths.clone(),
                    config.iterations,
                ),
            )
        })
        .collect();

    for (&(depth_idx, iter_idx), per_metric) in cells.iter().zip(results) {
        for (metric_idx, aligned) in per_metric.into_iter().enumerate() {
            for (row, value) in aligned.into_iter().enumerate() {
                matrices[metric_idx].1.set(row, depth_idx, iter_idx, value);
            }
        }
    }

    Ok(RarefactionCurves {
        depths,
        iterations: config.iterations,
        matrices,
    })
}

fn validate(
    table: &FeatureTable,
    metrics: &[AlphaMetric],
    phylogeny: Option<&Phylogeny>,
    config: &RarefactionConfig,
) -> Result<Vec<AlphaMetric>> {
    if table.n_samples() == 0 || table.n_features() == 0 {
        return Err(DivError::EmptyData(
            "Feature table has no samples or no features".to_string(),
        ));
    }
    if metrics.is_empty() {
        return Err(DivError::InvalidParameter(
            "metrics was given an empty list".to_string(),
        ));
    }
    if config.min_depth < 1 || config.min_depth >= config.max_depth {
        return Err(DivError::InvalidDepthRange {
            min_depth: config.min_depth,
            max_depth: config.max_depth,
        });
    }
    if config.steps < 2 {
        return Err(DivError::InvalidSteps(config.steps));
    }
    if config.iterations < 1 {
        return Err(DivError::InvalidIterations(config.iterations));
    }
    let max_total = table.max_sample_sum();
    if config.max_depth > max_total {
        return Err(DivError::DepthExceedsTable {
            max_depth: config.max_depth,
            max_total,
        });
    }
    if phylogeny.is_none() {
        if let Some(metric) = metrics.iter().find(|m| m.is_phylogenetic()) {
            return Err(DivError::MissingPhylogeny(metric.name().to_string()));
        }
    }
    if let Some(tree) = phylogeny {
        if metrics.iter().any(|m| m.is_phylogenetic()) {
            tree.check_coverage(table.observed_feature_ids().iter().copied())?;
        }
    }

    // Deduplicate while preserving request order.
    let mut seen = Vec::new();
    for &metric in metrics {
        if !seen.contains(&metric) {
            seen.push(metric);
        }
    }
    Ok(seen)
}
