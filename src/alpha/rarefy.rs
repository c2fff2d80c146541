//! Random subsampling of a feature table to a fixed depth.

use crate::data::FeatureTable;
use crate::error::{DivError, Result};
use crate::rng::SeededRng;

/// Subsample every sample of a table down to exactly `depth` observations.
///
/// Sampling is uniform WITHOUT replacement over the sample's individual
/// observations (multivariate hypergeometric): the sample's counts are
/// flattened into an observation multiset and `depth` observations are
/// selected by a partial Fisher-Yates pass. Samples whose total is below
/// `depth` are dropped from the output, they do not appear as zero columns.
///
/// Deterministic given the generator; each call consumes the generator
/// serially, so callers wanting independent redraws must supply a fresh
/// substream per (depth, iteration).
pub fn rarefy(table: &FeatureTable, depth: u64, rng: &mut SeededRng) -> Result<FeatureTable> {
    if table.n_samples() == 0 || table.n_features() == 0 {
        return Err(DivError::EmptyData(
            "Cannot rarefy an empty table".to_string(),
        ));
    }
    if depth == 0 {
        return Err(DivError::InvalidParameter(
            "Rarefaction depth must be at least 1".to_string(),
        ));
    }

    let totals = table.sample_sums();
    let mut kept_ids: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<u64>> = Vec::new();

    for (col, &total) in totals.iter().enumerate() {
        if total < depth {
            continue;
        }
        let counts = table.sample_counts(col);
        columns.push(subsample_counts(&counts, total, depth, rng));
        kept_ids.push(table.sample_ids()[col].clone());
    }

    FeatureTable::from_columns(&columns, table.feature_ids().to_vec(), kept_ids)
}

/// Draw `depth` observations without replacement from a count vector whose
/// total is `total` (>= depth). Returns the subsampled count vector.
fn subsample_counts(counts: &[u64], total: u64, depth: u64, rng: &mut SeededRng) -> Vec<u64> {
    // Flatten to one entry per observation: the feature index, repeated by
    // its count. Exact per-observation weighting is what keeps the draw
    // hypergeometric rather than per-feature binomial.
    let mut observations: Vec<u32> = Vec::with_capacity(total as usize);
    for (feature, &c) in counts.iter().enumerate() {
        for _ in 0..c {
            observations.push(feature as u32);
        }
    }

    rng.partial_shuffle(&mut observations, depth as usize);

    let mut subsampled = vec![0u64; counts.len()];
    for &feature in &observations[..depth as usize] {
        subsampled[feature as usize] += 1;
    }
    subsampled
}
