//! Integration tests for the rarefaction curve pipeline.

use ecodive::prelude::*;
use sprs::TriMat;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a synthetic community with uneven sequencing depths.
///
/// - Samples S01-S10: deep (around 1000 reads), 12 features
/// - Samples S11-S14: shallow (around 120 reads), fewer features
/// - Feature richness declines with feature index (a few dominants plus a
///   tail of rare features), so rarefaction curves rise with depth.
fn create_synthetic_table() -> FeatureTable {
    let n_features = 12;
    let n_samples = 14;
    let mut tri_mat = TriMat::new((n_features, n_samples));

    let mut rng_seed = 42u64;
    let mut simple_rand = || -> f64 {
        rng_seed = rng_seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((rng_seed >> 16) & 0x7FFF) as f64 / 32768.0
    };

    for sample in 0..n_samples {
        let deep = sample < 10;
        for feat in 0..n_features {
            // geometric-ish abundance decay across features
            let base = if deep { 400.0 } else { 50.0 };
            let expected = base / (1.5f64).powi(feat as i32);
            let noise = 0.5 + simple_rand();
            let count = (expected * noise).round() as u64;
            if count > 0 {
                tri_mat.add_triplet(feat, sample, count);
            }
        }
    }

    let feature_ids = (0..n_features).map(|i| format!("O{:02}", i + 1)).collect();
    let sample_ids = (0..n_samples).map(|j| format!("S{:02}", j + 1)).collect();
    FeatureTable::new(tri_mat.to_csr(), feature_ids, sample_ids).unwrap()
}

fn grouping_by_depth_class() -> Grouping {
    Grouping::from_pairs(
        "depth-class",
        (1..=14).map(|j| {
            (
                format!("S{:02}", j),
                if j <= 10 { "deep".to_string() } else { "shallow".to_string() },
            )
        }),
    )
}

#[test]
fn test_curves_respect_depth_exclusions() {
    let table = create_synthetic_table();
    let totals = table.sample_sums();
    let max_total = table.max_sample_sum();

    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: max_total,
        steps: 6,
        iterations: 4,
        seed: 1,
        parallel: true,
    };
    let metrics = [AlphaMetric::ObservedFeatures, AlphaMetric::ShannonEntropy];
    let curves = compute_rarefaction_curves(&table, &metrics, None, &config).unwrap();

    for (_, matrix) in curves.iter() {
        for (row, &total) in totals.iter().enumerate() {
            for (depth_idx, &depth) in curves.depths.iter().enumerate() {
                for it in 0..curves.iterations {
                    let value = matrix.get(row, depth_idx, it);
                    if total >= depth {
                        assert!(
                            !value.is_nan(),
                            "sample {} (total {}) should have a value at depth {}",
                            row,
                            total,
                            depth
                        );
                    } else {
                        assert!(value.is_nan());
                    }
                }
            }
        }
    }
}

#[test]
fn test_observed_features_increase_with_depth() {
    let table = create_synthetic_table();
    // Cap the schedule at the shallowest sample so no (sample, depth) cell
    // is excluded and every median is defined.
    let min_total = table.sample_sums().into_iter().min().unwrap();
    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: min_total,
        steps: 5,
        iterations: 5,
        seed: 3,
        parallel: true,
    };
    let curves =
        compute_rarefaction_curves(&table, &[AlphaMetric::ObservedFeatures], None, &config)
            .unwrap();
    let matrix = curves.matrix(AlphaMetric::ObservedFeatures).unwrap();
    let summary = summarize(matrix, &curves.depths);

    // For each sample, the median observed richness at the deepest depth
    // must be at least the value at depth 1 (which is always exactly 1).
    for sample in matrix.row_ids() {
        let medians: Vec<f64> = summary
            .records
            .iter()
            .filter(|r| &r.label == sample)
            .map(|r| r.q50)
            .collect();
        assert_eq!(medians.len(), curves.depths.len());
        assert_eq!(medians[0], 1.0);
        assert!(medians[medians.len() - 1] >= medians[0]);
    }
}

#[test]
fn test_summary_counts_match_exclusions() {
    let table = create_synthetic_table();
    let totals = table.sample_sums();
    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: table.max_sample_sum(),
        steps: 4,
        iterations: 3,
        seed: 9,
        parallel: false,
    };
    let curves =
        compute_rarefaction_curves(&table, &[AlphaMetric::ShannonEntropy], None, &config).unwrap();
    let matrix = curves.matrix(AlphaMetric::ShannonEntropy).unwrap();
    let summary = summarize(matrix, &curves.depths);

    for record in &summary.records {
        let row = matrix.row_position(&record.label).unwrap();
        let expected = if totals[row] >= record.depth { 3 } else { 0 };
        assert_eq!(record.count, expected, "{} at {}", record.label, record.depth);
        if expected == 0 {
            assert!(record.q50.is_nan());
            assert!(record.min.is_nan());
            assert!(record.max.is_nan());
        }
    }
}

#[test]
fn test_grouped_summary_equals_manual_row_sums() {
    let table = create_synthetic_table();
    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: 100,
        steps: 3,
        iterations: 2,
        seed: 5,
        parallel: false,
    };
    let curves =
        compute_rarefaction_curves(&table, &[AlphaMetric::ObservedFeatures], None, &config)
            .unwrap();
    let matrix = curves.matrix(AlphaMetric::ObservedFeatures).unwrap();

    let grouping = grouping_by_depth_class();
    let regrouped = reindex_by_group(&grouping, matrix);

    assert_eq!(regrouped.row_ids(), &["deep", "shallow"]);
    assert_eq!(regrouped.depths(), matrix.depths());

    // Regrouping sums raw rows; verify one cell against a manual sum.
    for (depth_idx, _) in curves.depths.iter().enumerate() {
        for it in 0..curves.iterations {
            let manual: f64 = (0..10).map(|row| matrix.get(row, depth_idx, it)).sum();
            let grouped = regrouped.get(0, depth_idx, it);
            assert!((manual - grouped).abs() < 1e-12 || (manual.is_nan() && grouped.is_nan()));
        }
    }

    let summary = summarize(&regrouped, &curves.depths);
    assert_eq!(summary.index_label, "depth-class");
    assert_eq!(summary.records.len(), 2 * curves.depths.len());
}

#[test]
fn test_reproducible_across_runs() {
    let table = create_synthetic_table();
    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: 400,
        steps: 4,
        iterations: 3,
        seed: 123,
        parallel: true,
    };
    let metrics = [AlphaMetric::ShannonEntropy];
    let a = compute_rarefaction_curves(&table, &metrics, None, &config).unwrap();
    let b = compute_rarefaction_curves(&table, &metrics, None, &config).unwrap();

    let matrix_a = a.matrix(AlphaMetric::ShannonEntropy).unwrap();
    let matrix_b = b.matrix(AlphaMetric::ShannonEntropy).unwrap();
    for row in 0..matrix_a.n_rows() {
        for depth_idx in 0..a.depths.len() {
            for it in 0..a.iterations {
                let x = matrix_a.get(row, depth_idx, it);
                let y = matrix_b.get(row, depth_idx, it);
                assert!(x == y || (x.is_nan() && y.is_nan()));
            }
        }
    }
}

#[test]
fn test_phylogenetic_curves_end_to_end() {
    // Three features on a small tree; every sample deep enough for all depths.
    let columns = vec![vec![40, 30, 30], vec![80, 10, 10], vec![0, 50, 50]];
    let table = FeatureTable::from_columns(
        &columns,
        vec!["O1".into(), "O2".into(), "O3".into()],
        vec!["S1".into(), "S2".into(), "S3".into()],
    )
    .unwrap();
    let tree = Phylogeny::from_newick("((O1:0.25,O2:0.50):0.25,O3:0.75)root;").unwrap();

    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: 100,
        steps: 2,
        iterations: 2,
        seed: 8,
        parallel: false,
    };
    let curves = compute_rarefaction_curves(
        &table,
        &default_metrics(true),
        Some(&tree),
        &config,
    )
    .unwrap();

    let matrix = curves.matrix(AlphaMetric::FaithPd).unwrap();
    // At full depth every sample keeps its full feature set, so Faith's PD
    // is the spanning branch length of its observed tips.
    for it in 0..2 {
        assert!((matrix.get(0, 1, it) - 1.75).abs() < 1e-12); // O1,O2,O3
        assert!((matrix.get(1, 1, it) - 1.75).abs() < 1e-12);
        assert!((matrix.get(2, 1, it) - 1.5).abs() < 1e-12); // O2,O3
    }
}

#[test]
fn test_metadata_grouping_from_tsv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample-id\tsite").unwrap();
    for j in 1..=14 {
        let site = if j <= 10 { "lake" } else { "river" };
        writeln!(file, "S{:02}\t{}", j, site).unwrap();
    }
    file.flush().unwrap();
    let metadata = Metadata::from_tsv(file.path()).unwrap();
    let grouping = metadata.grouping("site").unwrap();
    assert!(grouping.is_informative());

    let table = create_synthetic_table();
    let config = RarefactionConfig {
        min_depth: 1,
        max_depth: 100,
        steps: 2,
        iterations: 1,
        seed: 2,
        parallel: false,
    };
    let curves =
        compute_rarefaction_curves(&table, &[AlphaMetric::ObservedFeatures], None, &config)
            .unwrap();
    let matrix = curves.matrix(AlphaMetric::ObservedFeatures).unwrap();
    let regrouped = reindex_by_group(&grouping, matrix);
    assert_eq!(regrouped.row_ids(), &["lake", "river"]);
    assert_eq!(regrouped.row_label(), "site");
}
