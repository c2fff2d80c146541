//! ecodive - Community Diversity Analysis CLI
//!
//! Command-line interface for rarefaction curves and Procrustes
//! ordination comparison.

use clap::{Parser, Subcommand};
use ecodive::alpha::{default_metrics, AlphaMetric};
use ecodive::data::{FeatureTable, Metadata, Ordination, Phylogeny};
use ecodive::error::{DivError, Result};
use ecodive::procrustes::{procrustes_analysis, Permutations, ProcrustesConfig};
use ecodive::rarefaction::{
    compute_rarefaction_curves, reindex_by_group, summarize, RarefactionConfig,
};
use std::path::{Path, PathBuf};

/// Community Diversity Analysis
#[derive(Parser)]
#[command(name = "ecodive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute alpha-rarefaction curves and per-depth summaries
    Rarefaction {
        /// Path to feature table TSV (features x samples)
        #[arg(short = 't', long)]
        table: PathBuf,

        /// Largest rarefaction depth
        #[arg(long)]
        max_depth: u64,

        /// Smallest rarefaction depth (default: 1)
        #[arg(long, default_value = "1")]
        min_depth: u64,

        /// Number of depths in the schedule (default: 10)
        #[arg(long, default_value = "10")]
        steps: usize,

        /// Random redraws per depth (default: 10)
        #[arg(long, default_value = "10")]
        iterations: usize,

        /// Metrics to compute (comma-separated); defaults to
        /// observed_features and shannon_entropy, plus faith_pd with a tree
        #[arg(short, long)]
        metrics: Option<String>,

        /// Path to a Newick phylogeny (required for phylogenetic metrics)
        #[arg(short, long)]
        phylogeny: Option<PathBuf>,

        /// Path to sample metadata TSV for grouping
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Metadata column to regroup samples by (requires --metadata)
        #[arg(short, long)]
        group_by: Option<String>,

        /// Random seed (default: 42)
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory for per-metric summary TSVs (default: .)
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Fit two ordinations with Procrustes and a permutation test
    Procrustes {
        /// Path to the reference ordination coordinates TSV
        #[arg(short, long)]
        reference: PathBuf,

        /// Path to the other ordination coordinates TSV
        #[arg(short = 'x', long)]
        other: PathBuf,

        /// Number of leading axes to fit (default: 5)
        #[arg(short, long, default_value = "5")]
        dimensions: usize,

        /// Number of Monte Carlo permutations, or 'disable' (default: 999)
        #[arg(short, long, default_value = "999")]
        permutations: Permutations,

        /// Random seed (default: 42)
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Directory for fitted coordinate TSVs; skipped when absent
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Rarefaction {
            table,
            max_depth,
            min_depth,
            steps,
            iterations,
            metrics,
            phylogeny,
            metadata,
            group_by,
            seed,
            output_dir,
        } => cmd_rarefaction(
            &table,
            max_depth,
            min_depth,
            steps,
            iterations,
            metrics.as_deref(),
            phylogeny.as_deref(),
            metadata.as_deref(),
            group_by.as_deref(),
            seed,
            &output_dir,
        ),

        Commands::Procrustes {
            reference,
            other,
            dimensions,
            permutations,
            seed,
            output_dir,
        } => cmd_procrustes(
            &reference,
            &other,
            dimensions,
            permutations,
            seed,
            output_dir.as_deref(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_rarefaction(
    table_path: &Path,
    max_depth: u64,
    min_depth: u64,
    steps: usize,
    iterations: usize,
    metrics: Option<&str>,
    phylogeny_path: Option<&Path>,
    metadata_path: Option<&Path>,
    group_by: Option<&str>,
    seed: u64,
    output_dir: &Path,
) -> Result<()> {
    eprintln!("Loading feature table from {:?}...", table_path);
    let table = FeatureTable::from_tsv(table_path)?;
    eprintln!(
        "Loaded {} features x {} samples",
        table.n_features(),
        table.n_samples()
    );

    let phylogeny = match phylogeny_path {
        Some(path) => {
            eprintln!("Loading phylogeny from {:?}...", path);
            Some(Phylogeny::from_newick_file(path)?)
        }
        None => None,
    };

    let metrics = match metrics {
        Some(names) => {
            let names: Vec<String> = names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            AlphaMetric::parse_list(&names)?
        }
        None => default_metrics(phylogeny.is_some()),
    };

    let grouping = match (metadata_path, group_by) {
        (Some(md_path), Some(column)) => {
            eprintln!("Loading metadata from {:?}...", md_path);
            let metadata = Metadata::from_tsv(md_path)?;
            let grouping = metadata.grouping(column)?;
            if !grouping.is_informative() {
                return Err(DivError::InvalidParameter(format!(
                    "Grouping column '{}' has fewer than two distinct values",
                    column
                )));
            }
            Some(grouping)
        }
        (None, Some(column)) => {
            return Err(DivError::InvalidParameter(format!(
                "Grouping by '{}' requires --metadata",
                column
            )));
        }
        _ => None,
    };

    let config = RarefactionConfig {
        min_depth,
        max_depth,
        steps,
        iterations,
        seed,
        parallel: true,
    };

    eprintln!(
        "Computing rarefaction curves for {} metric(s), {} iteration(s)...",
        metrics.len(),
        iterations
    );
    let curves = compute_rarefaction_curves(&table, &metrics, phylogeny.as_ref(), &config)?;

    std::fs::create_dir_all(output_dir)?;
    for (metric, matrix) in curves.iter() {
        let summary = match &grouping {
            Some(grouping) => summarize(&reindex_by_group(grouping, matrix), &curves.depths),
            None => summarize(matrix, &curves.depths),
        };
        let out_path = output_dir.join(format!("{metric}.tsv"));
        summary.to_tsv(&out_path)?;
        eprintln!("  {} -> {:?}", metric, out_path);
    }

    eprintln!(
        "Done! {} depth(s) from {} to {}",
        curves.depths.len(),
        curves.depths.first().copied().unwrap_or(0),
        curves.depths.last().copied().unwrap_or(0)
    );
    Ok(())
}

fn cmd_procrustes(
    reference_path: &Path,
    other_path: &Path,
    dimensions: usize,
    permutations: Permutations,
    seed: u64,
    output_dir: Option<&Path>,
) -> Result<()> {
    eprintln!("Loading ordinations...");
    let reference = Ordination::from_tsv(reference_path)?;
    let other = Ordination::from_tsv(other_path)?;
    eprintln!(
        "Loaded {} samples x {} axes",
        reference.n_samples(),
        reference.n_axes()
    );

    let config = ProcrustesConfig {
        dimensions,
        permutations,
        seed,
        parallel: true,
    };
    let result = procrustes_analysis(&reference, &other, &config)?;

    let report = serde_json::json!({
        "true M^2 value": result.m_squared,
        "p-value for true M^2 value": if result.p_value.is_nan() {
            serde_json::Value::Null
        } else {
            serde_json::json!(result.p_value)
        },
        "number of Monte Carlo permutations": result.permutations,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
        let ref_path = dir.join("fitted_reference.tsv");
        let other_path = dir.join("fitted_other.tsv");
        result.fitted_reference.to_tsv(&ref_path)?;
        result.fitted_other.to_tsv(&other_path)?;
        eprintln!("Fitted coordinates -> {:?}, {:?}", ref_path, other_path);
    }

    Ok(())
}
