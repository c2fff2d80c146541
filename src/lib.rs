//! Community Diversity Analysis Library
//!
//! This library computes ecological diversity statistics from
//! microbiome/community-abundance data.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (FeatureTable, Metadata, Phylogeny, Ordination)
//! - **alpha**: Alpha diversity metrics and rarefaction subsampling
//! - **rarefaction**: Rarefaction curves, regrouping, and multi-depth summaries
//! - **procrustes**: Procrustes ordination comparison with a permutation test
//! - **rng**: Seeded deterministic random generation
//!
//! # Example
//!
//! ```no_run
//! use ecodive::prelude::*;
//!
//! // Load data
//! let table = FeatureTable::from_tsv("table.tsv").unwrap();
//!
//! // Rarefaction curves for the default metrics
//! let config = RarefactionConfig::new(table.max_sample_sum());
//! let metrics = default_metrics(false);
//! let curves = compute_rarefaction_curves(&table, &metrics, None, &config).unwrap();
//!
//! // Per-depth summaries for plotting
//! for (metric, matrix) in curves.iter() {
//!     let summary = summarize(matrix, &curves.depths);
//!     summary.to_tsv(format!("{metric}.tsv")).unwrap();
//! }
//! ```

pub mod alpha;
pub mod data;
pub mod error;
pub mod procrustes;
pub mod rarefaction;
pub mod rng;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::alpha::{
        alpha_diversity, default_metrics, rarefy, AlphaMetric, AlphaSeries,
    };
    pub use crate::data::{FeatureTable, Grouping, Metadata, Ordination, Phylogeny};
    pub use crate::error::{DivError, Result};
    pub use crate::procrustes::{
        procrustes_analysis, Permutations, ProcrustesAnalysis, ProcrustesConfig,
    };
    pub use crate::rarefaction::{
        compute_rarefaction_curves, depth_schedule, reindex_by_group, summarize,
        RarefactionConfig, RarefactionCurves, RarefactionMatrix, SummaryRecord, SummaryTable,
    };
    pub use crate::rng::SeededRng;
}
