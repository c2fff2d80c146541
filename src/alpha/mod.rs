//! Alpha diversity: metric evaluation and rarefaction subsampling.

mod metrics;
mod rarefy;

pub use metrics::{
    alpha_diversity, compute_nonphylo, default_metrics, AlphaMetric, AlphaSeries,
};
pub use rarefy::rarefy;
