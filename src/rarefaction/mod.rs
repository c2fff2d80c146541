//! Rarefaction curves: depth schedules, per-metric matrices, regrouping,
//! and multi-depth summaries.

mod curve;
mod matrix;
mod reindex;
mod summary;

pub use curve::{
    compute_rarefaction_curves, depth_schedule, RarefactionConfig, RarefactionCurves,
    SAMPLE_ID_LABEL,
};
pub use matrix::RarefactionMatrix;
pub use reindex::reindex_by_group;
pub use summary::{summarize, SummaryRecord, SummaryTable, SUMMARY_PERCENTILES};
