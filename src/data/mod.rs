//! Data structures for community diversity analysis.

mod feature_table;
mod metadata;
mod ordination;
mod phylogeny;

pub use feature_table::FeatureTable;
pub use metadata::{Grouping, Metadata, Variable, VariableType};
pub use ordination::Ordination;
pub use phylogeny::{PhyloNode, Phylogeny};
