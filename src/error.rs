//! Error types for the ecodive library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DivError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error(
        "Provided min_depth of {min_depth} must be less than provided max_depth of {max_depth}"
    )]
    InvalidDepthRange { min_depth: u64, max_depth: u64 },

    #[error("Provided steps of {0} must be greater than or equal to 2")]
    InvalidSteps(usize),

    #[error("Provided iterations of {0} must be greater than or equal to 1")]
    InvalidIterations(usize),

    #[error(
        "Provided max_depth of {max_depth} exceeds the maximum sample total \
         frequency of the feature table ({max_total})"
    )]
    DepthExceedsTable { max_depth: u64, max_total: u64 },

    #[error("Phylogenetic metric '{0}' was requested but a phylogeny was not provided")]
    MissingPhylogeny(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error(
        "Feature IDs {feature_ids:?} are not tips of the provided phylogeny; \
         every feature with nonzero abundance must appear in the tree"
    )]
    TreeCoverage { feature_ids: Vec<String> },

    #[error("The ordinations cannot be fitted unless they have the same dimensions")]
    ShapeMismatch,

    #[error("Cannot fit fewer dimensions than available: requested {requested}, have {available}")]
    InsufficientDimensions { requested: usize, available: usize },

    #[error("The ordinations represent two different sets of samples")]
    SampleSetMismatch,

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DivError>;
