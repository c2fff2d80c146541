//! Sample metadata and categorical grouping.

use crate::error::{DivError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A metadata value attached to a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }
}

/// Inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Inferred type for each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// A column is inferred as continuous if every non-missing value parses
    /// as a number, otherwise categorical. Empty strings and "NA"/"na" are
    /// treated as missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DivError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        // First pass: collect raw values to infer types
        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].to_string();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            raw_data.push((sample_id, values));
        }

        if raw_data.is_empty() {
            return Err(DivError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| {
                let v = values.get(col_idx).map(|s| s.trim()).unwrap_or("");
                v.is_empty() || v == "NA" || v == "na" || v.parse::<f64>().is_ok()
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::new();
        let mut data = HashMap::new();

        for (sample_id, values) in raw_data {
            sample_ids.push(sample_id.clone());
            let mut sample_data = HashMap::new();

            for (col_idx, col_name) in column_names.iter().enumerate() {
                let raw = values.get(col_idx).map(|s| s.trim()).unwrap_or("");
                let var = if raw.is_empty() || raw == "NA" || raw == "na" {
                    Variable::Missing
                } else {
                    match column_types.get(col_name) {
                        Some(VariableType::Continuous) => match raw.parse::<f64>() {
                            Ok(v) => Variable::Continuous(v),
                            Err(_) => Variable::Missing,
                        },
                        Some(VariableType::Categorical) | None => {
                            Variable::Categorical(raw.to_string())
                        }
                    }
                };
                sample_data.insert(col_name.clone(), var);
            }
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a variable value for a sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|row| row.get(column))
    }

    /// Inferred type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Extract a categorical grouping (sample ID -> group label) from a column.
    ///
    /// Samples with missing values are omitted from the grouping. Continuous
    /// columns cannot be grouped on.
    pub fn grouping(&self, column: &str) -> Result<Grouping> {
        if !self.column_names.iter().any(|c| c == column) {
            return Err(DivError::MissingColumn(column.to_string()));
        }
        if self.column_type(column) == Some(VariableType::Continuous) {
            return Err(DivError::InvalidParameter(format!(
                "Column '{}' is continuous and cannot be used as a grouping",
                column
            )));
        }

        let mut assignments = BTreeMap::new();
        for sample_id in &self.sample_ids {
            if let Some(Variable::Categorical(label)) = self.get(sample_id, column) {
                assignments.insert(sample_id.clone(), label.clone());
            }
        }

        Ok(Grouping {
            column: column.to_string(),
            assignments,
        })
    }
}

/// A mapping from sample ID to categorical group label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grouping {
    column: String,
    assignments: BTreeMap<String, String>,
}

impl Grouping {
    /// Build a grouping directly from (sample, group) pairs.
    pub fn from_pairs<I, S>(column: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            column: column.to_string(),
            assignments: pairs
                .into_iter()
                .map(|(s, g)| (s.into(), g.into()))
                .collect(),
        }
    }

    /// Name of the metadata column this grouping came from.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Group label for a sample, if assigned.
    pub fn get(&self, sample_id: &str) -> Option<&str> {
        self.assignments.get(sample_id).map(|s| s.as_str())
    }

    /// Number of samples with an assignment.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no sample has an assignment.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Number of distinct group labels.
    pub fn n_groups(&self) -> usize {
        self.assignments
            .values()
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// A grouping is informative when it distinguishes at least two groups.
    /// Single-level and all-missing columns carry no contrast and are
    /// rejected by callers before plotting.
    pub fn is_informative(&self) -> bool {
        self.n_groups() >= 2
    }

    /// Iterate over (sample ID, group label) pairs in sample ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(s, g)| (s.as_str(), g.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_metadata() -> Metadata {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample-id\tpet\tdays").unwrap();
        writeln!(file, "S1\truss\t5").unwrap();
        writeln!(file, "S2\tmilo\t10").unwrap();
        writeln!(file, "S3\tpeanut\tNA").unwrap();
        file.flush().unwrap();
        Metadata::from_tsv(file.path()).unwrap()
    }

    #[test]
    fn test_column_type_inference() {
        let md = create_test_metadata();
        assert_eq!(md.column_type("pet"), Some(VariableType::Categorical));
        assert_eq!(md.column_type("days"), Some(VariableType::Continuous));
    }

    #[test]
    fn test_get_values() {
        let md = create_test_metadata();
        assert_eq!(
            md.get("S1", "pet").and_then(|v| v.as_categorical()),
            Some("russ")
        );
        assert_eq!(
            md.get("S2", "days").and_then(|v| v.as_continuous()),
            Some(10.0)
        );
        assert!(md.get("S3", "days").unwrap().is_missing());
    }

    #[test]
    fn test_grouping_from_column() {
        let md = create_test_metadata();
        let grouping = md.grouping("pet").unwrap();
        assert_eq!(grouping.column(), "pet");
        assert_eq!(grouping.len(), 3);
        assert_eq!(grouping.n_groups(), 3);
        assert!(grouping.is_informative());
        assert_eq!(grouping.get("S1"), Some("russ"));
        assert_eq!(grouping.get("S9"), None);
    }

    #[test]
    fn test_grouping_missing_column() {
        let md = create_test_metadata();
        assert!(matches!(
            md.grouping("color"),
            Err(DivError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_grouping_continuous_column_rejected() {
        let md = create_test_metadata();
        assert!(md.grouping("days").is_err());
    }

    #[test]
    fn test_single_level_grouping_not_informative() {
        let grouping =
            Grouping::from_pairs("pet", vec![("S1", "russ"), ("S2", "russ"), ("S3", "russ")]);
        assert!(!grouping.is_informative());
        assert_eq!(grouping.n_groups(), 1);
    }

    #[test]
    fn test_missing_values_omitted_from_grouping() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample-id\tsite").unwrap();
        writeln!(file, "S1\tforest").unwrap();
        writeln!(file, "S2\tNA").unwrap();
        writeln!(file, "S3\tmeadow").unwrap();
        file.flush().unwrap();
        let md = Metadata::from_tsv(file.path()).unwrap();

        let grouping = md.grouping("site").unwrap();
        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping.get("S2"), None);
    }
}
