//! Re-keying rarefaction matrices by a categorical metadata grouping.

use crate::data::Grouping;
use crate::rarefaction::matrix::RarefactionMatrix;
use std::collections::BTreeMap;

/// Replace the sample-ID rows of a matrix with group labels, element-wise
/// summing the rows of samples sharing a label.
///
/// Samples without a group assignment are dropped. Because all rows share
/// one (depth, iteration) column schema, the sums align positionally; a NaN
/// member value (sample excluded at that depth) makes the group's cell NaN.
/// Output rows are ordered lexicographically by group label regardless of
/// input order.
pub fn reindex_by_group(grouping: &Grouping, matrix: &RarefactionMatrix) -> RarefactionMatrix {
    let n_cols = matrix.n_cols();
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for (row, sample_id) in matrix.row_ids().iter().enumerate() {
        let Some(label) = grouping.get(sample_id) else {
            continue;
        };
        let accumulated = groups
            .entry(label)
            .or_insert_with(|| vec![0.0; n_cols]);
        for (cell, &value) in accumulated.iter_mut().zip(matrix.row_values(row)) {
            *cell += value;
        }
    }

    let rows: Vec<(String, Vec<f64>)> = groups
        .into_iter()
        .map(|(label, values)| (label.to_string(), values))
        .collect();

    RarefactionMatrix::from_rows(
        grouping.column(),
        rows,
        matrix.depths().to_vec(),
        matrix.iterations(),
    )
}
