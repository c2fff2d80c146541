//! Procrustes superposition of two ordinations with a Monte Carlo
//! permutation test.
//!
//! # Algorithm
//!
//! 1. Validate that the two ordinations have the same coordinate shape,
//!    enough axes for the requested dimensionality, and identical sample
//!    ID sets; realign the second ordination's rows to the first's sample
//!    order so the result is independent of input row order.
//! 2. Superimpose: center both configurations at the origin, scale each to
//!    unit Frobenius norm, and rotate/scale the second onto the first via
//!    the SVD of the cross-product matrix. M² is the remaining sum of
//!    squared pointwise distances, in [0, 1].
//! 3. Permutation test: shuffle the row correspondence of the second
//!    configuration, refit, and count how many null M² values fall below
//!    the observed one. The +1 correction keeps p strictly positive.

use crate::data::Ordination;
use crate::error::{DivError, Result};
use crate::rng::SeededRng;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of label-shuffling permutations, or the explicit request to skip
/// the significance test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permutations {
    /// No significance test; the p-value is reported as NaN.
    Disabled,
    /// Run this many permutations. `Count(0)` behaves like `Disabled`.
    Count(u32),
}

impl Permutations {
    /// The number of permutations to actually run.
    pub fn count(&self) -> u32 {
        match self {
            Permutations::Disabled => 0,
            Permutations::Count(n) => *n,
        }
    }
}

impl Default for Permutations {
    fn default() -> Self {
        Permutations::Count(999)
    }
}

impl FromStr for Permutations {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "disable" | "disabled" => Ok(Permutations::Disabled),
            other => other
                .parse::<u32>()
                .map(Permutations::Count)
                .map_err(|_| format!("expected a permutation count or 'disable', got '{other}'")),
        }
    }
}

impl fmt::Display for Permutations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permutations::Disabled => f.write_str("disable"),
            Permutations::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Configuration for Procrustes comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcrustesConfig {
    /// Number of leading axes to fit.
    pub dimensions: usize,
    /// Permutation-test policy.
    pub permutations: Permutations,
    /// Seed for the per-permutation random substreams.
    pub seed: u64,
    /// Whether to run permutations with rayon.
    pub parallel: bool,
}

impl Default for ProcrustesConfig {
    fn default() -> Self {
        Self {
            dimensions: 5,
            permutations: Permutations::default(),
            seed: 42,
            parallel: true,
        }
    }
}

/// Result of a Procrustes comparison.
#[derive(Debug, Clone)]
pub struct ProcrustesAnalysis {
    /// Reference configuration after centering and unit scaling.
    pub fitted_reference: Ordination,
    /// Other configuration after centering, scaling, and rotation onto the
    /// reference, rows in reference sample order.
    pub fitted_other: Ordination,
    /// Observed M²: sum of squared pointwise residuals after fitting.
    pub m_squared: f64,
    /// Number of Monte Carlo permutations performed.
    pub permutations: u32,
    /// Permutation p-value, NaN when the test was disabled.
    pub p_value: f64,
}

/// Fit two ordinations and estimate the significance of their concordance.
pub fn procrustes_analysis(
    reference: &Ordination,
    other: &Ordination,
    config: &ProcrustesConfig,
) -> Result<ProcrustesAnalysis> {
    if reference.n_samples() != other.n_samples() || reference.n_axes() != other.n_axes() {
        return Err(DivError::ShapeMismatch);
    }
    if reference.n_axes() < config.dimensions {
        return Err(DivError::InsufficientDimensions {
            requested: config.dimensions,
            available: reference.n_axes(),
        });
    }

    // Realignment by ID makes the fit independent of `other`'s row order.
    let other_aligned = other.reordered_to(&reference.sample_ids)?;

    let dims = config.dimensions;
    let reference_coords = reference.coordinates.columns(0, dims).into_owned();
    let other_coords = other_aligned.coordinates.columns(0, dims).into_owned();

    let (fitted_ref_coords, fitted_other_coords, m_squared) =
        superimpose(&reference_coords, &other_coords)?;

    let n_permutations = config.permutations.count();
    let p_value = if n_permutations == 0 {
        f64::NAN
    } else {
        monte_carlo_p(
            &reference_coords,
            &other_coords,
            m_squared,
            n_permutations,
            config.seed,
            config.parallel,
        )?
    };

    let axis_labels: Vec<String> = reference.axis_labels[..dims].to_vec();
    let fitted_reference = Ordination {
        method: reference.method.clone(),
        sample_ids: reference.sample_ids.clone(),
        axis_labels: axis_labels.clone(),
        coordinates: fitted_ref_coords,
        eigenvalues: truncated(&reference.eigenvalues, dims),
        proportion_explained: truncated(&reference.proportion_explained, dims),
    };
    let fitted_other = Ordination {
        method: reference.method.clone(),
        sample_ids: reference.sample_ids.clone(),
        axis_labels,
        coordinates: fitted_other_coords,
        eigenvalues: truncated(&other_aligned.eigenvalues, dims),
        proportion_explained: truncated(&other_aligned.proportion_explained, dims),
    };

    Ok(ProcrustesAnalysis {
        fitted_reference,
        fitted_other,
        m_squared,
        permutations: n_permutations,
        p_value,
    })
}

/// Procrustes superposition of two equal-shape coordinate matrices.
///
/// Returns the centered unit-norm reference, the fitted other
/// configuration, and M².
fn superimpose(
    reference: &DMatrix<f64>,
    other: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, DMatrix<f64>, f64)> {
    let reference_centered = centered(reference);
    let other_centered = centered(other);

    let reference_norm = reference_centered.norm();
    let other_norm = other_centered.norm();
    if reference_norm == 0.0 || other_norm == 0.0 {
        return Err(DivError::Numerical(
            "Procrustes requires non-degenerate configurations (all points coincide)".to_string(),
        ));
    }

    let reference_scaled = reference_centered / reference_norm;
    let other_scaled = other_centered / other_norm;

    let cross = reference_scaled.transpose() * &other_scaled;
    let svd = cross.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| DivError::Numerical("SVD did not produce singular vectors".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| DivError::Numerical("SVD did not produce singular vectors".to_string()))?;
    let scale: f64 = svd.singular_values.iter().sum();

    let rotation = u * v_t;
    let fitted_other = other_scaled * rotation.transpose() * scale;
    let m_squared = (&reference_scaled - &fitted_other).norm_squared();

    Ok((reference_scaled, fitted_other, m_squared))
}

/// Monte Carlo p-value: fraction of row-shuffled refits with M² strictly
/// below the observed value, with the standard +1 correction.
fn monte_carlo_p(
    reference: &DMatrix<f64>,
    other: &DMatrix<f64>,
    true_m_squared: f64,
    n_permutations: u32,
    seed: u64,
    parallel: bool,
) -> Result<f64> {
    let trial = |perm: u64| -> Result<bool> {
        let mut rng = SeededRng::substream(seed, perm);
        let shuffled = shuffled_rows(other, &mut rng);
        let (_, _, m_squared) = superimpose(reference, &shuffled)?;
        Ok(m_squared < true_m_squared)
    };

    let outcomes: Vec<bool> = if parallel {
        (0..n_permutations as u64)
            .into_par_iter()
            .map(trial)
            .collect::<Result<_>>()?
    } else {
        (0..n_permutations as u64).map(trial).collect::<Result<_>>()?
    };

    let below = outcomes.iter().filter(|&&b| b).count();
    Ok((below as f64 + 1.0) / (n_permutations as f64 + 1.0))
}

/// Translate a configuration so every axis has zero mean.
fn centered(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let mut centered = matrix.clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    centered
}

/// A fresh copy of `matrix` with rows in uniformly shuffled order.
fn shuffled_rows(matrix: &DMatrix<f64>, rng: &mut SeededRng) -> DMatrix<f64> {
    let mut order: Vec<usize> = (0..matrix.nrows()).collect();
    rng.shuffle(&mut order);

    let mut shuffled = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (new_row, &old_row) in order.iter().enumerate() {
        shuffled.set_row(new_row, &matrix.row(old_row));
    }
    shuffled
}

fn truncated(values: &[f64], dims: usize) -> Vec<f64> {
    values[..dims.min(values.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_ordination() -> Ordination {
        let coords = DMatrix::from_row_slice(
            4,
            6,
            &[
                0.0, 3.0, 4.0, 4.0, 0.0, 0.0, //
                1.0, 2.0, 1.0, 4.0, 3.0, 3.0, //
                2.0, 3.0, 1.0, 0.0, 0.0, 1.0, //
                0.0, 3.0, 2.0, 4.0, 3.0, 0.0,
            ],
        );
        ordination_with(coords, &["A", "B", "C", "D"])
    }

    fn other_ordination() -> Ordination {
        let coords = DMatrix::from_row_slice(
            4,
            6,
            &[
                0.7, 3.7, 4.7, 4.7, 0.7, 0.7, //
                1.7, 2.7, 1.7, 4.7, 3.7, 3.7, //
                2.7, 3.7, 1.7, 0.7, 0.7, 1.7, //
                30.0, 3.7, 2.7, 4.7, 3.7, 0.7,
            ],
        );
        ordination_with(coords, &["A", "B", "C", "D"])
    }

    fn ordination_with(coords: DMatrix<f64>, ids: &[&str]) -> Ordination {
        let n_axes = coords.ncols();
        Ordination::new(
            "PCoA",
            ids.iter().map(|s| s.to_string()).collect(),
            (1..=n_axes).map(|i| format!("PC{i}")).collect(),
            coords,
        )
        .unwrap()
        .with_axis_stats(
            vec![1.5, 0.75, 0.3, 0.15, 0.15, 0.15][..n_axes].to_vec(),
            vec![0.50, 0.25, 0.10, 0.05, 0.05, 0.05][..n_axes].to_vec(),
        )
    }

    const EXPECTED_M2: f64 = 0.72240956;

    const EXPECTED_REF: [[f64; 5]; 4] = [
        [-0.1358036, 0.0452679, 0.3621430, 0.1810715, -0.2716072],
        [0.0452679, -0.1358036, -0.1810715, 0.1810715, 0.2716072],
        [0.2263394, 0.0452679, -0.1810715, -0.5432145, -0.2716072],
        [-0.1358036, 0.0452679, 0.0000000, 0.1810715, 0.2716072],
    ];

    const EXPECTED_OTHER: [[f64; 5]; 4] = [
        [0.0482731, -0.0324317, 0.0494312, -0.0316828, -0.1584374],
        [0.0803620, -0.0718115, -0.0112234, -0.0171011, -0.1101209],
        [0.0527554, -0.0042753, -0.0126739, -0.0969602, -0.0964822],
        [-0.1813905, 0.1085184, -0.0255339, 0.1457440, 0.3650405],
    ];

    fn assert_coords_close(ordination: &Ordination, expected: &[[f64; 5]; 4]) {
        for row in 0..4 {
            for col in 0..5 {
                let actual = ordination.coordinates[(row, col)];
                assert!(
                    (actual - expected[row][col]).abs() < 1e-6,
                    "({row}, {col}): {actual} vs {}",
                    expected[row][col]
                );
            }
        }
    }

    fn disabled_config() -> ProcrustesConfig {
        ProcrustesConfig {
            permutations: Permutations::Disabled,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixture_fit() {
        let result =
            procrustes_analysis(&reference_ordination(), &other_ordination(), &disabled_config())
                .unwrap();

        assert!((result.m_squared - EXPECTED_M2).abs() < 1e-6);
        assert_coords_close(&result.fitted_reference, &EXPECTED_REF);
        assert_coords_close(&result.fitted_other, &EXPECTED_OTHER);
        assert_eq!(result.fitted_reference.axis_labels.len(), 5);
        assert_eq!(result.fitted_reference.eigenvalues, vec![1.5, 0.75, 0.3, 0.15, 0.15]);
        assert!(result.p_value.is_nan());
        assert_eq!(result.permutations, 0);
    }

    #[test]
    fn test_m_squared_bounded() {
        let result =
            procrustes_analysis(&reference_ordination(), &other_ordination(), &disabled_config())
                .unwrap();
        assert!(result.m_squared >= 0.0 && result.m_squared <= 1.0);
    }

    #[test]
    fn test_identical_configurations_fit_perfectly() {
        let reference = reference_ordination();
        let result =
            procrustes_analysis(&reference, &reference.clone(), &disabled_config()).unwrap();
        assert!(result.m_squared.abs() < 1e-10);
    }

    #[test]
    fn test_row_order_invariance() {
        let reference = reference_ordination();
        let other = other_ordination();
        let permuted = other
            .reordered_to(&["D".to_string(), "B".to_string(), "A".to_string(), "C".to_string()])
            .unwrap();

        let direct = procrustes_analysis(&reference, &other, &disabled_config()).unwrap();
        let shuffled_input = procrustes_analysis(&reference, &permuted, &disabled_config()).unwrap();

        assert!((direct.m_squared - shuffled_input.m_squared).abs() < 1e-12);
        assert_coords_close(&shuffled_input.fitted_other, &EXPECTED_OTHER);
        assert_eq!(shuffled_input.fitted_other.sample_ids, reference.sample_ids);
    }

    #[test]
    fn test_shape_mismatch() {
        let reference = reference_ordination();
        let narrow = ordination_with(
            DMatrix::from_row_slice(4, 4, &[0.0; 16]),
            &["A", "B", "C", "D"],
        );
        assert!(matches!(
            procrustes_analysis(&reference, &narrow, &disabled_config()),
            Err(DivError::ShapeMismatch)
        ));
    }

    #[test]
    fn test_over_dimensions() {
        let config = ProcrustesConfig {
            dimensions: 11,
            permutations: Permutations::Disabled,
            ..Default::default()
        };
        assert!(matches!(
            procrustes_analysis(&reference_ordination(), &other_ordination(), &config),
            Err(DivError::InsufficientDimensions { requested: 11, available: 6 })
        ));
    }

    #[test]
    fn test_sample_set_mismatch() {
        let reference = reference_ordination();
        for ids in [
            [":L", ":D", ":)", ":("],
            [":L", "B", "C", "D"],
            ["a", "b", "c", "d"],
        ] {
            let other = ordination_with(other_ordination().coordinates.clone(), &ids);
            assert!(matches!(
                procrustes_analysis(&reference, &other, &disabled_config()),
                Err(DivError::SampleSetMismatch)
            ));
        }
    }

    #[test]
    fn test_zero_permutations_nan_p() {
        let config = ProcrustesConfig {
            permutations: Permutations::Count(0),
            ..Default::default()
        };
        let result =
            procrustes_analysis(&reference_ordination(), &other_ordination(), &config).unwrap();
        assert!(result.p_value.is_nan());
        assert_eq!(result.permutations, 0);
    }

    #[test]
    fn test_p_value_form() {
        let k = 99u32;
        let config = ProcrustesConfig {
            permutations: Permutations::Count(k),
            seed: 11,
            parallel: false,
            ..Default::default()
        };
        let result =
            procrustes_analysis(&reference_ordination(), &other_ordination(), &config).unwrap();

        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
        // p must be (c + 1) / (k + 1) for an integer c in [0, k]
        let scaled = result.p_value * (k as f64 + 1.0);
        assert!((scaled - scaled.round()).abs() < 1e-9);
        assert_eq!(result.permutations, k);
    }

    #[test]
    fn test_permutation_reproducible_and_parallel_consistent() {
        let reference = reference_ordination();
        let other = other_ordination();
        let serial = ProcrustesConfig {
            permutations: Permutations::Count(200),
            seed: 5,
            parallel: false,
            ..Default::default()
        };
        let parallel = ProcrustesConfig {
            parallel: true,
            ..serial.clone()
        };

        let a = procrustes_analysis(&reference, &other, &serial).unwrap();
        let b = procrustes_analysis(&reference, &other, &serial).unwrap();
        let c = procrustes_analysis(&reference, &other, &parallel).unwrap();
        assert_eq!(a.p_value, b.p_value);
        assert_eq!(a.p_value, c.p_value);
    }

    #[test]
    fn test_permutations_parse() {
        assert_eq!("disable".parse::<Permutations>().unwrap(), Permutations::Disabled);
        assert_eq!("999".parse::<Permutations>().unwrap(), Permutations::Count(999));
        assert!("-3".parse::<Permutations>().is_err());
        assert!("many".parse::<Permutations>().is_err());
    }

    #[test]
    fn test_degenerate_configuration_rejected() {
        let flat = ordination_with(
            DMatrix::from_row_slice(4, 6, &[1.0; 24]),
            &["A", "B", "C", "D"],
        );
        assert!(matches!(
            procrustes_analysis(&flat, &other_ordination(), &disabled_config()),
            Err(DivError::Numerical(_))
        ));
    }
}
