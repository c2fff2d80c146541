//! Alpha diversity metrics: name registry, dispatch, and index math.
//!
//! The non-phylogenetic indices operate on a sample's dense count vector;
//! `faith_pd` additionally needs a phylogeny covering every observed
//! feature. Metric names follow the conventional snake_case identifiers
//! (`observed_features`, `shannon_entropy`, ...) with the legacy aliases
//! `shannon`, `pielou_e`, and `observed_otus` accepted.

use crate::data::{FeatureTable, Phylogeny};
use crate::error::{DivError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recognized alpha diversity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlphaMetric {
    ObservedFeatures,
    ShannonEntropy,
    PielouEvenness,
    Simpson,
    SimpsonE,
    Enspie,
    Chao1,
    BergerParkerD,
    BrillouinD,
    Dominance,
    Doubles,
    Singles,
    Margalef,
    Menhinick,
    McintoshD,
    McintoshE,
    Robbins,
    Strong,
    GoodsCoverage,
    FisherAlpha,
    GiniIndex,
    FaithPd,
}

impl AlphaMetric {
    /// All recognized metrics.
    pub fn all() -> &'static [AlphaMetric] {
        use AlphaMetric::*;
        &[
            ObservedFeatures,
            ShannonEntropy,
            PielouEvenness,
            Simpson,
            SimpsonE,
            Enspie,
            Chao1,
            BergerParkerD,
            BrillouinD,
            Dominance,
            Doubles,
            Singles,
            Margalef,
            Menhinick,
            McintoshD,
            McintoshE,
            Robbins,
            Strong,
            GoodsCoverage,
            FisherAlpha,
            GiniIndex,
            FaithPd,
        ]
    }

    /// Canonical metric name.
    pub fn name(&self) -> &'static str {
        use AlphaMetric::*;
        match self {
            ObservedFeatures => "observed_features",
            ShannonEntropy => "shannon_entropy",
            PielouEvenness => "pielou_evenness",
            Simpson => "simpson",
            SimpsonE => "simpson_e",
            Enspie => "enspie",
            Chao1 => "chao1",
            BergerParkerD => "berger_parker_d",
            BrillouinD => "brillouin_d",
            Dominance => "dominance",
            Doubles => "doubles",
            Singles => "singles",
            Margalef => "margalef",
            Menhinick => "menhinick",
            McintoshD => "mcintosh_d",
            McintoshE => "mcintosh_e",
            Robbins => "robbins",
            Strong => "strong",
            GoodsCoverage => "goods_coverage",
            FisherAlpha => "fisher_alpha",
            GiniIndex => "gini_index",
            FaithPd => "faith_pd",
        }
    }

    /// Parse a metric name, accepting legacy aliases.
    pub fn parse(name: &str) -> Result<Self> {
        use AlphaMetric::*;
        match name {
            "shannon" => return Ok(ShannonEntropy),
            "pielou_e" => return Ok(PielouEvenness),
            "observed_otus" => return Ok(ObservedFeatures),
            _ => {}
        }
        Self::all()
            .iter()
            .find(|m| m.name() == name)
            .copied()
            .ok_or_else(|| DivError::UnknownMetric(name.to_string()))
    }

    /// Parse a list of metric names, rejecting an explicitly empty list.
    pub fn parse_list(names: &[String]) -> Result<Vec<Self>> {
        if names.is_empty() {
            return Err(DivError::InvalidParameter(
                "metrics was given an empty list".to_string(),
            ));
        }
        names.iter().map(|n| Self::parse(n)).collect()
    }

    /// Whether the metric requires a phylogeny.
    pub fn is_phylogenetic(&self) -> bool {
        matches!(self, AlphaMetric::FaithPd)
    }
}

impl fmt::Display for AlphaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics computed when the caller requests none: observed features and
/// Shannon entropy, plus Faith's PD when a phylogeny is available.
pub fn default_metrics(has_phylogeny: bool) -> Vec<AlphaMetric> {
    let mut metrics = vec![AlphaMetric::ObservedFeatures, AlphaMetric::ShannonEntropy];
    if has_phylogeny {
        metrics.push(AlphaMetric::FaithPd);
    }
    metrics
}

/// Per-sample values of one metric across a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaSeries {
    /// Canonical metric name.
    pub metric: String,
    /// Sample identifiers, aligned with `values`.
    pub sample_ids: Vec<String>,
    /// Metric value per sample (NaN for zero-total samples).
    pub values: Vec<f64>,
}

/// Evaluate an alpha diversity metric for every sample of a table.
///
/// Phylogenetic metrics require a phylogeny whose tips cover every feature
/// with nonzero abundance anywhere in the table; coverage is validated
/// before any per-sample work so the error can name the missing features.
pub fn alpha_diversity(
    table: &FeatureTable,
    metric: AlphaMetric,
    phylogeny: Option<&Phylogeny>,
) -> Result<AlphaSeries> {
    if table.n_samples() == 0 || table.n_features() == 0 {
        return Err(DivError::EmptyData(
            "Cannot compute alpha diversity on an empty table".to_string(),
        ));
    }

    let values = if metric.is_phylogenetic() {
        let tree = phylogeny
            .ok_or_else(|| DivError::MissingPhylogeny(metric.name().to_string()))?;
        tree.check_coverage(table.observed_feature_ids().iter().copied())?;
        faith_pd_series(table, tree)
    } else {
        (0..table.n_samples())
            .into_par_iter()
            .map(|col| compute_nonphylo(metric, &table.sample_counts(col)))
            .collect()
    };

    Ok(AlphaSeries {
        metric: metric.name().to_string(),
        sample_ids: table.sample_ids().to_vec(),
        values,
    })
}

/// Dispatch a non-phylogenetic metric over a single count vector.
///
/// Zero-total samples yield NaN for every metric; NaN is the crate-wide
/// missing marker, not an error.
pub fn compute_nonphylo(metric: AlphaMetric, counts: &[u64]) -> f64 {
    use AlphaMetric::*;
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return f64::NAN;
    }
    match metric {
        ObservedFeatures => observed_features(counts),
        ShannonEntropy => shannon_entropy(counts),
        PielouEvenness => pielou_evenness(counts),
        Simpson => simpson(counts),
        SimpsonE => simpson_e(counts),
        Enspie => enspie(counts),
        Chao1 => chao1(counts),
        BergerParkerD => berger_parker_d(counts),
        BrillouinD => brillouin_d(counts),
        Dominance => dominance(counts),
        Doubles => doubles(counts),
        Singles => singles(counts),
        Margalef => margalef(counts),
        Menhinick => menhinick(counts),
        McintoshD => mcintosh_d(counts),
        McintoshE => mcintosh_e(counts),
        Robbins => robbins(counts),
        Strong => strong(counts),
        GoodsCoverage => goods_coverage(counts),
        FisherAlpha => fisher_alpha(counts),
        GiniIndex => gini_index(counts),
        FaithPd => f64::NAN,
    }
}

fn faith_pd_series(table: &FeatureTable, tree: &Phylogeny) -> Vec<f64> {
    (0..table.n_samples())
        .into_par_iter()
        .map(|col| {
            let counts = table.sample_counts(col);
            if counts.iter().all(|&c| c == 0) {
                return f64::NAN;
            }
            let tips: Vec<usize> = counts
                .iter()
                .enumerate()
                .filter(|(_, &c)| c > 0)
                .filter_map(|(row, _)| tree.tip(&table.feature_ids()[row]))
                .collect();
            tree.spanning_branch_length(&tips)
        })
        .collect()
}

fn total_f64(counts: &[u64]) -> f64 {
    counts.iter().sum::<u64>() as f64
}

fn richness(counts: &[u64]) -> f64 {
    counts.iter().filter(|&&c| c > 0).count() as f64
}

fn count_equal(counts: &[u64], value: u64) -> f64 {
    counts.iter().filter(|&&c| c == value).count() as f64
}

/// Observed features: count of non-zero entries.
pub fn observed_features(counts: &[u64]) -> f64 {
    richness(counts)
}

/// Shannon entropy H = -Σ p_i ln(p_i), natural log.
pub fn shannon_entropy(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    let mut h = 0.0;
    for &c in counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.ln();
        }
    }
    h
}

/// Pielou's evenness J = H / ln(S). NaN when fewer than two features are
/// observed (no evenness to measure).
pub fn pielou_evenness(counts: &[u64]) -> f64 {
    let s = richness(counts);
    if s < 2.0 {
        return f64::NAN;
    }
    shannon_entropy(counts) / s.ln()
}

/// Dominance Σ p_i².
pub fn dominance(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum()
}

/// Simpson's diversity 1 - Σ p_i².
pub fn simpson(counts: &[u64]) -> f64 {
    1.0 - dominance(counts)
}

/// ENS_PIE, the effective number of species 1 / Σ p_i² (inverse Simpson).
pub fn enspie(counts: &[u64]) -> f64 {
    1.0 / dominance(counts)
}

/// Simpson's evenness (1 / Σ p_i²) / S.
pub fn simpson_e(counts: &[u64]) -> f64 {
    enspie(counts) / richness(counts)
}

/// Bias-corrected Chao1 richness S + f1(f1-1) / (2(f2+1)).
pub fn chao1(counts: &[u64]) -> f64 {
    let s = richness(counts);
    let f1 = count_equal(counts, 1);
    let f2 = count_equal(counts, 2);
    s + (f1 * (f1 - 1.0)) / (2.0 * (f2 + 1.0))
}

/// Berger-Parker dominance: proportion of the most abundant feature.
pub fn berger_parker_d(counts: &[u64]) -> f64 {
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    max / total_f64(counts)
}

/// Brillouin's index (ln N! - Σ ln c_i!) / N.
pub fn brillouin_d(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    let log_factorials: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| ln_gamma(c as f64 + 1.0))
        .sum();
    (ln_gamma(n + 1.0) - log_factorials) / n
}

/// Number of doubleton features.
pub fn doubles(counts: &[u64]) -> f64 {
    count_equal(counts, 2)
}

/// Number of singleton features.
pub fn singles(counts: &[u64]) -> f64 {
    count_equal(counts, 1)
}

/// Margalef's richness (S - 1) / ln(N). NaN for a single individual.
pub fn margalef(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    if n <= 1.0 {
        return f64::NAN;
    }
    (richness(counts) - 1.0) / n.ln()
}

/// Menhinick's richness S / sqrt(N).
pub fn menhinick(counts: &[u64]) -> f64 {
    richness(counts) / total_f64(counts).sqrt()
}

/// McIntosh dominance (N - U) / (N - sqrt(N)) with U = sqrt(Σ c_i²).
/// NaN for a single individual.
pub fn mcintosh_d(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    if n <= 1.0 {
        return f64::NAN;
    }
    let u = counts
        .iter()
        .map(|&c| (c as f64) * (c as f64))
        .sum::<f64>()
        .sqrt();
    (n - u) / (n - n.sqrt())
}

/// McIntosh evenness U / sqrt((N - S + 1)² + S - 1).
pub fn mcintosh_e(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    let s = richness(counts);
    let u = counts
        .iter()
        .map(|&c| (c as f64) * (c as f64))
        .sum::<f64>()
        .sqrt();
    u / ((n - s + 1.0).powi(2) + s - 1.0).sqrt()
}

/// Robbins' estimator of the probability of an unobserved feature,
/// f1 / (N + 1).
pub fn robbins(counts: &[u64]) -> f64 {
    singles(counts) / (total_f64(counts) + 1.0)
}

/// Strong's dominance index: the largest gap between the cumulative
/// abundance curve and the even-community expectation.
pub fn strong(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    let s = richness(counts);
    let mut sorted: Vec<u64> = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut cumulative = 0u64;
    let mut max_gap = f64::NEG_INFINITY;
    for (i, &c) in sorted.iter().enumerate() {
        cumulative += c;
        let gap = cumulative as f64 / n - (i as f64 + 1.0) / s;
        if gap > max_gap {
            max_gap = gap;
        }
    }
    max_gap
}

/// Good's coverage estimator 1 - f1 / N.
pub fn goods_coverage(counts: &[u64]) -> f64 {
    1.0 - singles(counts) / total_f64(counts)
}

/// Fisher's alpha, the solution of S = a ln(1 + N/a).
///
/// The left side is increasing in `a` and approaches N, so a solution
/// exists only for S < N; otherwise NaN. Solved by bisection.
pub fn fisher_alpha(counts: &[u64]) -> f64 {
    let n = total_f64(counts);
    let s = richness(counts);
    if s >= n {
        return f64::NAN;
    }

    let f = |a: f64| a * (1.0 + n / a).ln() - s;

    let mut lo = 1e-9;
    let mut hi = 1.0;
    while f(hi) < 0.0 {
        hi *= 2.0;
        if hi > 1e12 {
            return f64::NAN;
        }
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if f(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Gini index of the count distribution (trapezoid rule on the Lorenz
/// curve over the full feature vector, zeros included).
pub fn gini_index(counts: &[u64]) -> f64 {
    let n_bins = counts.len() as f64;
    let total = total_f64(counts);
    let mut sorted: Vec<u64> = counts.to_vec();
    sorted.sort_unstable();

    let mut cumulative = 0u64;
    let mut prev_y = 0.0;
    let mut area = 0.0;
    for &c in &sorted {
        cumulative += c;
        let y = cumulative as f64 / total;
        area += (prev_y + y) / 2.0 / n_bins;
        prev_y = y;
    }
    1.0 - 2.0 * area
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation (g = 7, n = 9).
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut sum = COEFFS[0];
        for (i, &c) in COEFFS[1..].iter().enumerate() {
            sum += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5;
        0.5 * (2.0 * std::f64::consts::PI).ln() + t.ln() * (x + 0.5) - t + sum.ln()
    }
}
