//! # Per-Feature Fuzzy C-Means
//!
//! This module fits a fuzzy partition over one feature's observed values and
//! converts it into the parameters of that feature's Gaussian membership
//! functions. It is the unsupervised half of the build phase: nothing here
//! knows about rules, records, or the output variable.
//!
//! The optimizer is plain fuzzy c-means (Bezdek): alternate between
//! fuzzification-weighted center updates and inverse-distance membership
//! updates until the membership matrix stops moving. Initialization is
//! deterministic — initial centers sit at the `(j + 0.5)/k` quantiles of the
//! sorted sample — so a fit is bit-reproducible for a given input.

use crate::config::FcmParams;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fitted fuzzy partition of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    /// Cluster centers, strictly ascending.
    pub centers: Vec<f64>,
    /// Per-cluster Gaussian widths, parallel to `centers`, all positive.
    pub sigmas: Vec<f64>,
    /// Fuzzy partition coefficient in `[1/k, 1]`; higher means a crisper
    /// partition.
    pub fpc: f64,
}

impl ClusterModel {
    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centers.len()
    }
}

/// A comprehensive error type for the clustering stage.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster count must be at least 1")]
    InvalidClusterCount,

    #[error("fuzziness exponent must be strictly greater than 1, got {0}")]
    InvalidFuzziness(f64),

    #[error("cannot cluster an empty sample vector")]
    EmptyInput,

    #[error("sample vector contains a non-finite value")]
    NonFiniteValue,

    #[error(
        "degenerate partition: {k} cluster(s) requested over {distinct} distinct value(s)"
    )]
    DegenerateCluster { k: usize, distinct: usize },

    #[error("clusters collapsed during optimization; centers are not strictly separated")]
    CollapsedCenters,
}

/// Fits `k` fuzzy clusters over `values` and derives per-cluster sigmas.
///
/// Fails with [`ClusterError::DegenerateCluster`] when the feature has zero
/// variance or fewer distinct values than requested clusters — no meaningful
/// partition exists in either case.
pub fn fit(values: &[f64], k: usize, params: &FcmParams) -> Result<ClusterModel, ClusterError> {
    if k == 0 {
        return Err(ClusterError::InvalidClusterCount);
    }
    if params.fuzziness <= 1.0 {
        return Err(ClusterError::InvalidFuzziness(params.fuzziness));
    }
    if values.is_empty() {
        return Err(ClusterError::EmptyInput);
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ClusterError::NonFiniteValue);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let distinct = 1 + sorted.iter().tuple_windows().filter(|(a, b)| a != b).count();
    if distinct < 2 || k > distinct {
        return Err(ClusterError::DegenerateCluster { k, distinct });
    }

    let mut centers = internal::quantile_seeds(&sorted, k);
    let mut u = internal::membership_update(values, &centers, params.fuzziness);

    for _ in 0..params.max_iterations {
        centers = internal::weighted_centers(values, &u, params.fuzziness, &centers);
        let next = internal::membership_update(values, &centers, params.fuzziness);
        let delta = next
            .iter()
            .zip(u.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        u = next;
        if delta < params.tolerance {
            break;
        }
    }

    let n = values.len() as f64;
    let fpc = u.mapv(|x| x * x).sum() / n;

    centers.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if centers.iter().tuple_windows().any(|(a, b)| b <= a) {
        return Err(ClusterError::CollapsedCenters);
    }

    let sigmas = internal::derive_sigmas(&centers, values);
    Ok(ClusterModel {
        centers,
        sigmas,
        fpc,
    })
}

mod internal {
    use itertools::Itertools;
    use ndarray::Array2;

    /// Deterministic seeding: centers at the `(j + 0.5)/k` quantiles of the
    /// sorted sample (linear interpolation between order statistics).
    pub(super) fn quantile_seeds(sorted: &[f64], k: usize) -> Vec<f64> {
        let n = sorted.len();
        (0..k)
            .map(|j| {
                let p = (j as f64 + 0.5) / k as f64;
                let float_idx = (n as f64 - 1.0) * p;
                let lower = float_idx.floor() as usize;
                let upper = float_idx.ceil() as usize;
                if lower == upper {
                    sorted[lower]
                } else {
                    let fraction = float_idx - lower as f64;
                    sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
                }
            })
            .collect()
    }

    /// Fuzzification-weighted means: `c_j = Σ u_ij^m x_i / Σ u_ij^m`.
    /// A cluster that has lost all of its membership mass keeps its previous
    /// center.
    pub(super) fn weighted_centers(
        values: &[f64],
        u: &Array2<f64>,
        m: f64,
        previous: &[f64],
    ) -> Vec<f64> {
        let (n, k) = u.dim();
        (0..k)
            .map(|j| {
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for i in 0..n {
                    let w = u[[i, j]].powf(m);
                    numerator += w * values[i];
                    denominator += w;
                }
                if denominator > 0.0 {
                    numerator / denominator
                } else {
                    previous[j]
                }
            })
            .collect()
    }

    /// Standard FCM membership update from distances to all centers, with the
    /// exact-match rule: a sample sitting on a center belongs to that cluster
    /// with degree 1.
    pub(super) fn membership_update(values: &[f64], centers: &[f64], m: f64) -> Array2<f64> {
        let n = values.len();
        let k = centers.len();
        let exponent = 2.0 / (m - 1.0);
        let mut u = Array2::zeros((n, k));

        for (i, &x) in values.iter().enumerate() {
            let distances: Vec<f64> = centers.iter().map(|&c| (x - c).abs()).collect();
            if let Some(hit) = distances.iter().position(|&d| d == 0.0) {
                u[[i, hit]] = 1.0;
                continue;
            }
            for j in 0..k {
                let denominator: f64 = distances
                    .iter()
                    .map(|&d| (distances[j] / d).powf(exponent))
                    .sum();
                u[[i, j]] = 1.0 / denominator;
            }
        }
        u
    }

    /// Sigma rule for the derived Gaussian membership functions: with more
    /// than one cluster, 40% of the mean gap between consecutive centers,
    /// applied uniformly; with a single cluster, half the sample standard
    /// deviation.
    pub(super) fn derive_sigmas(sorted_centers: &[f64], values: &[f64]) -> Vec<f64> {
        let k = sorted_centers.len();
        if k > 1 {
            let mean_gap = sorted_centers
                .iter()
                .tuple_windows()
                .map(|(a, b)| b - a)
                .sum::<f64>()
                / (k as f64 - 1.0);
            vec![0.4 * mean_gap; k]
        } else {
            vec![sample_stddev(values) / 2.0]
        }
    }

    /// Sample standard deviation (ddof = 1).
    fn sample_stddev(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    }
}
