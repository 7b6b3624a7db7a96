//! # Score Calibration
//!
//! Turns a batch of crisp scores into decision machinery: an F1-optimal
//! binary threshold (supervised, needs labels) and two category boundaries
//! splitting the score scale into Low / Medium / High bands (unsupervised,
//! 1-D k-means over the scores). Both consume only the engine's output type,
//! never its internals.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Calibration failures. Fatal to the calibration call only; scoring is
/// unaffected.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("scores and labels differ in length: {scores} vs {labels}")]
    LengthMismatch { scores: usize, labels: usize },

    #[error("cannot calibrate from an empty score vector")]
    EmptyScores,

    #[error("binary threshold selection needs both outcome classes present")]
    SingleClass,

    #[error("category boundaries need at least {required} distinct scores, got {got}")]
    TooFewDistinctScores { required: usize, got: usize },
}

/// Three-way risk banding of a crisp score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        })
    }
}

/// Calibrated decision thresholds over the score scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdModel {
    pub low_medium_threshold: f64,
    pub medium_high_threshold: f64,
    pub optimal_binary_threshold: f64,
}

impl ThresholdModel {
    /// Half-open banding: `score < low_medium` is Low, `score >= medium_high`
    /// is High, everything between is Medium.
    pub fn categorize(&self, score: f64) -> RiskCategory {
        if score < self.low_medium_threshold {
            RiskCategory::Low
        } else if score < self.medium_high_threshold {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }

    /// Binary decision at the F1-optimal threshold.
    pub fn decide(&self, score: f64) -> bool {
        score >= self.optimal_binary_threshold
    }
}

/// Sweeps the distinct observed scores as candidate thresholds and returns
/// the first (lowest) one maximizing `F1 = 2PR / (P + R)`, treating
/// `score >= threshold` as a positive prediction. F1 is taken as 0 where
/// `P + R` is 0.
pub fn optimal_f1_threshold(scores: &[f64], labels: &[u8]) -> Result<f64, CalibrationError> {
    if scores.len() != labels.len() {
        return Err(CalibrationError::LengthMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    if scores.is_empty() {
        return Err(CalibrationError::EmptyScores);
    }
    let positives = labels.iter().filter(|&&l| l != 0).count();
    if positives == 0 || positives == labels.len() {
        return Err(CalibrationError::SingleClass);
    }

    let candidates = internal::sorted_distinct(scores);
    let mut best_threshold = candidates[0];
    let mut best_f1 = -1.0;
    for &threshold in &candidates {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&score, &label) in scores.iter().zip(labels) {
            if score >= threshold {
                if label != 0 {
                    tp += 1;
                } else {
                    fp += 1;
                }
            } else if label != 0 {
                fn_ += 1;
            }
        }
        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        if f1 > best_f1 {
            best_f1 = f1;
            best_threshold = threshold;
        }
    }
    Ok(best_threshold)
}

/// Unsupervised three-way banding: k-means with exactly 3 clusters over the
/// score vector; the boundaries are the midpoints between consecutive sorted
/// centers.
pub fn category_boundaries(scores: &[f64]) -> Result<(f64, f64), CalibrationError> {
    let distinct = internal::sorted_distinct(scores);
    if distinct.len() < 3 {
        return Err(CalibrationError::TooFewDistinctScores {
            required: 3,
            got: distinct.len(),
        });
    }
    let centers = internal::kmeans_1d(scores, 3);
    Ok((
        (centers[0] + centers[1]) / 2.0,
        (centers[1] + centers[2]) / 2.0,
    ))
}

/// Full calibration: F1-optimal binary threshold plus category boundaries.
pub fn calibrate(scores: &[f64], labels: &[u8]) -> Result<ThresholdModel, CalibrationError> {
    let optimal_binary_threshold = optimal_f1_threshold(scores, labels)?;
    let (low_medium_threshold, medium_high_threshold) = category_boundaries(scores)?;
    Ok(ThresholdModel {
        low_medium_threshold,
        medium_high_threshold,
        optimal_binary_threshold,
    })
}

mod internal {
    pub(super) fn sorted_distinct(values: &[f64]) -> Vec<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        sorted.dedup();
        sorted
    }

    /// Lloyd's algorithm in one dimension with deterministic quantile
    /// seeding. Assignment ties break toward the lower-indexed center; an
    /// emptied cluster keeps its previous center.
    pub(super) fn kmeans_1d(values: &[f64], k: usize) -> Vec<f64> {
        const MAX_SWEEPS: usize = 300;

        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let mut centers: Vec<f64> = (0..k)
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
            .collect();

        let mut assignment = vec![0usize; values.len()];
        for _ in 0..MAX_SWEEPS {
            let mut changed = false;
            for (i, &x) in values.iter().enumerate() {
                let mut best = 0usize;
                let mut best_distance = f64::INFINITY;
                for (j, &c) in centers.iter().enumerate() {
                    let distance = (x - c).abs();
                    if distance < best_distance {
                        best_distance = distance;
                        best = j;
                    }
                }
                if assignment[i] != best {
                    assignment[i] = best;
                    changed = true;
                }
            }
            for (j, center) in centers.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut count = 0usize;
                for (i, &x) in values.iter().enumerate() {
                    if assignment[i] == j {
                        sum += x;
                        count += 1;
                    }
                }
                if count > 0 {
                    *center = sum / count as f64;
                }
            }
            if !changed {
                break;
            }
        }
        centers.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        centers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn f1_round_trip_on_separable_scores() {
        let scores = [10.0, 20.0, 80.0, 90.0];
        let labels = [0, 0, 1, 1];
        let threshold = optimal_f1_threshold(&scores, &labels).unwrap();
        assert!(
            threshold > 20.0 && threshold <= 80.0,
            "threshold {threshold} outside (20, 80]"
        );
        // At that threshold the split is perfect.
        let correct = scores
            .iter()
            .zip(&labels)
            .filter(|&(&s, &l)| (s >= threshold) == (l != 0))
            .count();
        assert_eq!(correct, 4);
    }

    #[test]
    fn tie_break_picks_the_lowest_threshold() {
        // Thresholds 1.0 and 4.0 both reach the maximum F1 of 2/3 here
        // (P=0.5/R=1 vs P=1/R=0.5); the sweep must return the lowest.
        let scores = [1.0, 2.0, 3.0, 4.0];
        let labels = [1, 0, 0, 1];
        assert_eq!(optimal_f1_threshold(&scores, &labels).unwrap(), 1.0);
    }

    #[test]
    fn single_class_labels_are_rejected() {
        let scores = [10.0, 20.0, 30.0];
        assert!(matches!(
            optimal_f1_threshold(&scores, &[1, 1, 1]),
            Err(CalibrationError::SingleClass)
        ));
        assert!(matches!(
            optimal_f1_threshold(&scores, &[0, 0, 0]),
            Err(CalibrationError::SingleClass)
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(matches!(
            optimal_f1_threshold(&[1.0, 2.0], &[0]),
            Err(CalibrationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn boundaries_split_three_tight_clusters() {
        let mut scores = Vec::new();
        for d in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            scores.push(10.0 + d);
            scores.push(50.0 + d);
            scores.push(90.0 + d);
        }
        let (low_medium, medium_high) = category_boundaries(&scores).unwrap();
        assert_relative_eq!(low_medium, 30.0, epsilon = 1.0);
        assert_relative_eq!(medium_high, 70.0, epsilon = 1.0);

        let model = ThresholdModel {
            low_medium_threshold: low_medium,
            medium_high_threshold: medium_high,
            optimal_binary_threshold: 50.0,
        };
        for &s in &scores {
            let expected = if s < 30.0 {
                RiskCategory::Low
            } else if s < 70.0 {
                RiskCategory::Medium
            } else {
                RiskCategory::High
            };
            assert_eq!(model.categorize(s), expected, "score {s}");
        }
    }

    #[test]
    fn too_few_distinct_scores_are_rejected() {
        assert!(matches!(
            category_boundaries(&[5.0, 5.0, 7.0, 7.0]),
            Err(CalibrationError::TooFewDistinctScores { got: 2, .. })
        ));
    }

    #[test]
    fn category_assignment_is_half_open() {
        let model = ThresholdModel {
            low_medium_threshold: 30.0,
            medium_high_threshold: 70.0,
            optimal_binary_threshold: 55.0,
        };
        assert_eq!(model.categorize(29.999), RiskCategory::Low);
        assert_eq!(model.categorize(30.0), RiskCategory::Medium);
        assert_eq!(model.categorize(69.999), RiskCategory::Medium);
        assert_eq!(model.categorize(70.0), RiskCategory::High);
        assert!(!model.decide(54.9));
        assert!(model.decide(55.0));
    }

    #[test]
    fn calibrate_combines_both_contracts() {
        let scores = [8.0, 12.0, 48.0, 52.0, 88.0, 92.0];
        let labels = [0, 0, 0, 1, 1, 1];
        let model = calibrate(&scores, &labels).unwrap();
        assert!(model.low_medium_threshold < model.medium_high_threshold);
        assert!(model.optimal_binary_threshold > 48.0);
        assert!(model.optimal_binary_threshold <= 52.0);
    }
}
