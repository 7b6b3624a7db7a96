//! # Batch Diagnostics
//!
//! Classification metrics derivable from a scored batch and its ground-truth
//! labels, without re-running inference: confusion counts at a fixed decision
//! threshold, the usual scalar metrics, and ROC operating points with
//! trapezoidal AUC. Consumed by reporting layers; the engine itself never
//! reads any of this.

use crate::threshold::CalibrationError;
use serde::Serialize;

/// Binary confusion counts at a fixed decision threshold
/// (`score >= threshold` predicts positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn from_scores(
        scores: &[f64],
        labels: &[u8],
        threshold: f64,
    ) -> Result<Self, CalibrationError> {
        if scores.len() != labels.len() {
            return Err(CalibrationError::LengthMismatch {
                scores: scores.len(),
                labels: labels.len(),
            });
        }
        let mut matrix = Self {
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        };
        for (&score, &label) in scores.iter().zip(labels) {
            match (score >= threshold, label != 0) {
                (true, true) => matrix.true_positives += 1,
                (true, false) => matrix.false_positives += 1,
                (false, false) => matrix.true_negatives += 1,
                (false, true) => matrix.false_negatives += 1,
            }
        }
        Ok(matrix)
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Fraction of correct predictions; 0 on an empty batch.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positives + self.true_negatives) as f64 / total as f64
    }

    /// TP / (TP + FP); 0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        let predicted_positive = self.true_positives + self.false_positives;
        if predicted_positive == 0 {
            return 0.0;
        }
        self.true_positives as f64 / predicted_positive as f64
    }

    /// TP / (TP + FN); 0 when no positives exist.
    pub fn recall(&self) -> f64 {
        let actual_positive = self.true_positives + self.false_negatives;
        if actual_positive == 0 {
            return 0.0;
        }
        self.true_positives as f64 / actual_positive as f64
    }

    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

/// One operating point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// ROC operating points, ascending by false-positive rate. The first point is
/// the all-negative classifier (threshold +inf); the last, at the minimum
/// observed score, predicts everything positive.
pub fn roc_points(scores: &[f64], labels: &[u8]) -> Result<Vec<RocPoint>, CalibrationError> {
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
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(CalibrationError::SingleClass);
    }

    let mut thresholds = scores.to_vec();
    thresholds.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    thresholds.dedup();

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    for &threshold in &thresholds {
        let mut tp = 0usize;
        let mut fp = 0usize;
        for (&score, &label) in scores.iter().zip(labels) {
            if score >= threshold {
                if label != 0 {
                    tp += 1;
                } else {
                    fp += 1;
                }
            }
        }
        points.push(RocPoint {
            threshold,
            false_positive_rate: fp as f64 / negatives as f64,
            true_positive_rate: tp as f64 / positives as f64,
        });
    }
    Ok(points)
}

/// Area under the ROC curve by the trapezoid rule. Expects points ascending
/// by false-positive rate, as produced by [`roc_points`].
pub fn roc_auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            let width = pair[1].false_positive_rate - pair[0].false_positive_rate;
            let height = (pair[0].true_positive_rate + pair[1].true_positive_rate) / 2.0;
            width * height
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn confusion_counts_are_exact() {
        let scores = [10.0, 40.0, 60.0, 90.0];
        let labels = [0, 1, 0, 1];
        let matrix = ConfusionMatrix::from_scores(&scores, &labels, 50.0).unwrap();
        assert_eq!(matrix.true_positives, 1); // 90
        assert_eq!(matrix.false_positives, 1); // 60
        assert_eq!(matrix.true_negatives, 1); // 10
        assert_eq!(matrix.false_negatives, 1); // 40
        assert_relative_eq!(matrix.accuracy(), 0.5);
        assert_relative_eq!(matrix.precision(), 0.5);
        assert_relative_eq!(matrix.recall(), 0.5);
        assert_relative_eq!(matrix.f1(), 0.5);
    }

    #[test]
    fn degenerate_denominators_give_zero_not_nan() {
        let matrix = ConfusionMatrix::from_scores(&[10.0, 20.0], &[1, 1], 50.0).unwrap();
        assert_eq!(matrix.precision(), 0.0);
        assert_eq!(matrix.f1(), 0.0);
        let empty = ConfusionMatrix::from_scores(&[], &[], 50.0).unwrap();
        assert_eq!(empty.accuracy(), 0.0);
    }

    #[test]
    fn perfect_separation_has_unit_auc() {
        let scores = [10.0, 20.0, 80.0, 90.0];
        let labels = [0, 0, 1, 1];
        let points = roc_points(&scores, &labels).unwrap();
        assert_relative_eq!(roc_auc(&points), 1.0, max_relative = 1e-12);
        // Endpoints span the full curve.
        assert_eq!(points.first().unwrap().false_positive_rate, 0.0);
        assert_eq!(points.last().unwrap().false_positive_rate, 1.0);
        assert_eq!(points.last().unwrap().true_positive_rate, 1.0);
    }

    #[test]
    fn random_ordering_gives_half_auc() {
        // Scores identical across classes: the curve is the diagonal.
        let scores = [50.0, 50.0, 50.0, 50.0];
        let labels = [0, 1, 0, 1];
        let points = roc_points(&scores, &labels).unwrap();
        assert_relative_eq!(roc_auc(&points), 0.5, max_relative = 1e-12);
    }

    #[test]
    fn roc_rejects_single_class() {
        assert!(matches!(
            roc_points(&[1.0, 2.0], &[1, 1]),
            Err(CalibrationError::SingleClass)
        ));
    }
}
