//! Binary classification metrics: confusion matrix, accuracy/precision/recall/F1,
//! per-class scores, ROC curve and AUC.
//!
//! The positive class is [`Sentiment::Positive`]. Undefined ratios (zero
//! denominators) are reported as 0.0.

use serde::{Deserialize, Serialize};

use crate::Sentiment;

/// 2×2 counts of predictions against ground truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    /// Count `(truth, predicted)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Sentiment, Sentiment)>,
    {
        let mut cm = Self::default();
        for (truth, predicted) in pairs {
            match (truth.is_positive(), predicted.is_positive()) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Rows are true labels, columns predicted labels, both in
    /// `[negative, positive]` order.
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    pub fn metrics(&self) -> EvaluationMetrics {
        let tp = self.true_positive as f64;
        let fp = self.false_positive as f64;
        let fnn = self.false_negative as f64;

        let accuracy = ratio((self.true_positive + self.true_negative) as f64, self.total() as f64);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fnn);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        EvaluationMetrics {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

impl ConfusionMatrix {
    /// Scores with each label in turn treated as the positive class,
    /// `[negative, positive]`.
    pub fn per_class(&self) -> [ClassScores; 2] {
        let negative = ClassScores::from_counts(
            Sentiment::Negative,
            self.true_negative,
            self.false_negative,
            self.false_positive,
        );
        let positive = ClassScores::from_counts(
            Sentiment::Positive,
            self.true_positive,
            self.false_positive,
            self.false_negative,
        );
        [negative, positive]
    }
}

/// One row of a classification report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label: Sentiment,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of samples whose true label is `label`.
    pub support: usize,
}

impl ClassScores {
    fn from_counts(label: Sentiment, hits: usize, false_alarms: usize, misses: usize) -> Self {
        let tp = hits as f64;
        let precision = ratio(tp, tp + false_alarms as f64);
        let recall = ratio(tp, tp + misses as f64);
        Self {
            label,
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            support: hits + misses,
        }
    }
}

/// Headline scores for a held-out evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Area under the ROC curve for positive-class scores.
///
/// Computed as the Mann–Whitney U statistic: the probability that a random
/// positive is scored above a random negative, ties counting one half.
/// Returns `None` if either class is absent.
pub fn roc_auc(truth: &[Sentiment], positive_scores: &[f32]) -> Option<f64> {
    let mut scored: Vec<(f32, bool)> = positive_scores
        .iter()
        .copied()
        .zip(truth.iter().map(Sentiment::is_positive))
        .collect();
    let positives = scored.iter().filter(|(_, p)| *p).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Average ranks (1-based) over runs of tied scores.
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < scored.len() {
        let mut j = i;
        while j + 1 < scored.len() && scored[j + 1].0 == scored[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for item in &scored[i..=j] {
            if item.1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n))
}

/// ROC curve points `(false_positive_rate, true_positive_rate)` for
/// positive-class scores, from `(0, 0)` to `(1, 1)`.
///
/// One point per distinct score threshold, highest first. Returns `None` if
/// either class is absent.
pub fn roc_curve(truth: &[Sentiment], positive_scores: &[f32]) -> Option<Vec<(f64, f64)>> {
    let mut scored: Vec<(f32, bool)> = positive_scores
        .iter()
        .copied()
        .zip(truth.iter().map(Sentiment::is_positive))
        .collect();
    let positives = scored.iter().filter(|(_, p)| *p).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![(0.0, 0.0)];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (i, (score, positive)) in scored.iter().enumerate() {
        if *positive {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_threshold = scored.get(i + 1).is_none_or(|next| next.0 != *score);
        if last_of_threshold {
            points.push((fp as f64 / negatives as f64, tp as f64 / positives as f64));
        }
    }
    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sentiment::{Negative as N, Positive as P};

    #[test]
    fn confusion_counts() {
        let cm = ConfusionMatrix::from_pairs([(P, P), (P, N), (N, N), (N, P), (N, N)]);
        assert_eq!(cm.true_positive, 1);
        assert_eq!(cm.false_negative, 1);
        assert_eq!(cm.true_negative, 2);
        assert_eq!(cm.false_positive, 1);
        assert_eq!(cm.total(), 5);
        assert_eq!(cm.as_rows(), [[2, 1], [1, 1]]);
    }

    #[test]
    fn metrics_from_counts() {
        let cm = ConfusionMatrix {
            true_positive: 450,
            false_positive: 35,
            true_negative: 465,
            false_negative: 50,
        };
        let m = cm.metrics();
        assert!((m.accuracy - 0.915).abs() < 1e-9);
        assert!((m.precision - 450.0 / 485.0).abs() < 1e-9);
        assert!((m.recall - 0.9).abs() < 1e-9);
        let expected_f1 = 2.0 * m.precision * m.recall / (m.precision + m.recall);
        assert!((m.f1 - expected_f1).abs() < 1e-9);
    }

    #[test]
    fn metrics_without_positive_predictions() {
        let cm = ConfusionMatrix::from_pairs([(P, N), (N, N)]);
        let m = cm.metrics();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn empty_matrix_is_all_zero() {
        let m = ConfusionMatrix::default().metrics();
        assert_eq!(m.accuracy, 0.0);
    }

    #[test]
    fn auc_perfect_and_inverted() {
        let truth = [N, N, P, P];
        assert_eq!(roc_auc(&truth, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&truth, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn auc_counts_ties_as_half() {
        let truth = [N, P];
        assert_eq!(roc_auc(&truth, &[0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn per_class_report_rows() {
        let cm = ConfusionMatrix {
            true_positive: 450,
            false_positive: 35,
            true_negative: 465,
            false_negative: 50,
        };
        let [neg, pos] = cm.per_class();
        assert_eq!(neg.label, N);
        assert_eq!(neg.support, 500);
        assert!((neg.precision - 465.0 / 515.0).abs() < 1e-9);
        assert!((neg.recall - 0.93).abs() < 1e-9);
        assert_eq!(pos.support, 500);
        let m = cm.metrics();
        assert_eq!((pos.precision, pos.recall, pos.f1), (m.precision, m.recall, m.f1));
    }

    #[test]
    fn roc_curve_steps_through_thresholds() {
        let truth = [N, N, P, P];
        let perfect = roc_curve(&truth, &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_eq!(
            perfect,
            vec![(0.0, 0.0), (0.0, 0.5), (0.0, 1.0), (0.5, 1.0), (1.0, 1.0)]
        );

        // Tied scores collapse into a single diagonal step.
        let tied = roc_curve(&[N, P], &[0.5, 0.5]).unwrap();
        assert_eq!(tied, vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(roc_curve(&[P], &[0.3]), None);
    }

    #[test]
    fn auc_needs_both_classes() {
        assert_eq!(roc_auc(&[P, P], &[0.1, 0.9]), None);
    }
}
