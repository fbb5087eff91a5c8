//! Held-out evaluation: predictions in, metrics and a report out.

use chrono::NaiveDateTime;
use sentiscope_ai::LinearHead;
use sentiscope_core::{
    ConfusionMatrix, EvaluationMetrics, EvaluationReport, Prediction, Sentiment, roc_auc,
    roc_curve,
};

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub metrics: EvaluationMetrics,
    /// `None` when the test set holds a single class.
    pub roc_auc: Option<f64>,
    /// `(fpr, tpr)` points; `None` alongside `roc_auc`.
    pub roc_curve: Option<Vec<(f64, f64)>>,
    pub test_size: usize,
}

impl Evaluation {
    pub fn report(
        &self,
        timestamp: NaiveDateTime,
        model: impl Into<String>,
        epochs: Option<usize>,
        notes: Vec<String>,
    ) -> EvaluationReport {
        EvaluationReport {
            timestamp,
            model: model.into(),
            metrics: self.metrics,
            confusion: self.confusion,
            roc_auc: self.roc_auc,
            test_size: self.test_size,
            epochs,
            notes,
        }
    }
}

/// Score predictions against ground truth (positive class = positive sentiment).
pub fn evaluate_predictions(truth: &[Sentiment], predictions: &[Prediction]) -> Evaluation {
    let confusion = ConfusionMatrix::from_pairs(
        truth
            .iter()
            .copied()
            .zip(predictions.iter().map(|p| p.label)),
    );
    let scores: Vec<f32> = predictions
        .iter()
        .map(Prediction::positive_probability)
        .collect();
    Evaluation {
        metrics: confusion.metrics(),
        confusion,
        roc_auc: roc_auc(truth, &scores),
        roc_curve: roc_curve(truth, &scores),
        test_size: truth.len().min(predictions.len()),
    }
}

/// Predict with `head` on pooled features, then score.
pub fn evaluate_head(
    head: &LinearHead,
    features: &[Vec<f32>],
    truth: &[Sentiment],
) -> anyhow::Result<Evaluation> {
    anyhow::ensure!(
        features.len() == truth.len(),
        "{} feature rows for {} labels",
        features.len(),
        truth.len()
    );
    let predictions = features
        .iter()
        .map(|x| {
            let logits = head.logits(x)?;
            Prediction::from_logits(&logits, &Sentiment::DEFAULT_LABELS)
                .ok_or_else(|| anyhow::anyhow!("unusable logits {logits:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(evaluate_predictions(truth, &predictions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentiscope_core::Sentiment::{Negative as N, Positive as P};

    fn pred(label: Sentiment, confidence: f32) -> Prediction {
        Prediction { label, confidence }
    }

    #[test]
    fn metrics_from_mixed_predictions() {
        let truth = [P, P, N, N];
        let predictions = [pred(P, 0.9), pred(N, 0.6), pred(N, 0.8), pred(P, 0.55)];
        let eval = evaluate_predictions(&truth, &predictions);

        assert_eq!(eval.confusion.true_positive, 1);
        assert_eq!(eval.confusion.false_negative, 1);
        assert_eq!(eval.confusion.true_negative, 1);
        assert_eq!(eval.confusion.false_positive, 1);
        assert!((eval.metrics.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(eval.test_size, 4);
        // Positive scores: 0.9, 0.4 | 0.2, 0.55 -> 3 of 4 pairs ordered correctly.
        assert!((eval.roc_auc.unwrap() - 0.75).abs() < 1e-9);
        let curve = eval.roc_curve.unwrap();
        assert_eq!(curve.first(), Some(&(0.0, 0.0)));
        assert_eq!(curve.last(), Some(&(1.0, 1.0)));
    }

    #[test]
    fn single_class_has_no_curve() {
        let eval = evaluate_predictions(&[P, P], &[pred(P, 0.9), pred(N, 0.7)]);
        assert_eq!(eval.roc_auc, None);
        assert_eq!(eval.roc_curve, None);
    }

    #[test]
    fn head_evaluation_uses_default_label_order() {
        let head = LinearHead {
            weights: vec![vec![-1.0], vec![1.0]],
            bias: vec![0.0, 0.0],
        };
        let eval = evaluate_head(&head, &[vec![2.0], vec![-2.0]], &[P, N]).unwrap();
        assert_eq!(eval.metrics.accuracy, 1.0);
        assert_eq!(eval.roc_auc, Some(1.0));
    }

    #[test]
    fn report_carries_metrics() {
        let eval = evaluate_predictions(&[P, N], &[pred(P, 0.9), pred(N, 0.9)]);
        let ts = chrono::NaiveDate::from_ymd_opt(2025, 3, 17)
            .and_then(|d| d.and_hms_opt(8, 15, 0))
            .unwrap();
        let report = eval.report(ts, "test model", Some(3), vec![]);
        assert_eq!(report.file_name(), "results_20250317_081500.txt");
        assert!(report.render().contains("- accuracy: 1.0000"));
    }
}
