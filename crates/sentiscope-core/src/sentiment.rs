//! Sentiment labels and soft-max predictions.
//!
//! The classifier is binary: index 0 is negative, index 1 is positive, unless a
//! model's `id2label` mapping says otherwise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A two-valued sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Positive,
}

#[derive(Debug, Error)]
#[error("unknown sentiment label: {0:?}")]
pub struct ParseSentimentError(pub String);

impl Sentiment {
    /// Default label order used when a model does not declare `id2label`.
    pub const DEFAULT_LABELS: [Sentiment; 2] = [Sentiment::Negative, Sentiment::Positive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }

    /// Class index in the default label order.
    pub fn index(&self) -> usize {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::DEFAULT_LABELS.get(index).copied()
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ParseSentimentError;

    /// Accepts `positive`/`negative` in any case, plus the `POS`/`NEG` and
    /// `LABEL_0`/`LABEL_1` spellings found in exported model configs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "negative" | "neg" | "label_0" => Ok(Self::Negative),
            "positive" | "pos" | "label_1" => Ok(Self::Positive),
            _ => Err(ParseSentimentError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Sentiment {
    type Error = ParseSentimentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A classification with the soft-max probability of the chosen class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Sentiment,
    /// Probability of `label`, in `[0, 1]`.
    pub confidence: f32,
}

impl Prediction {
    /// Arg-max over `logits`, mapped through `labels` (index → sentiment).
    ///
    /// Returns `None` when the logits are empty, contain non-finite values, or
    /// the winning index has no label.
    pub fn from_logits(logits: &[f32], labels: &[Sentiment]) -> Option<Self> {
        if logits.is_empty() || logits.iter().any(|x| !x.is_finite()) {
            return None;
        }
        let probs = softmax(logits);
        let (best, &confidence) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        let label = *labels.get(best)?;
        Some(Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// Probability assigned to the positive class (binary models only).
    pub fn positive_probability(&self) -> f32 {
        if self.label.is_positive() {
            self.confidence
        } else {
            1.0 - self.confidence
        }
    }
}

/// Numerically stable soft-max.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}
