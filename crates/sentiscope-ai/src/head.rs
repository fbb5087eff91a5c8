//! Linear classification head applied to pooled encoder output.
//!
//! Fine-tuned model directories carry the head as `classifier_head.json`
//! next to the frozen encoder's `model.onnx`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::InferenceError;

pub const HEAD_FILE: &str = "classifier_head.json";

/// `logits = weights · features + bias`, one row of `weights` per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl LinearHead {
    pub fn zeros(num_labels: usize, hidden_size: usize) -> Self {
        Self {
            weights: vec![vec![0.0; hidden_size]; num_labels],
            bias: vec![0.0; num_labels],
        }
    }

    pub fn num_labels(&self) -> usize {
        self.bias.len()
    }

    /// Input width, taken from the first row.
    pub fn hidden_size(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    pub fn logits(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.hidden_size() {
            return Err(InferenceError::Output(format!(
                "head expects {} features, got {}",
                self.hidden_size(),
                features.len()
            )));
        }
        Ok(self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        let head: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
        anyhow::ensure!(
            head.weights.len() == head.bias.len() && !head.bias.is_empty(),
            "{}: {} weight rows for {} biases",
            path.display(),
            head.weights.len(),
            head.bias.len()
        );
        let width = head.hidden_size();
        anyhow::ensure!(
            head.weights.iter().all(|row| row.len() == width),
            "{}: ragged weight rows",
            path.display()
        );
        Ok(head)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logits_are_affine() {
        let head = LinearHead {
            weights: vec![vec![1.0, 0.0], vec![0.0, 2.0]],
            bias: vec![0.5, -1.0],
        };
        assert_eq!(head.logits(&[3.0, 4.0]).unwrap(), vec![3.5, 7.0]);
    }

    #[test]
    fn wrong_width_is_an_error() {
        let head = LinearHead::zeros(2, 3);
        assert!(matches!(head.logits(&[1.0]), Err(InferenceError::Output(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HEAD_FILE);
        let head = LinearHead {
            weights: vec![vec![0.25, -0.5], vec![-0.25, 0.5]],
            bias: vec![0.1, -0.1],
        };
        head.save(&path).unwrap();
        assert_eq!(LinearHead::load(&path).unwrap(), head);
    }

    #[test]
    fn load_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HEAD_FILE);
        std::fs::write(&path, r#"{"weights": [[1.0, 2.0], [1.0]], "bias": [0.0, 0.0]}"#).unwrap();
        assert!(LinearHead::load(&path).is_err());
    }
}
