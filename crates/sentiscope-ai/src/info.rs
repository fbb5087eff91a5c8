//! Model metadata: `config.json` parsing and the `model_info.json` sidecar.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use sentiscope_core::Sentiment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Optional metrics sidecar stored next to the model weights.
pub const SIDECAR_FILE: &str = "model_info.json";

/// Hugging Face `config.json`, reduced to the fields we report or need.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_type: String,
    /// DistilBERT configs call this `dim`.
    #[serde(default, alias = "dim")]
    pub hidden_size: usize,
    #[serde(default)]
    pub vocab_size: usize,
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

impl ModelConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))
    }

    /// Class index → sentiment, ordered by index.
    ///
    /// Falls back to `[negative, positive]` when `id2label` is absent or holds
    /// labels that are not sentiments.
    pub fn labels(&self) -> Vec<Sentiment> {
        let mut indexed: Vec<(usize, Sentiment)> = Vec::with_capacity(self.id2label.len());
        for (id, label) in &self.id2label {
            match (id.parse::<usize>(), label.parse::<Sentiment>()) {
                (Ok(i), Ok(s)) => indexed.push((i, s)),
                _ => return Sentiment::DEFAULT_LABELS.to_vec(),
            }
        }
        if indexed.is_empty() {
            return Sentiment::DEFAULT_LABELS.to_vec();
        }
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, s)| s).collect()
    }

    pub fn num_labels(&self) -> usize {
        if self.id2label.is_empty() {
            Sentiment::DEFAULT_LABELS.len()
        } else {
            self.id2label.len()
        }
    }
}

/// Where the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        })
    }
}

/// Whether the loaded weights came from our training job or a public checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelOrigin {
    FineTuned,
    Pretrained,
}

impl ModelOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FineTuned => "fine-tuned",
            Self::Pretrained => "pretrained",
        }
    }
}

/// Architecture metadata reported by the model-info endpoint.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub model_type: String,
    pub hidden_size: usize,
    pub num_labels: usize,
    pub vocab_size: usize,
    pub device: Device,
    pub source: ModelOrigin,
    pub max_length: usize,
    /// Contents of `model_info.json`, if one was found.
    pub sidecar: Option<Map<String, Value>>,
}

impl ModelInfo {
    /// Flatten into a JSON object; sidecar keys are added last and win.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("model_type".into(), Value::from(self.model_type));
        map.insert("hidden_size".into(), Value::from(self.hidden_size));
        map.insert("num_labels".into(), Value::from(self.num_labels));
        map.insert("vocab_size".into(), Value::from(self.vocab_size));
        map.insert("device".into(), Value::from(self.device.to_string()));
        map.insert("source".into(), Value::from(self.source.as_str()));
        map.insert("max_length".into(), Value::from(self.max_length));
        if let Some(sidecar) = self.sidecar {
            map.extend(sidecar);
        }
        map
    }
}

/// [`read_sidecar`] on the blocking pool, for use from request handlers.
pub async fn read_sidecar_blocking(model_dir: PathBuf) -> Option<Map<String, Value>> {
    match tokio::task::spawn_blocking(move || read_sidecar(&model_dir)).await {
        Ok(sidecar) => sidecar,
        Err(e) => {
            warn!(error = %e, "sidecar read task failed");
            None
        }
    }
}

/// Read `model_info.json` from `model_dir`.
///
/// A missing file is `None`; an unreadable or non-object file is logged and
/// treated as missing.
pub fn read_sidecar(model_dir: &Path) -> Option<Map<String, Value>> {
    let path = model_dir.join(SIDECAR_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "model sidecar is not a JSON object");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse model sidecar");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distilbert_config_uses_dim() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{
                "model_type": "distilbert",
                "dim": 768,
                "vocab_size": 30522,
                "id2label": {"0": "NEGATIVE", "1": "POSITIVE"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.hidden_size, 768);
        assert_eq!(cfg.num_labels(), 2);
        assert_eq!(cfg.labels(), vec![Sentiment::Negative, Sentiment::Positive]);
    }

    #[test]
    fn labels_follow_numeric_order() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"id2label": {"1": "negative", "0": "positive"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.labels(), vec![Sentiment::Positive, Sentiment::Negative]);
    }

    #[test]
    fn unknown_labels_fall_back() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"id2label": {"0": "joy", "1": "anger"}}"#).unwrap();
        assert_eq!(cfg.labels(), Sentiment::DEFAULT_LABELS.to_vec());
    }

    #[test]
    fn sidecar_overrides_base_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SIDECAR_FILE),
            r#"{"accuracy": 0.93, "device": "tpu"}"#,
        )
        .unwrap();

        let info = ModelInfo {
            model_type: "distilbert".into(),
            hidden_size: 768,
            num_labels: 2,
            vocab_size: 30522,
            device: Device::Cpu,
            source: ModelOrigin::FineTuned,
            max_length: 512,
            sidecar: read_sidecar(dir.path()),
        };
        let map = info.into_map();
        assert_eq!(map["accuracy"], 0.93);
        assert_eq!(map["device"], "tpu");
        assert_eq!(map["source"], "fine-tuned");
        assert_eq!(map["hidden_size"], 768);
    }

    #[tokio::test]
    async fn sidecar_read_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_sidecar_blocking(dir.path().to_path_buf()).await, None);

        std::fs::write(dir.path().join(SIDECAR_FILE), r#"{"f1_score": 0.88}"#).unwrap();
        let sidecar = read_sidecar_blocking(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(sidecar["f1_score"], 0.88);
    }

    #[test]
    fn malformed_sidecar_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SIDECAR_FILE), "[1, 2]").unwrap();
        assert!(read_sidecar(dir.path()).is_none());
        assert!(read_sidecar(&dir.path().join("missing")).is_none());
    }
}
