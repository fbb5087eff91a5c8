//! Sentiment classifier over an ONNX export.
//!
//! Two layouts are accepted:
//!
//! - a sequence-classification export whose first output is
//!   `logits [batch, num_labels]` (public checkpoints);
//! - an encoder export plus `classifier_head.json`, as written by the training
//!   job. Logits are the head applied to the mean-pooled hidden state.
//!
//! The session needs exclusive access to run, so forward passes are
//! serialised behind a mutex and executed on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sentiscope_core::{Prediction, Sentiment};
use tracing::{debug, info};

use crate::encoder::Encoder;
use crate::info::read_sidecar_blocking;
use crate::session::TextSession;
use crate::{
    InferenceError, LinearHead, MAX_LENGTH, ModelConfig, ModelFiles, ModelInfo, ModelOrigin,
    SentimentBackend,
};

enum Runtime {
    Logits(TextSession),
    Pooled { encoder: Encoder, head: LinearHead },
}

impl Runtime {
    fn logits(&mut self, text: &str) -> Result<Vec<f32>, InferenceError> {
        match self {
            Self::Logits(session) => {
                let forward = session.forward(&[text])?;
                match forward.dims.as_slice() {
                    [1, n] if *n > 0 && forward.data.len() == *n as usize => Ok(forward.data),
                    dims => Err(InferenceError::Output(format!(
                        "expected logits [1, num_labels], got {dims:?}"
                    ))),
                }
            }
            Self::Pooled { encoder, head } => head.logits(&encoder.encode(text)?),
        }
    }
}

/// Shared, immutable handle to a loaded sentiment model.
pub struct OnnxClassifier {
    runtime: Arc<Mutex<Runtime>>,
    labels: Arc<[Sentiment]>,
    info: ModelInfo,
    /// Directory searched for `model_info.json` on every info request.
    sidecar_dir: Option<PathBuf>,
}

impl OnnxClassifier {
    /// Load a classifier from resolved model files.
    pub fn load(
        files: &ModelFiles,
        origin: ModelOrigin,
        sidecar_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let config = ModelConfig::from_file(&files.config)?;
        let labels = config.labels();
        let session = TextSession::load(&files.model, &files.tokenizer, MAX_LENGTH)?;
        let device = session.device();
        let output_width = session.output_width();

        let runtime = match &files.head {
            Some(head_path) => {
                let head = LinearHead::load(head_path)?;
                anyhow::ensure!(
                    head.num_labels() == labels.len(),
                    "head has {} classes but config declares {}",
                    head.num_labels(),
                    labels.len()
                );
                if let Some(width) = output_width {
                    anyhow::ensure!(
                        width == head.hidden_size(),
                        "encoder width {width} does not match head width {}",
                        head.hidden_size()
                    );
                }
                let encoder = Encoder::from_session(session, head.hidden_size());
                Runtime::Pooled { encoder, head }
            }
            None => {
                if let Some(width) = output_width {
                    anyhow::ensure!(
                        width == labels.len(),
                        "model emits {width} logits but config declares {} labels",
                        labels.len()
                    );
                }
                Runtime::Logits(session)
            }
        };

        let info = ModelInfo {
            model_type: config.model_type.clone(),
            hidden_size: config.hidden_size,
            num_labels: config.num_labels(),
            vocab_size: config.vocab_size,
            device,
            source: origin,
            max_length: MAX_LENGTH,
            sidecar: None,
        };

        info!(
            model = %files.model.display(),
            source = origin.as_str(),
            model_type = %info.model_type,
            %device,
            "sentiment model ready"
        );

        Ok(Self {
            runtime: Arc::new(Mutex::new(runtime)),
            labels: labels.into(),
            info,
            sidecar_dir,
        })
    }

    pub fn labels(&self) -> &[Sentiment] {
        &self.labels
    }

    /// Classify on the calling thread. Blocks while another pass is running.
    pub fn classify_blocking(&self, text: &str) -> Result<Prediction, InferenceError> {
        classify(&self.runtime, &self.labels, text)
    }
}

fn classify(
    runtime: &Mutex<Runtime>,
    labels: &[Sentiment],
    text: &str,
) -> Result<Prediction, InferenceError> {
    let logits = {
        let mut guard = runtime
            .lock()
            .map_err(|_| InferenceError::Unavailable("model lock poisoned".into()))?;
        guard.logits(text)?
    };
    let prediction = Prediction::from_logits(&logits, labels)
        .ok_or_else(|| InferenceError::Output(format!("unusable logits {logits:?}")))?;
    debug!(
        label = %prediction.label,
        confidence = prediction.confidence,
        chars = text.len(),
        "classified text"
    );
    Ok(prediction)
}

#[async_trait]
impl SentimentBackend for OnnxClassifier {
    async fn analyze(&self, text: &str) -> Result<Prediction, InferenceError> {
        let runtime = Arc::clone(&self.runtime);
        let labels = Arc::clone(&self.labels);
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || classify(&runtime, &labels, &text))
            .await
            .map_err(|e| InferenceError::Unavailable(format!("inference task failed: {e}")))?
    }

    async fn model_info(&self) -> ModelInfo {
        let mut info = self.info.clone();
        if let Some(dir) = self.sidecar_dir.clone() {
            info.sidecar = read_sidecar_blocking(dir).await;
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("distilbert-base-uncased-finetuned-sst-2-english")
    }

    fn require_model() -> PathBuf {
        let dir = model_dir();
        if !dir.join("model.onnx").exists() {
            panic!(
                "Model not found. Download from HuggingFace into {}:\n  \
                 https://huggingface.co/Xenova/distilbert-base-uncased-finetuned-sst-2-english/resolve/main/onnx/model.onnx\n  \
                 plus tokenizer.json and config.json from the same repository.",
                dir.display()
            );
        }
        dir
    }

    fn load(dir: &Path) -> OnnxClassifier {
        OnnxClassifier::load(&ModelFiles::in_dir(dir), ModelOrigin::Pretrained, None).unwrap()
    }

    #[tokio::test]
    #[ignore = "needs models/distilbert-base-uncased-finetuned-sst-2-english"]
    async fn positive_and_negative_texts() {
        let classifier = load(&require_model());

        let p = classifier.analyze("I love this product!").await.unwrap();
        assert_eq!(p.label, Sentiment::Positive);
        assert!(p.confidence > 0.5 && p.confidence <= 1.0);

        let n = classifier.analyze("This is terrible").await.unwrap();
        assert_eq!(n.label, Sentiment::Negative);
        assert!(n.confidence > 0.5 && n.confidence <= 1.0);
    }

    #[tokio::test]
    #[ignore = "needs models/distilbert-base-uncased-finetuned-sst-2-english"]
    async fn long_input_is_truncated() {
        let classifier = load(&require_model());
        let text = "the service was fine but slow ".repeat(400);
        let p = classifier.analyze(&text).await.unwrap();
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[tokio::test]
    #[ignore = "needs models/distilbert-base-uncased-finetuned-sst-2-english"]
    async fn model_info_reports_architecture() {
        let classifier = load(&require_model());
        let map = classifier.model_info().await.into_map();
        assert_eq!(map["model_type"], "distilbert");
        assert_eq!(map["num_labels"], 2);
        assert_eq!(map["source"], "pretrained");
    }
}
