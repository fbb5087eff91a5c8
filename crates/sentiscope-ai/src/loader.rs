//! Model resolution: a fine-tuned directory when one is usable, otherwise a
//! public checkpoint fetched from the Hugging Face Hub.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::head::HEAD_FILE;
use crate::{DEFAULT_FALLBACK_MODEL, ModelOrigin, OnnxClassifier};

/// Paths to the files a classifier is built from.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
    pub config: PathBuf,
    /// Present only for fine-tuned (encoder + head) layouts.
    pub head: Option<PathBuf>,
}

impl ModelFiles {
    /// Conventional layout of a local model directory.
    pub fn in_dir(dir: &Path) -> Self {
        let head = dir.join(HEAD_FILE);
        Self {
            model: dir.join("model.onnx"),
            tokenizer: dir.join("tokenizer.json"),
            config: dir.join("config.json"),
            head: head.exists().then_some(head),
        }
    }

    /// Download (or reuse from the local hub cache) an ONNX export of `repo`.
    ///
    /// Expects the `onnx/model.onnx` layout used by the Xenova exports.
    pub async fn fetch(repo: &str) -> anyhow::Result<Self> {
        info!(repo, "fetching model from Hugging Face Hub");
        let api = hf_hub::api::tokio::ApiBuilder::new()
            .with_progress(false)
            .build()
            .context("initialising Hugging Face Hub client")?;
        let hub = api.model(repo.to_string());

        let config = hub
            .get("config.json")
            .await
            .with_context(|| format!("fetching {repo}/config.json"))?;
        let tokenizer = hub
            .get("tokenizer.json")
            .await
            .with_context(|| format!("fetching {repo}/tokenizer.json"))?;
        let model = hub
            .get("onnx/model.onnx")
            .await
            .with_context(|| format!("fetching {repo}/onnx/model.onnx"))?;

        Ok(Self {
            model,
            tokenizer,
            config,
            head: None,
        })
    }
}

/// Which weights the service should try first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    FineTuned(PathBuf),
    Pretrained(String),
}

impl ModelSource {
    /// A directory counts as fine-tuned when it exists and holds `config.json`.
    pub fn resolve(model_path: &Path, fallback: &str) -> Self {
        if model_path.join("config.json").is_file() {
            Self::FineTuned(model_path.to_path_buf())
        } else {
            Self::Pretrained(fallback.to_string())
        }
    }
}

/// Where to look for weights.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Fine-tuned model directory; also where `model_info.json` is read from.
    pub model_path: PathBuf,
    /// Hub repository used when `model_path` is absent or fails to load.
    pub fallback_model: String,
}

impl LoaderConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }
}

/// Load the service's classifier.
///
/// A fine-tuned directory that fails to load is logged and skipped. Failure
/// to load the public fallback is fatal.
pub async fn load_classifier(config: &LoaderConfig) -> anyhow::Result<OnnxClassifier> {
    let sidecar_dir = Some(config.model_path.clone());

    match ModelSource::resolve(&config.model_path, &config.fallback_model) {
        ModelSource::FineTuned(dir) => {
            info!(path = %dir.display(), "loading fine-tuned model");
            match OnnxClassifier::load(
                &ModelFiles::in_dir(&dir),
                ModelOrigin::FineTuned,
                sidecar_dir.clone(),
            ) {
                Ok(classifier) => return Ok(classifier),
                Err(e) => warn!(
                    path = %dir.display(),
                    error = %e,
                    "failed to load fine-tuned model, falling back to pretrained"
                ),
            }
        }
        ModelSource::Pretrained(_) => {
            info!(
                path = %config.model_path.display(),
                "fine-tuned model not found, using pretrained model"
            );
        }
    }

    let files = ModelFiles::fetch(&config.fallback_model).await?;
    OnnxClassifier::load(&files, ModelOrigin::Pretrained, sidecar_dir)
        .with_context(|| format!("loading fallback model {}", config.fallback_model))
}
