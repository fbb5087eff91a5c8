//! Sentiment inference layer: ONNX Runtime sequence classification behind a
//! backend trait, plus the model-directory conventions shared with training.

mod backend;
mod error;
pub mod head;
pub mod info;

pub use backend::SentimentBackend;
pub use error::InferenceError;
pub use head::LinearHead;
pub use info::{Device, ModelConfig, ModelInfo, ModelOrigin};

#[cfg(feature = "onnx")]
mod classifier;
#[cfg(feature = "onnx")]
mod encoder;
#[cfg(feature = "onnx")]
pub mod loader;
#[cfg(feature = "onnx")]
mod session;

#[cfg(feature = "onnx")]
pub use classifier::OnnxClassifier;
#[cfg(feature = "onnx")]
pub use encoder::Encoder;
#[cfg(feature = "onnx")]
pub use loader::{LoaderConfig, ModelFiles, ModelSource, load_classifier};

/// Maximum number of tokens fed to the model; longer inputs are truncated.
pub const MAX_LENGTH: usize = 512;

/// Public checkpoint used when no fine-tuned model is available.
pub const DEFAULT_FALLBACK_MODEL: &str = "Xenova/distilbert-base-uncased-finetuned-sst-2-english";

/// Base encoder fine-tuned by the training job.
pub const DEFAULT_BASE_ENCODER: &str = "Xenova/distilbert-base-uncased";
