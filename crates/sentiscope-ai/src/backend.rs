use async_trait::async_trait;
use sentiscope_core::Prediction;

use crate::{InferenceError, ModelInfo};

/// Anything that can classify text for the HTTP layer.
///
/// Implementations are shared across request handlers behind an `Arc` and must
/// not require exclusive access from callers.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    /// Classify `text` as positive or negative.
    async fn analyze(&self, text: &str) -> Result<Prediction, InferenceError>;

    /// Architecture metadata, merged with the model's metrics sidecar if present.
    ///
    /// Implementations that touch the filesystem must keep that off the async
    /// workers.
    async fn model_info(&self) -> ModelInfo;
}
