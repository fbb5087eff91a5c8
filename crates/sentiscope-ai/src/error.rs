use thiserror::Error;

/// A forward pass that did not produce a usable prediction.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("tokenize: {0}")]
    Tokenize(String),

    #[error("onnx runtime: {0}")]
    Runtime(String),

    #[error("unexpected model output: {0}")]
    Output(String),

    #[error("model unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for InferenceError {
    fn from(e: ort::Error) -> Self {
        Self::Runtime(e.to_string())
    }
}
