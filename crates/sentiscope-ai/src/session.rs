//! Tokenizer + ONNX Runtime session pair shared by the encoder and the classifier.

use std::path::Path;

use ort::session::Session;
use ort::session::builder::SessionBuilder;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::{Device, InferenceError};

pub(crate) struct TextSession {
    session: Session,
    tokenizer: Tokenizer,
    /// DistilBERT exports take no `token_type_ids` input; BERT exports do.
    token_type_ids: bool,
    device: Device,
}

/// First output of a forward pass, with the attention mask it ran under.
pub(crate) struct Forward {
    pub dims: Vec<i64>,
    pub data: Vec<f32>,
    /// `[batch_size * seq_len]`, row-major.
    pub attention_mask: Vec<i64>,
    pub seq_len: usize,
}

impl TextSession {
    pub fn load(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "{} not found", model_path.display());
        anyhow::ensure!(
            tokenizer_path.exists(),
            "{} not found",
            tokenizer_path.display()
        );

        let (builder, device) = session_builder()?;
        let session = builder.commit_from_file(model_path)?;
        let token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Only multi-text training batches ever need padding.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(
            model = %model_path.display(),
            %device,
            token_type_ids,
            max_length,
            "loaded onnx session"
        );
        Ok(Self {
            session,
            tokenizer,
            token_type_ids,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Width of the last axis of the first output, when the model declares it.
    pub fn output_width(&self) -> Option<usize> {
        match self.session.outputs().first()?.dtype() {
            ort::value::ValueType::Tensor { shape, .. } => shape
                .last()
                .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
            _ => None,
        }
    }

    /// Tokenize `texts` and run the session once over all of them.
    ///
    /// The classifier always sends a single text, so nothing is padded and the
    /// mask is all ones up to the truncation limit. Training batches several
    /// texts; shorter rows are zero-padded to the longest one.
    pub fn forward(&mut self, texts: &[&str]) -> Result<Forward, InferenceError> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Err(InferenceError::Tokenize("empty batch".into()));
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| InferenceError::Tokenize(e.to_string()))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        if seq_len == 0 {
            return Err(InferenceError::Tokenize("tokenizer produced no tokens".into()));
        }

        let input_ids = pack(encodings.iter().map(|e| e.get_ids()), seq_len);
        let attention_mask = pack(encodings.iter().map(|e| e.get_attention_mask()), seq_len);
        let token_type_ids = pack(encodings.iter().map(|e| e.get_type_ids()), seq_len);

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?;

        let mut inputs = ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
        ];
        if self.token_type_ids {
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            inputs.push(("token_type_ids".into(), type_tensor.into()));
        }

        let outputs = self.session.run(inputs)?;
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;

        Ok(Forward {
            dims: dims.to_vec(),
            data: output_data.to_vec(),
            attention_mask,
            seq_len,
        })
    }
}

/// Row-major `[rows, seq_len]` buffer, each row zero-padded on the right.
fn pack<'a>(rows: impl Iterator<Item = &'a [u32]>, seq_len: usize) -> Vec<i64> {
    let mut flat = Vec::new();
    for row in rows {
        flat.extend(row.iter().map(|&v| i64::from(v)));
        flat.extend(std::iter::repeat_n(0, seq_len.saturating_sub(row.len())));
    }
    flat
}

/// Session builder bound to CUDA when compiled in and available, else CPU.
fn session_builder() -> anyhow::Result<(SessionBuilder, Device)> {
    let builder = Session::builder()?;

    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

        let cuda = CUDAExecutionProvider::default();
        if cuda.is_available().unwrap_or(false) {
            let builder = builder.with_execution_providers([cuda.build()])?;
            return Ok((builder, Device::Cuda));
        }
    }

    Ok((builder, Device::Cpu))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_pads_short_rows() {
        let rows: [&[u32]; 2] = [&[101, 7, 102], &[101, 102]];
        assert_eq!(pack(rows.into_iter(), 3), vec![101, 7, 102, 101, 102, 0]);
    }

    #[test]
    fn pack_single_text_is_unpadded() {
        let rows: [&[u32]; 1] = [&[1, 1, 1, 1]];
        assert_eq!(pack(rows.into_iter(), 4), vec![1; 4]);
    }
}
