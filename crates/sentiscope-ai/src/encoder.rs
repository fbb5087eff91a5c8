//! Mean-pooled sentence features from a transformer encoder export.
//!
//! The model directory must contain `model.onnx` (first output
//! `last_hidden_state [batch, seq, hidden]`) and `tokenizer.json`. Features
//! feed the linear head, both when training it and at inference time.

use std::path::Path;

use tracing::info;

use crate::session::{Forward, TextSession};
use crate::{Device, InferenceError, MAX_LENGTH};

/// Sentence feature extractor over an ONNX encoder.
pub struct Encoder {
    session: TextSession,
    hidden: usize,
}

impl Encoder {
    /// Load an encoder from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            MAX_LENGTH,
        )
    }

    pub fn from_files(model: &Path, tokenizer: &Path, max_length: usize) -> anyhow::Result<Self> {
        let session = TextSession::load(model, tokenizer, max_length)?;
        // DistilBERT/BERT base width when the export leaves it symbolic.
        let hidden = session.output_width().unwrap_or(768);
        info!(hidden, model = %model.display(), "loaded encoder");
        Ok(Self { session, hidden })
    }

    pub(crate) fn from_session(session: TextSession, hidden: usize) -> Self {
        Self { session, hidden }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    pub fn device(&self) -> Device {
        self.session.device()
    }

    /// Features for a single text.
    pub fn encode(&mut self, text: &str) -> Result<Vec<f32>, InferenceError> {
        self.encode_batch(&[text])?
            .pop()
            .ok_or_else(|| InferenceError::Output("encoder returned no rows".into()))
    }

    /// Features for a batch of texts, one unit-length vector per input.
    pub fn encode_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, InferenceError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let forward = self.session.forward(texts)?;
        mean_pool(&forward, texts.len(), self.hidden)
    }
}

/// Mean of the unmasked token states for each text, scaled to unit length.
///
/// A single classifier text has no padding, so this is the plain mean over
/// its tokens; padded positions in training batches are skipped.
pub(crate) fn mean_pool(
    forward: &Forward,
    batch_size: usize,
    hidden: usize,
) -> Result<Vec<Vec<f32>>, InferenceError> {
    let dims = &forward.dims;
    if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != hidden {
        return Err(InferenceError::Output(format!(
            "expected [{batch_size}, seq, {hidden}], got {dims:?}"
        )));
    }
    let tokens_per_row = dims[1] as usize;
    if tokens_per_row == 0
        || hidden == 0
        || forward.data.len() != batch_size * tokens_per_row * hidden
        || forward.attention_mask.len() != batch_size * forward.seq_len
    {
        return Err(InferenceError::Output(format!(
            "hidden state buffer does not match {dims:?}"
        )));
    }

    let row_len = tokens_per_row * hidden;
    let pooled = forward
        .data
        .chunks(row_len)
        .zip(forward.attention_mask.chunks(forward.seq_len.max(1)))
        .map(|(states, mask)| {
            let mut sum = vec![0.0f32; hidden];
            let mut kept = 0usize;
            for (token, _) in states.chunks(hidden).zip(mask).filter(|(_, m)| **m > 0) {
                for (acc, v) in sum.iter_mut().zip(token) {
                    *acc += v;
                }
                kept += 1;
            }
            if kept > 0 {
                sum.iter_mut().for_each(|acc| *acc /= kept as f32);
            }
            normalize(&mut sum);
            sum
        })
        .collect();
    Ok(pooled)
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
