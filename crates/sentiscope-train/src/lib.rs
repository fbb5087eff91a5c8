//! Offline jobs: fit a linear sentiment head on frozen encoder features, then
//! evaluate it and write report artifacts.
//!
//! The numeric parts (dataset, optimiser, metrics, plotting) are plain Rust.
//! The jobs that run the encoder need the `onnx` feature.

pub mod dataset;
pub mod evaluate;
pub mod plot;
pub mod trainer;

#[cfg(feature = "onnx")]
pub mod jobs;

pub use dataset::{DatasetError, Sample, load_jsonl, sample_dataset, train_test_split};
pub use evaluate::{Evaluation, evaluate_head, evaluate_predictions};
pub use trainer::{EpochLog, TrainConfig, fit_head};

#[cfg(feature = "onnx")]
pub use jobs::{EvaluateJob, JobOutcome, TrainJob, run_evaluation, run_training};

/// Seed for the train/test shuffle.
pub const SPLIT_SEED: u64 = 42;

/// Fraction of samples held out for evaluation.
pub const TEST_FRACTION: f64 = 0.2;
