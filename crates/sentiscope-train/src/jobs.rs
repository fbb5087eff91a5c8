//! Training and evaluation jobs over real encoder exports.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use sentiscope_ai::head::HEAD_FILE;
use sentiscope_ai::info::SIDECAR_FILE;
use sentiscope_ai::{
    DEFAULT_BASE_ENCODER, Encoder, MAX_LENGTH, ModelFiles, ModelOrigin, OnnxClassifier,
};
use sentiscope_core::{EvaluationReport, Sentiment};
use serde_json::{Value, json};
use tracing::info;

use crate::dataset::{Sample, load_jsonl, sample_dataset, train_test_split};
use crate::evaluate::{Evaluation, evaluate_head, evaluate_predictions};
use crate::plot::{write_confusion_matrix, write_roc_curve};
use crate::trainer::{EpochLog, TrainConfig, fit_head};
use crate::{SPLIT_SEED, TEST_FRACTION};

/// Texts per encoder forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct TrainJob {
    /// Local encoder directory (`model.onnx`, `tokenizer.json`, `config.json`).
    /// When absent, `base_repo` is fetched from the Hub.
    pub base_model: Option<PathBuf>,
    pub base_repo: String,
    /// JSONL dataset; the built-in review set when absent.
    pub dataset: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub evaluation_dir: PathBuf,
    pub config: TrainConfig,
    pub batch_size: usize,
}

impl TrainJob {
    pub fn new(output_dir: impl Into<PathBuf>, evaluation_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_model: None,
            base_repo: DEFAULT_BASE_ENCODER.to_string(),
            dataset: None,
            output_dir: output_dir.into(),
            evaluation_dir: evaluation_dir.into(),
            config: TrainConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateJob {
    pub model_dir: PathBuf,
    pub dataset: Option<PathBuf>,
    pub evaluation_dir: PathBuf,
    /// Score only the seeded 20% hold-out instead of the whole dataset.
    pub held_out_only: bool,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub evaluation: Evaluation,
    pub report_path: PathBuf,
    pub confusion_matrix_path: PathBuf,
    /// Absent when the evaluated set holds a single class.
    pub roc_curve_path: Option<PathBuf>,
    /// Written model directory (training only).
    pub model_dir: Option<PathBuf>,
    pub history: Vec<EpochLog>,
}

/// Fit a head on the base encoder, write the model directory, then evaluate
/// on the held-out split.
pub async fn run_training(job: &TrainJob) -> anyhow::Result<JobOutcome> {
    let files = match &job.base_model {
        Some(dir) => ModelFiles::in_dir(dir),
        None => ModelFiles::fetch(&job.base_repo).await?,
    };
    let job = job.clone();
    tokio::task::spawn_blocking(move || train_blocking(&job, &files))
        .await
        .context("training task panicked")?
}

/// Evaluate an existing model directory against a dataset.
pub async fn run_evaluation(job: &EvaluateJob) -> anyhow::Result<JobOutcome> {
    let job = job.clone();
    tokio::task::spawn_blocking(move || evaluate_blocking(&job))
        .await
        .context("evaluation task panicked")?
}

fn load_samples(dataset: Option<&Path>) -> anyhow::Result<Vec<Sample>> {
    match dataset {
        Some(path) => Ok(load_jsonl(path)?),
        None => {
            let samples = sample_dataset();
            info!(samples = samples.len(), "using built-in review set");
            Ok(samples)
        }
    }
}

fn split(samples: Vec<Sample>) -> (Vec<Sample>, Vec<Sample>) {
    train_test_split(samples, TEST_FRACTION, SPLIT_SEED)
}

fn train_blocking(job: &TrainJob, files: &ModelFiles) -> anyhow::Result<JobOutcome> {
    let (train, test) = split(load_samples(job.dataset.as_deref())?);
    anyhow::ensure!(!test.is_empty(), "dataset too small to hold out a test split");
    info!(train = train.len(), test = test.len(), "split dataset");

    let mut encoder = Encoder::from_files(&files.model, &files.tokenizer, MAX_LENGTH)?;
    let (train_x, train_y) = encode_samples(&mut encoder, &train, job.batch_size)?;
    let (test_x, test_y) = encode_samples(&mut encoder, &test, job.batch_size)?;

    let held_out = Some((&test_x[..], &test_y[..]));
    let (head, history) = fit_head(&train_x, &train_y, held_out, &job.config)?;
    let evaluation = evaluate_head(&head, &test_x, &test_y)?;

    let out = &job.output_dir;
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    copy(&files.model, &out.join("model.onnx"))?;
    copy(&files.tokenizer, &out.join("tokenizer.json"))?;
    let model_type = write_config(&files.config, &out.join("config.json"))?;
    head.save(&out.join(HEAD_FILE))?;
    info!(path = %out.display(), "saved fine-tuned model");

    let timestamp = Local::now().naive_local();
    let base = job
        .base_model
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| job.base_repo.clone());
    let mut notes = vec![
        format!("train samples: {}", train.len()),
        format!("learning rate: {}", job.config.learning_rate),
        format!("weight decay: {}", job.config.weight_decay),
    ];
    if let Some(last) = history.last() {
        notes.push(format!("final train loss: {:.4}", last.train_loss));
    }
    let report = evaluation.report(
        timestamp,
        format!("fine-tuned {base}"),
        Some(job.config.epochs),
        notes,
    );
    let artifacts = write_artifacts(&report, &evaluation, &job.evaluation_dir)?;

    let sidecar = json!({
        "model_type": model_type,
        "base_model": base,
        "accuracy": evaluation.metrics.accuracy,
        "f1_score": evaluation.metrics.f1,
        "precision": evaluation.metrics.precision,
        "recall": evaluation.metrics.recall,
        "roc_auc": evaluation.roc_auc,
        "epochs": job.config.epochs,
        "learning_rate": job.config.learning_rate,
        "train_size": train.len(),
        "test_size": test.len(),
        "trained_at": timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
    });
    let sidecar_path = out.join(SIDECAR_FILE);
    std::fs::write(&sidecar_path, serde_json::to_string_pretty(&sidecar)?)
        .with_context(|| format!("writing {}", sidecar_path.display()))?;

    Ok(JobOutcome {
        evaluation,
        report_path: artifacts.report,
        confusion_matrix_path: artifacts.confusion_matrix,
        roc_curve_path: artifacts.roc_curve,
        model_dir: Some(out.clone()),
        history,
    })
}

fn evaluate_blocking(job: &EvaluateJob) -> anyhow::Result<JobOutcome> {
    let files = ModelFiles::in_dir(&job.model_dir);
    let origin = if files.head.is_some() {
        ModelOrigin::FineTuned
    } else {
        ModelOrigin::Pretrained
    };
    let classifier = OnnxClassifier::load(&files, origin, None)?;

    let mut samples = load_samples(job.dataset.as_deref())?;
    if job.held_out_only {
        samples = split(samples).1;
    }
    anyhow::ensure!(!samples.is_empty(), "nothing to evaluate");

    let mut truth = Vec::with_capacity(samples.len());
    let mut predictions = Vec::with_capacity(samples.len());
    for sample in &samples {
        predictions.push(classifier.classify_blocking(&sample.text)?);
        truth.push(sample.label);
    }
    let evaluation = evaluate_predictions(&truth, &predictions);
    info!(
        samples = samples.len(),
        accuracy = evaluation.metrics.accuracy,
        f1 = evaluation.metrics.f1,
        "evaluation complete"
    );

    let report = evaluation.report(
        Local::now().naive_local(),
        job.model_dir.display().to_string(),
        None,
        vec![format!("source: {}", origin.as_str())],
    );
    let artifacts = write_artifacts(&report, &evaluation, &job.evaluation_dir)?;

    Ok(JobOutcome {
        evaluation,
        report_path: artifacts.report,
        confusion_matrix_path: artifacts.confusion_matrix,
        roc_curve_path: artifacts.roc_curve,
        model_dir: None,
        history: vec![],
    })
}

struct Artifacts {
    report: PathBuf,
    confusion_matrix: PathBuf,
    roc_curve: Option<PathBuf>,
}

fn write_artifacts(
    report: &EvaluationReport,
    evaluation: &Evaluation,
    dir: &Path,
) -> anyhow::Result<Artifacts> {
    let report_path = report.write_to(dir)?;
    let confusion_matrix = write_confusion_matrix(report, dir)?;
    let roc_curve = evaluation
        .roc_curve
        .as_deref()
        .map(|points| write_roc_curve(report, points, dir))
        .transpose()?;
    Ok(Artifacts {
        report: report_path,
        confusion_matrix,
        roc_curve,
    })
}

/// Pooled features for every sample. Duplicate texts are encoded once.
fn encode_samples(
    encoder: &mut Encoder,
    samples: &[Sample],
    batch_size: usize,
) -> anyhow::Result<(Vec<Vec<f32>>, Vec<Sentiment>)> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = samples
        .iter()
        .map(|s| s.text.as_str())
        .filter(|t| seen.insert(*t))
        .collect();

    let mut cache: HashMap<&str, Vec<f32>> = HashMap::with_capacity(unique.len());
    for chunk in unique.chunks(batch_size.max(1)) {
        let rows = encoder.encode_batch(chunk)?;
        cache.extend(chunk.iter().copied().zip(rows));
    }
    info!(
        samples = samples.len(),
        unique = unique.len(),
        "encoded samples"
    );

    let features = samples
        .iter()
        .map(|s| {
            cache
                .get(s.text.as_str())
                .cloned()
                .with_context(|| format!("no features for {:?}", s.text))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let labels = samples.iter().map(|s| s.label).collect();
    Ok((features, labels))
}

fn copy(from: &Path, to: &Path) -> anyhow::Result<()> {
    std::fs::copy(from, to)
        .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Copy the base config with our label mapping; returns its `model_type`.
fn write_config(from: &Path, to: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(from).with_context(|| format!("reading {}", from.display()))?;
    let mut config: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", from.display()))?;
    let obj = config
        .as_object_mut()
        .with_context(|| format!("{} is not a JSON object", from.display()))?;

    let id2label: serde_json::Map<String, Value> = Sentiment::DEFAULT_LABELS
        .iter()
        .map(|l| (l.index().to_string(), Value::from(l.as_str())))
        .collect();
    let label2id: serde_json::Map<String, Value> = Sentiment::DEFAULT_LABELS
        .iter()
        .map(|l| (l.as_str().to_string(), Value::from(l.index())))
        .collect();
    obj.insert("id2label".into(), Value::Object(id2label));
    obj.insert("label2id".into(), Value::Object(label2id));
    let model_type = obj
        .get("model_type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    std::fs::write(to, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {}", to.display()))?;
    Ok(model_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_gets_label_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("base.json");
        let to = dir.path().join("config.json");
        std::fs::write(&from, r#"{"model_type": "distilbert", "dim": 768, "vocab_size": 30522}"#)
            .unwrap();

        assert_eq!(write_config(&from, &to).unwrap(), "distilbert");

        let cfg = sentiscope_ai::ModelConfig::from_file(&to).unwrap();
        assert_eq!(cfg.hidden_size, 768);
        assert_eq!(cfg.labels(), vec![Sentiment::Negative, Sentiment::Positive]);
    }

    fn base_model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("distilbert-base-uncased")
    }

    fn require_base_model() -> PathBuf {
        let dir = base_model_dir();
        if !dir.join("model.onnx").exists() || !dir.join("config.json").exists() {
            panic!(
                "Base encoder not found. Download from HuggingFace into {}:\n  \
                 https://huggingface.co/Xenova/distilbert-base-uncased/resolve/main/onnx/model.onnx\n  \
                 plus tokenizer.json and config.json from the same repository.",
                dir.display()
            );
        }
        dir
    }

    #[tokio::test]
    #[ignore = "needs models/distilbert-base-uncased"]
    async fn train_then_evaluate_round_trip() {
        let base = require_base_model();
        let work = tempfile::tempdir().unwrap();
        let mut job = TrainJob::new(work.path().join("model"), work.path().join("evaluation"));
        job.base_model = Some(base);
        job.config.epochs = 1;
        job.config.steps_per_epoch = 20;

        let trained = run_training(&job).await.unwrap();
        let model_dir = trained.model_dir.unwrap();
        for file in ["model.onnx", "tokenizer.json", "config.json", HEAD_FILE, SIDECAR_FILE] {
            assert!(model_dir.join(file).exists(), "missing {file}");
        }
        assert!(trained.report_path.exists());
        assert!(trained.confusion_matrix_path.exists());
        assert!(trained.roc_curve_path.as_ref().is_some_and(|p| p.exists()));

        let parsed = sentiscope_core::report::read_report(&trained.report_path).unwrap();
        let accuracy = parsed.accuracy.unwrap();
        assert!((accuracy - trained.evaluation.metrics.accuracy).abs() < 1e-4);

        let evaluated = run_evaluation(&EvaluateJob {
            model_dir,
            dataset: None,
            evaluation_dir: work.path().join("evaluation-2"),
            held_out_only: true,
        })
        .await
        .unwrap();
        assert_eq!(evaluated.evaluation.test_size, trained.evaluation.test_size);
    }
}
