//! Head training on burn: one `Linear` layer over frozen pooled features,
//! soft-max cross-entropy, Adam with L2 weight decay.
//!
//! Every step sees the whole training set. The trained layer is exported as a
//! [`LinearHead`] so inference keeps working on plain vectors.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use sentiscope_ai::LinearHead;
use sentiscope_core::Sentiment;
use tracing::info;

type TrainBackend = Autodiff<NdArray>;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    /// Optimizer steps per epoch.
    pub steps_per_epoch: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 3,
            steps_per_epoch: 100,
            learning_rate: 0.05,
            weight_decay: 0.01,
        }
    }
}

/// Losses recorded at the end of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochLog {
    pub epoch: usize,
    pub train_loss: f32,
    pub eval_loss: Option<f32>,
}

#[derive(Module, Debug)]
struct HeadModel<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> HeadModel<B> {
    fn new(hidden: usize, num_labels: usize, device: &B::Device) -> Self {
        let linear = LinearConfig::new(hidden, num_labels)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self { linear }
    }

    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(features)
    }

    /// burn stores the weight as `[hidden, num_labels]`; the head wants one
    /// row per class.
    fn to_head(&self) -> anyhow::Result<LinearHead> {
        let weight = self.linear.weight.val();
        let [hidden, num_labels] = weight.dims();
        let flat = weight
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("reading head weights: {e:?}"))?;
        let weights = (0..num_labels)
            .map(|k| (0..hidden).map(|d| flat[d * num_labels + k]).collect())
            .collect();
        let bias = match &self.linear.bias {
            Some(bias) => bias
                .val()
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("reading head bias: {e:?}"))?,
            None => vec![0.0; num_labels],
        };
        Ok(LinearHead { weights, bias })
    }
}

struct Batch<B: Backend> {
    features: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batch<B> {
    /// Rows must be non-empty and of equal width.
    fn new(features: &[Vec<f32>], labels: &[Sentiment], device: &B::Device) -> Self {
        let hidden = features.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<f32> = features.iter().flatten().copied().collect();
        let targets: Vec<i32> = labels.iter().map(|l| l.index() as i32).collect();
        Self {
            features: Tensor::<B, 1>::from_floats(flat.as_slice(), device)
                .reshape([features.len(), hidden]),
            targets: Tensor::<B, 1, Int>::from_ints(targets.as_slice(), device),
        }
    }
}

/// Mean cross-entropy of `model` over `batch`.
fn mean_loss<B: Backend>(model: &HeadModel<B>, batch: &Batch<B>) -> f32 {
    let ce = CrossEntropyLossConfig::new().init(&batch.features.device());
    ce.forward(model.forward(batch.features.clone()), batch.targets.clone())
        .into_scalar()
        .elem::<f32>()
}

fn check_rows(
    features: &[Vec<f32>],
    labels: &[Sentiment],
    hidden: usize,
    what: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        features.len() == labels.len(),
        "{} {what} feature rows for {} labels",
        features.len(),
        labels.len()
    );
    anyhow::ensure!(
        features.iter().all(|f| f.len() == hidden),
        "ragged {what} feature rows"
    );
    Ok(())
}

/// Fit a head on pooled features.
///
/// `eval` is an optional held-out set whose loss is logged each epoch; it
/// never influences the weights. Logged losses are plain cross-entropy, the
/// decay penalty lives in the optimizer.
pub fn fit_head(
    features: &[Vec<f32>],
    labels: &[Sentiment],
    eval: Option<(&[Vec<f32>], &[Sentiment])>,
    config: &TrainConfig,
) -> anyhow::Result<(LinearHead, Vec<EpochLog>)> {
    anyhow::ensure!(!features.is_empty(), "no training samples");
    let hidden = features[0].len();
    anyhow::ensure!(hidden > 0, "empty feature vectors");
    check_rows(features, labels, hidden, "training")?;
    let eval = eval.filter(|(x, _)| !x.is_empty());
    if let Some((x, y)) = eval {
        check_rows(x, y, hidden, "held-out")?;
    }

    let device = Default::default();
    fit::<TrainBackend>(features, labels, eval, config, &device)
}

fn fit<B: AutodiffBackend>(
    features: &[Vec<f32>],
    labels: &[Sentiment],
    eval: Option<(&[Vec<f32>], &[Sentiment])>,
    config: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<(LinearHead, Vec<EpochLog>)> {
    let hidden = features[0].len();
    let num_labels = Sentiment::DEFAULT_LABELS.len();

    let train = Batch::<B>::new(features, labels, device);
    let train_valid = Batch::<B::InnerBackend>::new(features, labels, device);
    let held_out = eval.map(|(x, y)| Batch::<B::InnerBackend>::new(x, y, device));

    let mut model = HeadModel::<B>::new(hidden, num_labels, device);
    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay.into())))
        .init();
    let ce = CrossEntropyLossConfig::new().init(device);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        for _ in 0..config.steps_per_epoch {
            let logits = model.forward(train.features.clone());
            let loss = ce.forward(logits, train.targets.clone());
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(f64::from(config.learning_rate), model, grads);
        }

        let snapshot = model.valid();
        let train_loss = mean_loss(&snapshot, &train_valid);
        let eval_loss = held_out.as_ref().map(|batch| mean_loss(&snapshot, batch));
        info!(epoch, train_loss, eval_loss, "epoch complete");
        history.push(EpochLog {
            epoch,
            train_loss,
            eval_loss,
        });
    }

    Ok((model.valid().to_head()?, history))
}
