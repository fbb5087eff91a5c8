//! Labelled text samples: the built-in review set, JSONL files, and a seeded
//! train/test split.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sentiscope_core::Sentiment;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub text: String,
    pub label: Sentiment,
}

impl Sample {
    pub fn new(text: impl Into<String>, label: Sentiment) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}:{line}: label must be 0 or 1, got {label}")]
    Label {
        path: PathBuf,
        line: usize,
        label: i64,
    },

    #[error("{0} contains no samples")]
    Empty(PathBuf),
}

#[derive(Deserialize)]
struct JsonlRow {
    text: String,
    label: i64,
}

/// Load `{"text": ..., "label": 0|1}` rows, one per line. Blank lines are skipped.
pub fn load_jsonl(path: &Path) -> Result<Vec<Sample>, DatasetError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut samples = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: JsonlRow = serde_json::from_str(line).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        let label = usize::try_from(row.label)
            .ok()
            .and_then(Sentiment::from_index)
            .ok_or(DatasetError::Label {
                path: path.to_path_buf(),
                line: i + 1,
                label: row.label,
            })?;
        samples.push(Sample::new(row.text, label));
    }

    if samples.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }
    info!(path = %path.display(), samples = samples.len(), "loaded dataset");
    Ok(samples)
}

const POSITIVE_REVIEWS: &[&str] = &[
    "This product is amazing! I love it.",
    "Great service, would recommend to everyone.",
    "The quality exceeded my expectations.",
    "Best purchase I've made this year.",
    "Very satisfied with the results.",
    "Excellent customer support.",
    "The team was very helpful and responsive.",
    "I'm impressed with how well this works.",
    "This has made my life so much easier.",
    "Fantastic experience from start to finish.",
];

const NEGATIVE_REVIEWS: &[&str] = &[
    "Terrible product, don't waste your money.",
    "The customer service was awful.",
    "I'm very disappointed with the quality.",
    "This didn't work as advertised.",
    "Would not recommend to anyone.",
    "Complete waste of time and money.",
    "The worst experience I've had.",
    "I regret this purchase.",
    "Very frustrating to use.",
    "Poor design and implementation.",
];

/// Rounds of first-word-dropped variations appended to the base reviews.
const VARIATION_ROUNDS: usize = 45;

/// Built-in synthetic review set.
///
/// Ten positive and ten negative reviews, followed by
/// [`VARIATION_ROUNDS`] copies of each review longer than three words with
/// its first word removed.
pub fn sample_dataset() -> Vec<Sample> {
    let base = POSITIVE_REVIEWS
        .iter()
        .map(|t| Sample::new(*t, Sentiment::Positive))
        .chain(
            NEGATIVE_REVIEWS
                .iter()
                .map(|t| Sample::new(*t, Sentiment::Negative)),
        );
    let mut samples: Vec<Sample> = base.collect();

    for _ in 0..VARIATION_ROUNDS {
        for (reviews, label) in [
            (POSITIVE_REVIEWS, Sentiment::Positive),
            (NEGATIVE_REVIEWS, Sentiment::Negative),
        ] {
            for review in reviews {
                let words: Vec<&str> = review.split_whitespace().collect();
                if words.len() > 3 {
                    samples.push(Sample::new(words[1..].join(" "), label));
                }
            }
        }
    }
    samples
}

/// Shuffle with a fixed seed, then hold out `ceil(len * test_fraction)` samples.
///
/// Returns `(train, test)`.
pub fn train_test_split<T>(mut samples: Vec<T>, test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let test_len = ((total as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let test = samples.split_off(total - test_len.min(total));
    (samples, test)
}
