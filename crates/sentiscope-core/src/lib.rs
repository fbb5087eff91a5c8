pub mod metrics;
pub mod report;
pub mod sentiment;

pub use metrics::{ClassScores, ConfusionMatrix, EvaluationMetrics, roc_auc, roc_curve};
pub use report::{EvaluationReport, ReportError};
pub use sentiment::{ParseSentimentError, Prediction, Sentiment, softmax};
