//! Evaluation report files: `results_<YYYYmmdd_HHMMSS>.txt` plus companion
//! `confusion_matrix_<stamp>.*` and `roc_curve_<stamp>.*` artifacts in the
//! same directory.
//!
//! Reports are human-readable. Metrics are written as `- accuracy: 0.9245`
//! lines, which is the only part readers rely on.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use crate::{ConfusionMatrix, EvaluationMetrics};

/// Timestamp layout embedded in report file names.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const REPORT_PREFIX: &str = "results_";
const REPORT_SUFFIX: &str = ".txt";
const CONFUSION_PREFIX: &str = "confusion_matrix_";
const CONFUSION_EXTENSIONS: &[&str] = &["svg", "png", "txt"];
const ROC_PREFIX: &str = "roc_curve_";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {0} contains no metrics")]
    NoMetrics(PathBuf),
}

impl ReportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Everything written into one evaluation report.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub timestamp: NaiveDateTime,
    /// Free-text model description, e.g. `fine-tuned distilbert-base-uncased`.
    pub model: String,
    pub metrics: EvaluationMetrics,
    pub confusion: ConfusionMatrix,
    pub roc_auc: Option<f64>,
    pub test_size: usize,
    pub epochs: Option<usize>,
    pub notes: Vec<String>,
}

impl EvaluationReport {
    /// Stamp shared by the report and its confusion-matrix artifact.
    pub fn stamp(&self) -> String {
        self.timestamp.format(STAMP_FORMAT).to_string()
    }

    pub fn file_name(&self) -> String {
        format!("{REPORT_PREFIX}{}{REPORT_SUFFIX}", self.stamp())
    }

    /// Path of the confusion-matrix artifact with the given extension.
    pub fn confusion_matrix_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{CONFUSION_PREFIX}{}.{extension}", self.stamp()))
    }

    /// Path of the ROC curve artifact with the given extension.
    pub fn roc_curve_path(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{ROC_PREFIX}{}.{extension}", self.stamp()))
    }

    pub fn render(&self) -> String {
        let m = &self.metrics;
        let cm = &self.confusion;
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Model Evaluation Results");
        let _ = writeln!(out, "=======================");
        let _ = writeln!(out, "Date: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Model: {}", self.model);
        let _ = writeln!(out);
        let _ = writeln!(out, "Metrics:");
        let _ = writeln!(out, "- accuracy: {:.4}", m.accuracy);
        let _ = writeln!(out, "- f1: {:.4}", m.f1);
        let _ = writeln!(out, "- precision: {:.4}", m.precision);
        let _ = writeln!(out, "- recall: {:.4}", m.recall);
        if let Some(auc) = self.roc_auc {
            let _ = writeln!(out, "- roc_auc: {auc:.4}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Confusion matrix (rows: true, columns: predicted):");
        let _ = writeln!(out, "              negative  positive");
        let _ = writeln!(out, "  negative  {:>9} {:>9}", cm.true_negative, cm.false_positive);
        let _ = writeln!(out, "  positive  {:>9} {:>9}", cm.false_negative, cm.true_positive);
        let _ = writeln!(out);
        let _ = writeln!(out, "Classification report:");
        let _ = writeln!(out, "               precision    recall  f1-score   support");
        let rows = cm.per_class();
        let total = cm.total();
        let mut macro_avg = [0.0f64; 3];
        let mut weighted_avg = [0.0f64; 3];
        for row in &rows {
            let scores = [row.precision, row.recall, row.f1];
            let _ = writeln!(
                out,
                "  {:<12} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                row.label.to_string(),
                scores[0],
                scores[1],
                scores[2],
                row.support
            );
            let weight = if total == 0 { 0.0 } else { row.support as f64 / total as f64 };
            for (k, score) in scores.iter().enumerate() {
                macro_avg[k] += score / rows.len() as f64;
                weighted_avg[k] += score * weight;
            }
        }
        for (name, avg) in [("macro avg", macro_avg), ("weighted avg", weighted_avg)] {
            let _ = writeln!(
                out,
                "  {name:<12} {:>9.4} {:>9.4} {:>9.4} {total:>9}",
                avg[0], avg[1], avg[2]
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Test set size: {} samples", self.test_size);
        if let Some(epochs) = self.epochs {
            let _ = writeln!(out, "Training time: {epochs} epochs");
        }
        if !self.notes.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Notes:");
            for note in &self.notes {
                let _ = writeln!(out, "- {note}");
            }
        }
        out
    }

    /// Write the report into `dir` (created if missing), returning its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render()).map_err(|e| ReportError::io(&path, e))?;
        info!(path = %path.display(), "wrote evaluation report");
        Ok(path)
    }
}

/// Metrics recovered from a report file. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMetrics {
    pub accuracy: Option<f64>,
    pub f1: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    /// Taken from the file name, not the body.
    pub timestamp: Option<NaiveDateTime>,
}

impl ReportMetrics {
    pub fn is_empty(&self) -> bool {
        self.accuracy.is_none() && self.f1.is_none() && self.precision.is_none() && self.recall.is_none()
    }
}

/// Extract `accuracy`, `f1`, `precision` and `recall` from report text.
///
/// Each metric is read from the first line shaped like `key: number`,
/// optionally prefixed by a list dash.
pub fn parse_metrics(content: &str) -> ReportMetrics {
    let mut metrics = ReportMetrics::default();
    for line in content.lines() {
        let line = line.trim().trim_start_matches('-').trim_start();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
        else {
            continue;
        };
        let slot = match key.trim().to_ascii_lowercase().as_str() {
            "accuracy" => &mut metrics.accuracy,
            "f1" => &mut metrics.f1,
            "precision" => &mut metrics.precision,
            "recall" => &mut metrics.recall,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    metrics
}

/// Timestamp encoded in a `results_<stamp>.txt` file name.
pub fn timestamp_from_path(path: &Path) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp_from_path(path)?, STAMP_FORMAT).ok()
}

fn stamp_from_path(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(REPORT_PREFIX)?.strip_suffix(REPORT_SUFFIX)
}

/// Every `results_*.txt` in `dir`, newest stamp first.
///
/// A missing directory yields an empty list.
pub fn reports_newest_first(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ReportError::io(dir, e)),
    };

    let mut reports: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ReportError::io(dir, e))?.path();
        if timestamp_from_path(&path).is_some() {
            reports.push(path);
        }
    }
    reports.sort_by(|a, b| b.cmp(a));
    Ok(reports)
}

/// Newest `results_*.txt` in `dir`, ordered by the stamp in the file name.
///
/// A missing directory yields `Ok(None)`.
pub fn latest_report(dir: &Path) -> Result<Option<PathBuf>, ReportError> {
    Ok(reports_newest_first(dir)?.into_iter().next())
}

/// Read and parse a report file; its timestamp comes from the file name.
pub fn read_report(path: &Path) -> Result<ReportMetrics, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    let mut metrics = parse_metrics(&content);
    if metrics.is_empty() {
        return Err(ReportError::NoMetrics(path.to_path_buf()));
    }
    metrics.timestamp = timestamp_from_path(path);
    Ok(metrics)
}

/// Confusion-matrix artifact written alongside `report`, if any.
pub fn confusion_matrix_for(report: &Path) -> Option<PathBuf> {
    let stamp = stamp_from_path(report)?;
    let dir = report.parent()?;
    CONFUSION_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{CONFUSION_PREFIX}{stamp}.{ext}")))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_report(ts: NaiveDateTime) -> EvaluationReport {
        EvaluationReport {
            timestamp: ts,
            model: "fine-tuned distilbert-base-uncased".into(),
            metrics: EvaluationMetrics {
                accuracy: 0.9245,
                precision: 0.9312,
                recall: 0.9065,
                f1: 0.9187,
            },
            confusion: ConfusionMatrix {
                true_positive: 450,
                false_positive: 35,
                true_negative: 465,
                false_negative: 50,
            },
            roc_auc: Some(0.97),
            test_size: 1000,
            epochs: Some(3),
            notes: vec!["Performance metrics are based on the test set".into()],
        }
    }

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn rendered_report_parses_back() {
        let report = sample_report(ts(0, 35, 0));
        let parsed = parse_metrics(&report.render());
        assert_eq!(parsed.accuracy, Some(0.9245));
        assert_eq!(parsed.f1, Some(0.9187));
        assert_eq!(parsed.precision, Some(0.9312));
        assert_eq!(parsed.recall, Some(0.9065));
    }

    #[test]
    fn parse_ignores_prose() {
        let text = "Model Evaluation Results\nDate: 2025-03-17 00:35:00\n\
                    Notes:\n- accuracy is what we optimise\n- accuracy: 0.8\nrecall: 0.7 (macro)\n";
        let parsed = parse_metrics(text);
        assert_eq!(parsed.accuracy, Some(0.8));
        assert_eq!(parsed.recall, Some(0.7));
        assert_eq!(parsed.f1, None);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let parsed = parse_metrics("- accuracy: NaN\n- f1: inf\n- recall: -infinity\n- accuracy: 0.81\n");
        assert_eq!(parsed.accuracy, Some(0.81));
        assert_eq!(parsed.f1, None);
        assert_eq!(parsed.recall, None);
    }

    #[test]
    fn rendered_report_has_per_class_block() {
        let text = sample_report(ts(0, 35, 0)).render();
        assert!(text.contains("Classification report:"));
        let negative = text
            .lines()
            .find(|l| l.trim_start().starts_with("negative ") && l.contains("0.9300"))
            .unwrap();
        assert!(negative.trim_end().ends_with("500"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("weighted avg")));
        // The extra rows must not shadow the headline metrics.
        assert_eq!(parse_metrics(&text).precision, Some(0.9312));
    }

    #[test]
    fn reports_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for t in [ts(9, 0, 0), ts(0, 35, 0), ts(12, 0, 0)] {
            sample_report(t).write_to(dir.path()).unwrap();
        }
        let stamps: Vec<_> = reports_newest_first(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| timestamp_from_path(p))
            .collect();
        assert_eq!(stamps, vec![ts(12, 0, 0), ts(9, 0, 0), ts(0, 35, 0)]);
        assert!(reports_newest_first(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn file_name_carries_stamp() {
        let report = sample_report(ts(0, 35, 0));
        assert_eq!(report.file_name(), "results_20250317_003500.txt");
        let parsed = timestamp_from_path(Path::new("/x/results_20250317_003500.txt"));
        assert_eq!(parsed, Some(ts(0, 35, 0)));
        assert_eq!(timestamp_from_path(Path::new("results_latest.txt")), None);
    }

    #[test]
    fn latest_report_picks_newest_stamp() {
        let dir = tempfile::tempdir().unwrap();
        sample_report(ts(0, 35, 0)).write_to(dir.path()).unwrap();
        sample_report(ts(9, 0, 0)).write_to(dir.path()).unwrap();
        std::fs::write(dir.path().join("results_notes.txt"), "accuracy: 0.1").unwrap();

        let latest = latest_report(dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("results_20250317_090000.txt"));

        let metrics = read_report(&latest).unwrap();
        assert_eq!(metrics.accuracy, Some(0.9245));
        assert_eq!(metrics.timestamp, Some(ts(9, 0, 0)));
    }

    #[test]
    fn latest_report_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_report(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn read_report_without_metrics_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results_20250317_003500.txt");
        std::fs::write(&path, "nothing to see").unwrap();
        assert!(matches!(read_report(&path), Err(ReportError::NoMetrics(_))));
    }

    #[test]
    fn finds_confusion_matrix_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(ts(0, 35, 0));
        let path = report.write_to(dir.path()).unwrap();
        assert_eq!(confusion_matrix_for(&path), None);

        let svg = report.confusion_matrix_path(dir.path(), "svg");
        std::fs::write(&svg, "<svg/>").unwrap();
        assert_eq!(confusion_matrix_for(&path), Some(svg));
    }
}
