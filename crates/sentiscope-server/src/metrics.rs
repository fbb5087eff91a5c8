//! Model quality figures for `/model-metrics`.
//!
//! Sources are tried in order: the newest evaluation report with metrics, the model's
//! `model_info.json` sidecar, then fixed sample numbers. Every source yields
//! the same field set; `source` says which one answered.

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use sentiscope_core::report::{read_report, reports_newest_first};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const DEFAULT_ACCURACY: f64 = 0.9245;
pub const DEFAULT_F1: f64 = 0.9187;
pub const DEFAULT_PRECISION: f64 = 0.9312;
pub const DEFAULT_RECALL: f64 = 0.9065;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSource {
    Report,
    Sidecar,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    /// ISO-8601, without offset.
    pub timestamp: String,
    pub source: MetricsSource,
}

impl ModelMetrics {
    fn defaults(now: NaiveDateTime) -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            f1: DEFAULT_F1,
            precision: DEFAULT_PRECISION,
            recall: DEFAULT_RECALL,
            timestamp: iso(now),
            source: MetricsSource::Default,
        }
    }
}

fn iso(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Resolve metrics using the current local time for non-report sources.
pub fn load_metrics(evaluation_dir: &Path, model_dir: &Path) -> ModelMetrics {
    load_metrics_at(evaluation_dir, model_dir, Local::now().naive_local())
}

pub fn load_metrics_at(evaluation_dir: &Path, model_dir: &Path, now: NaiveDateTime) -> ModelMetrics {
    if let Some(metrics) = from_report(evaluation_dir, now) {
        return metrics;
    }
    if let Some(sidecar) = sentiscope_ai::info::read_sidecar(model_dir) {
        return from_sidecar(&sidecar, now);
    }
    warn!(
        dir = %evaluation_dir.display(),
        "no evaluation report or model sidecar, returning sample metrics"
    );
    ModelMetrics::defaults(now)
}

fn from_report(dir: &Path, now: NaiveDateTime) -> Option<ModelMetrics> {
    let reports = match reports_newest_first(dir) {
        Ok(reports) => reports,
        Err(e) => {
            warn!(error = %e, "cannot list evaluation reports");
            return None;
        }
    };
    let (path, parsed) = reports.into_iter().find_map(|path| match read_report(&path) {
        Ok(parsed) => Some((path, parsed)),
        Err(e) => {
            warn!(error = %e, "skipping evaluation report");
            None
        }
    })?;
    info!(report = %path.display(), "model metrics from evaluation report");
    Some(ModelMetrics {
        accuracy: parsed.accuracy.unwrap_or(DEFAULT_ACCURACY),
        f1: parsed.f1.unwrap_or(DEFAULT_F1),
        precision: parsed.precision.unwrap_or(DEFAULT_PRECISION),
        recall: parsed.recall.unwrap_or(DEFAULT_RECALL),
        timestamp: iso(parsed.timestamp.unwrap_or(now)),
        source: MetricsSource::Report,
    })
}

fn from_sidecar(sidecar: &Map<String, Value>, now: NaiveDateTime) -> ModelMetrics {
    let get = |key: &str, default: f64| sidecar.get(key).and_then(Value::as_f64).unwrap_or(default);
    ModelMetrics {
        accuracy: get("accuracy", DEFAULT_ACCURACY),
        f1: get("f1_score", DEFAULT_F1),
        precision: get("precision", DEFAULT_PRECISION),
        recall: get("recall", DEFAULT_RECALL),
        timestamp: iso(now),
        source: MetricsSource::Sidecar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 17)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    #[test]
    fn defaults_when_nothing_on_disk() {
        let eval = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        let m = load_metrics_at(&eval.path().join("missing"), model.path(), now());
        assert_eq!(m.source, MetricsSource::Default);
        assert_eq!(m.accuracy, DEFAULT_ACCURACY);
        assert_eq!(m.timestamp, "2025-03-17T12:00:00");
    }

    #[test]
    fn sidecar_used_without_report() {
        let eval = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        std::fs::write(
            model.path().join("model_info.json"),
            r#"{"accuracy": 0.8, "f1_score": 0.75, "model_type": "distilbert"}"#,
        )
        .unwrap();
        let m = load_metrics_at(eval.path(), model.path(), now());
        assert_eq!(m.source, MetricsSource::Sidecar);
        assert_eq!(m.accuracy, 0.8);
        assert_eq!(m.f1, 0.75);
        assert_eq!(m.precision, DEFAULT_PRECISION);
        assert_eq!(m.recall, DEFAULT_RECALL);
    }

    #[test]
    fn newest_report_wins() {
        let eval = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        std::fs::write(
            eval.path().join("results_20250101_000000.txt"),
            "- accuracy: 0.5000\n",
        )
        .unwrap();
        std::fs::write(
            eval.path().join("results_20250316_093000.txt"),
            "- accuracy: 0.9100\n- f1: 0.9000\n- precision: 0.8800\n- recall: 0.9200\n",
        )
        .unwrap();
        std::fs::write(model.path().join("model_info.json"), r#"{"accuracy": 0.1}"#).unwrap();

        let m = load_metrics_at(eval.path(), model.path(), now());
        assert_eq!(m.source, MetricsSource::Report);
        assert_eq!(m.accuracy, 0.91);
        assert_eq!(m.recall, 0.92);
        assert_eq!(m.timestamp, "2025-03-16T09:30:00");
    }

    #[test]
    fn older_report_used_when_newest_is_empty() {
        let eval = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        std::fs::write(
            eval.path().join("results_20250310_080000.txt"),
            "- accuracy: 0.8700\n- f1: 0.8600\n",
        )
        .unwrap();
        std::fs::write(
            eval.path().join("results_20250316_093000.txt"),
            "Model Evaluation Results\n(run aborted)\n",
        )
        .unwrap();
        std::fs::write(model.path().join("model_info.json"), r#"{"accuracy": 0.1}"#).unwrap();

        let m = load_metrics_at(eval.path(), model.path(), now());
        assert_eq!(m.source, MetricsSource::Report);
        assert_eq!(m.accuracy, 0.87);
        assert_eq!(m.f1, 0.86);
        assert_eq!(m.precision, DEFAULT_PRECISION);
        assert_eq!(m.timestamp, "2025-03-10T08:00:00");
    }

    #[test]
    fn non_numeric_report_values_fall_through() {
        let eval = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        std::fs::write(
            eval.path().join("results_20250316_093000.txt"),
            "- accuracy: nan\n- f1: inf\n",
        )
        .unwrap();
        let m = load_metrics_at(eval.path(), model.path(), now());
        assert_eq!(m.source, MetricsSource::Default);
        assert!(m.accuracy.is_finite() && m.f1.is_finite());
    }

    #[test]
    fn same_fields_from_every_source() {
        let keys = |m: &ModelMetrics| -> Vec<String> {
            let mut keys: Vec<_> = serde_json::to_value(m)
                .unwrap()
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect();
            keys.sort();
            keys
        };
        let default = ModelMetrics::defaults(now());
        let sidecar = from_sidecar(&Map::new(), now());
        assert_eq!(keys(&default), keys(&sidecar));
        assert_eq!(
            keys(&default),
            ["accuracy", "f1", "precision", "recall", "source", "timestamp"]
        );
    }
}
