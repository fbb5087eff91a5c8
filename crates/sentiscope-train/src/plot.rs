//! Evaluation charts rendered as standalone SVG documents: the confusion-matrix
//! heatmap and the ROC curve.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sentiscope_core::{ConfusionMatrix, EvaluationReport};
use tracing::info;

const CELL: u32 = 120;
const LEFT: u32 = 110;
const TOP: u32 = 60;
const CLASS_NAMES: [&str; 2] = ["negative", "positive"];

/// Cell fill on a white-to-blue ramp, `t` in `[0, 1]`.
fn fill(t: f64) -> String {
    let lerp = |from: f64, to: f64| (from + (to - from) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        lerp(247.0, 8.0),
        lerp(251.0, 48.0),
        lerp(255.0, 107.0)
    )
}

/// Render `cm` with true labels on rows and predicted labels on columns.
pub fn confusion_matrix_svg(cm: &ConfusionMatrix, title: &str) -> String {
    let rows = cm.as_rows();
    let max = rows.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let width = LEFT + 2 * CELL + 30;
    let height = TOP + 2 * CELL + 60;

    let mut svg = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" font-size="18" text-anchor="middle">{}</text>"#,
        LEFT + CELL,
        escape(title)
    );

    for (r, row) in rows.iter().enumerate() {
        for (c, &count) in row.iter().enumerate() {
            let t = count as f64 / max;
            let x = LEFT + c as u32 * CELL;
            let y = TOP + r as u32 * CELL;
            let ink = if t > 0.5 { "white" } else { "black" };
            let _ = writeln!(
                svg,
                r##"<rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" fill="{}" stroke="#444"/>"##,
                fill(t)
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{}" font-size="24" text-anchor="middle" fill="{ink}">{count}</text>"#,
                x + CELL / 2,
                y + CELL / 2 + 8
            );
        }
    }

    for (i, name) in CLASS_NAMES.iter().enumerate() {
        let offset = i as u32 * CELL + CELL / 2;
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="14" text-anchor="middle">{name}</text>"#,
            LEFT + offset,
            TOP + 2 * CELL + 22
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="14" text-anchor="end">{name}</text>"#,
            LEFT - 10,
            TOP + offset + 5
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="14" text-anchor="middle">Predicted</text>"#,
        LEFT + CELL,
        TOP + 2 * CELL + 46
    );
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{}" font-size="14" text-anchor="middle" transform="rotate(-90 18 {})">True</text>"#,
        TOP + CELL,
        TOP + CELL
    );
    svg.push_str("</svg>\n");
    svg
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const PLOT: u32 = 300;

/// Render an ROC curve from `(fpr, tpr)` points, with the chance diagonal.
pub fn roc_curve_svg(points: &[(f64, f64)], auc: Option<f64>, title: &str) -> String {
    let width = LEFT + PLOT + 30;
    let height = TOP + PLOT + 60;
    let px = |fpr: f64| LEFT as f64 + fpr.clamp(0.0, 1.0) * PLOT as f64;
    let py = |tpr: f64| (TOP + PLOT) as f64 - tpr.clamp(0.0, 1.0) * PLOT as f64;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" font-size="18" text-anchor="middle">{}</text>"#,
        LEFT + PLOT / 2,
        escape(title)
    );
    let _ = writeln!(
        svg,
        r##"<rect x="{LEFT}" y="{TOP}" width="{PLOT}" height="{PLOT}" fill="none" stroke="#444"/>"##
    );
    let _ = writeln!(
        svg,
        r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#999" stroke-dasharray="6 4"/>"##,
        px(0.0),
        py(0.0),
        px(1.0),
        py(1.0)
    );

    let path: Vec<String> = points
        .iter()
        .map(|&(fpr, tpr)| format!("{:.1},{:.1}", px(fpr), py(tpr)))
        .collect();
    let _ = writeln!(
        svg,
        r##"<polyline points="{}" fill="none" stroke="#08306b" stroke-width="2"/>"##,
        path.join(" ")
    );

    let label = match auc {
        Some(auc) => format!("AUC = {auc:.4}"),
        None => "AUC undefined".to_string(),
    };
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="14" text-anchor="end">{label}</text>"#,
        LEFT + PLOT - 10,
        TOP + PLOT - 12
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="14" text-anchor="middle">False positive rate</text>"#,
        LEFT + PLOT / 2,
        TOP + PLOT + 40
    );
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{}" font-size="14" text-anchor="middle" transform="rotate(-90 18 {})">True positive rate</text>"#,
        TOP + PLOT / 2,
        TOP + PLOT / 2
    );
    svg.push_str("</svg>\n");
    svg
}

/// Write `roc_curve_<stamp>.svg` next to the report.
pub fn write_roc_curve(
    report: &EvaluationReport,
    points: &[(f64, f64)],
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = report.roc_curve_path(dir, "svg");
    std::fs::write(&path, roc_curve_svg(points, report.roc_auc, "ROC Curve"))
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote ROC curve");
    Ok(path)
}

/// Write `confusion_matrix_<stamp>.svg` next to the report.
pub fn write_confusion_matrix(report: &EvaluationReport, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = report.confusion_matrix_path(dir, "svg");
    std::fs::write(&path, confusion_matrix_svg(&report.confusion, "Confusion Matrix"))
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote confusion matrix");
    Ok(path)
}
