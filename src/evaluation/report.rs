// Report persistence: everything an evaluation run leaves on disk.
//
// Layout, one directory per user under the run prefix:
//
//   <output>/<prefix>/summary.json
//   <output>/<prefix>/<user>/own.json             held-out own scores
//   <output>/<prefix>/<user>/other.json           held-out other scores
//   <output>/<prefix>/<user>/<user>_model.json    fitted model
//   <output>/<prefix>/<user>/<user>_conf_mat.txt  matrix per threshold
//   <output>/<prefix>/<user>/<user>_details.txt   counts and rates

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::{EvaluationReport, ThresholdResult, UserEvaluation};

pub const OWN_SCORES_FILE: &str = "own.json";
pub const OTHER_SCORES_FILE: &str = "other.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Held-out scores for one user, as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct UserScores {
    pub user: String,
    pub own: Vec<f64>,
    pub other: Vec<f64>,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    threshold: f64,
    true_positive_rate: Option<f64>,
    false_positive_rate: Option<f64>,
    matrix: &'a super::confusion::ConfusionMatrix,
}

#[derive(Serialize)]
struct Summary<'a> {
    model: &'a str,
    users: Vec<&'a str>,
    totals: Vec<SummaryRow<'a>>,
}

/// Render a rate for text output, `n/a` when undefined.
pub fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}"))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Matrices for every threshold, one block each.
pub fn confusion_text(results: &[ThresholdResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(out, "threshold {}", result.threshold);
        let _ = writeln!(out, "{}\n", result.matrix);
    }
    out
}

/// Human-readable summary of one user's run.
pub fn details_text(evaluation: &UserEvaluation) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} test samples for {} and {} for others ({} training samples).",
        evaluation.test_count, evaluation.user, evaluation.test_count, evaluation.train_count
    );
    for result in &evaluation.results {
        let m = &result.matrix;
        let _ = writeln!(out);
        let _ = writeln!(out, "threshold {}", result.threshold);
        let _ = writeln!(
            out,
            "  TPR: {}, FPR: {}",
            format_rate(m.true_positive_rate()),
            format_rate(m.false_positive_rate())
        );
        let _ = writeln!(
            out,
            "  fraud:   precision {}, recall {}",
            format_rate(m.fraud_precision()),
            format_rate(m.fraud_recall())
        );
        let _ = writeln!(
            out,
            "  genuine: precision {}, recall {}",
            format_rate(m.genuine_precision()),
            format_rate(m.genuine_recall())
        );
    }
    out
}

/// Write one user's directory. Returns its path.
pub fn write_user(run_dir: &Path, evaluation: &UserEvaluation) -> Result<PathBuf> {
    let user_dir = run_dir.join(&evaluation.user);
    std::fs::create_dir_all(&user_dir)
        .with_context(|| format!("Failed to create {}", user_dir.display()))?;

    write_json(&user_dir.join(OWN_SCORES_FILE), &evaluation.own_scores)?;
    write_json(&user_dir.join(OTHER_SCORES_FILE), &evaluation.other_scores)?;
    evaluation
        .model
        .save(&user_dir.join(format!("{}_model.json", evaluation.user)))?;

    let conf_path = user_dir.join(format!("{}_conf_mat.txt", evaluation.user));
    std::fs::write(&conf_path, confusion_text(&evaluation.results))
        .with_context(|| format!("Failed to write {}", conf_path.display()))?;

    let details_path = user_dir.join(format!("{}_details.txt", evaluation.user));
    std::fs::write(&details_path, details_text(evaluation))
        .with_context(|| format!("Failed to write {}", details_path.display()))?;

    debug!(user = %evaluation.user, dir = %user_dir.display(), "Wrote user report");
    Ok(user_dir)
}

/// Write the whole run under `<output_dir>/<prefix>/`. The prefix defaults
/// to the model name. Returns the run directory.
pub fn write_report(
    output_dir: &Path,
    prefix: Option<&str>,
    report: &EvaluationReport,
) -> Result<PathBuf> {
    let run_dir = output_dir.join(prefix.unwrap_or(&report.model_name));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create {}", run_dir.display()))?;

    for evaluation in &report.users {
        write_user(&run_dir, evaluation)?;
    }

    let summary = Summary {
        model: &report.model_name,
        users: report.users.iter().map(|u| u.user.as_str()).collect(),
        totals: report
            .totals
            .iter()
            .map(|t| SummaryRow {
                threshold: t.threshold,
                true_positive_rate: t.matrix.true_positive_rate(),
                false_positive_rate: t.matrix.false_positive_rate(),
                matrix: &t.matrix,
            })
            .collect(),
    };
    write_json(&run_dir.join(SUMMARY_FILE), &summary)?;

    info!(
        dir = %run_dir.display(),
        users = report.users.len(),
        "Wrote evaluation report"
    );
    Ok(run_dir)
}

fn read_scores(path: &Path) -> Result<Vec<f64>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON array of scores", path.display()))
}

/// Read back every user's score pair from a run directory, sorted by user.
/// Directories without both score files are skipped.
pub fn load_scores(run_dir: &Path) -> Result<Vec<UserScores>> {
    let all = scan_scores(run_dir)?;
    if all.is_empty() {
        anyhow::bail!(
            "No score files found under {} (run `penprint scores` first)",
            run_dir.display()
        );
    }
    Ok(all)
}

/// Like `load_scores`, but a directory without any scores is not an error.
pub(super) fn scan_scores(run_dir: &Path) -> Result<Vec<UserScores>> {
    let entries = std::fs::read_dir(run_dir)
        .with_context(|| format!("Failed to read run directory {}", run_dir.display()))?;

    let mut all = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let own_path = path.join(OWN_SCORES_FILE);
        let other_path = path.join(OTHER_SCORES_FILE);
        if !own_path.is_file() || !other_path.is_file() {
            continue;
        }
        let Some(user) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        all.push(UserScores {
            user: user.to_string(),
            own: read_scores(&own_path)?,
            other: read_scores(&other_path)?,
        });
    }

    all.sort_by(|a, b| a.user.cmp(&b.user));
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::confusion::ConfusionMatrix;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(0.756)), "0.76");
        assert_eq!(format_rate(None), "n/a");
    }

    #[test]
    fn test_confusion_text_has_block_per_threshold() {
        let results = vec![
            ThresholdResult {
                threshold: 0.2,
                matrix: ConfusionMatrix::from_predictions(&[false], &[true]),
            },
            ThresholdResult {
                threshold: 0.4,
                matrix: ConfusionMatrix::default(),
            },
        ];
        let text = confusion_text(&results);
        assert!(text.contains("threshold 0.2"));
        assert!(text.contains("threshold 0.4"));
        assert_eq!(text.matches("genuine").count(), 2);
    }

    #[test]
    fn test_load_scores_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_scores(dir.path()).is_err());
    }
}
