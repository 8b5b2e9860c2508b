// Cross-model comparison: each user's ROC under every model, side by side.
//
// A results root holds one run directory per model, as written by
// `write_report`. Not every model needs scores for every user; a missing
// pair is left blank rather than treated as an error.
//
//   <out>/<user>/rates_<model>.txt   one user's curve under one model
//   <out>/rates_<model>.txt          all users pooled, per model
//   <out>/auc.txt                    AUC grid, users by models

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::report::{load_scores, scan_scores, UserScores};
use super::roc::{auc, rates_table, roc_curve};

/// Default output subdirectory under the results root.
pub const COMPARISON_DIR: &str = "comparison";
pub const AUC_FILE: &str = "auc.txt";
/// Row label for every user's scores pooled together.
pub const POOLED_LABEL: &str = "all users";

/// One run directory's scores, named after the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRun {
    pub model: String,
    pub users: Vec<UserScores>,
}

/// AUC per (row, model). Rows are users in name order, then the pooled row.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub models: Vec<String>,
    /// `None` where a model has no scores for that user.
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl Comparison {
    pub fn auc(&self, label: &str, model: &str) -> Option<f64> {
        let column = self.models.iter().position(|m| m == model)?;
        let (_, aucs) = self.rows.iter().find(|(l, _)| l == label)?;
        aucs.get(column).copied().flatten()
    }

    /// Fixed-width text grid, `-` for missing cells.
    pub fn table(&self) -> String {
        let label_width = self
            .rows
            .iter()
            .map(|(l, _)| l.chars().count())
            .chain(std::iter::once(4))
            .max()
            .unwrap_or(4);

        let mut out = format!("{:<label_width$}", "user");
        for model in &self.models {
            let _ = write!(out, " {:>w$}", model, w = model.len().max(8));
        }
        out.push('\n');

        for (label, aucs) in &self.rows {
            let _ = write!(out, "{label:<label_width$}");
            for (model, cell) in self.models.iter().zip(aucs) {
                let w = model.len().max(8);
                match cell {
                    Some(a) => {
                        let _ = write!(out, " {a:>w$.3}");
                    }
                    None => {
                        let _ = write!(out, " {:>w$}", "-");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read one run directory. The model is named after the directory.
pub fn load_run(run_dir: &Path) -> Result<ModelRun> {
    let model = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("{} does not name a run directory", run_dir.display()))?;
    Ok(ModelRun {
        model: model.to_string(),
        users: load_scores(run_dir)?,
    })
}

/// Read every run directly under `results_root`, sorted by model name.
/// Directories without score files, such as an earlier comparison, are
/// skipped.
pub fn load_runs(results_root: &Path) -> Result<Vec<ModelRun>> {
    let entries = std::fs::read_dir(results_root).with_context(|| {
        format!("Failed to read results directory {}", results_root.display())
    })?;

    let mut runs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_dir() || name == COMPARISON_DIR {
            continue;
        }
        let users = scan_scores(&path)?;
        if users.is_empty() {
            debug!(dir = %path.display(), "No scores in directory, skipping");
            continue;
        }
        runs.push(ModelRun {
            model: name.to_string(),
            users,
        });
    }

    if runs.is_empty() {
        anyhow::bail!(
            "No run directories with scores under {} (run `penprint scores` once per model first)",
            results_root.display()
        );
    }
    runs.sort_by(|a, b| a.model.cmp(&b.model));
    Ok(runs)
}

/// Write every rates table and the AUC grid under `out_dir`.
pub fn write_comparison(runs: &[ModelRun], out_dir: &Path) -> Result<Comparison> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let users: BTreeSet<&str> = runs
        .iter()
        .flat_map(|r| r.users.iter().map(|u| u.user.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(users.len() + 1);
    for user in users {
        let user_dir = out_dir.join(user);
        std::fs::create_dir_all(&user_dir)
            .with_context(|| format!("Failed to create {}", user_dir.display()))?;

        let mut aucs = Vec::with_capacity(runs.len());
        for run in runs {
            let Some(scores) = run.users.iter().find(|u| u.user == user) else {
                aucs.push(None);
                continue;
            };
            let points = roc_curve(&scores.own, &scores.other)
                .with_context(|| format!("{user} under {}", run.model))?;
            write_text(
                &user_dir.join(format!("rates_{}.txt", run.model)),
                &rates_table(&points),
            )?;
            aucs.push(Some(auc(&points)));
        }
        rows.push((user.to_string(), aucs));
    }

    let mut pooled = Vec::with_capacity(runs.len());
    for run in runs {
        let own: Vec<f64> = run.users.iter().flat_map(|u| u.own.iter().copied()).collect();
        let other: Vec<f64> = run.users.iter().flat_map(|u| u.other.iter().copied()).collect();
        let points = roc_curve(&own, &other).with_context(|| format!("pooled {}", run.model))?;
        write_text(
            &out_dir.join(format!("rates_{}.txt", run.model)),
            &rates_table(&points),
        )?;
        pooled.push(Some(auc(&points)));
    }
    rows.push((POOLED_LABEL.to_string(), pooled));

    let comparison = Comparison {
        models: runs.iter().map(|r| r.model.clone()).collect(),
        rows,
    };
    write_text(&out_dir.join(AUC_FILE), &comparison.table())?;

    info!(
        dir = %out_dir.display(),
        models = comparison.models.len(),
        users = comparison.rows.len() - 1,
        "Wrote model comparison"
    );
    Ok(comparison)
}
