// Colored terminal output for evaluation runs, ROC tables, model
// comparisons and checks.
//
// The main.rs subcommands delegate all formatting here.

use colored::Colorize;

use crate::evaluation::compare::Comparison;
use crate::evaluation::report::format_rate;
use crate::evaluation::roc::RocPoint;
use crate::evaluation::{EvaluationReport, ThresholdResult};

/// Display per-user and overall rates for an evaluation run.
pub fn display_evaluation(report: &EvaluationReport) {
    if report.users.is_empty() {
        println!("No users had enough held-out samples to evaluate.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== Evaluation: {} ({} users) ===",
            report.model_name,
            report.users.len()
        )
        .bold()
    );

    for (i, total) in report.totals.iter().enumerate() {
        println!();
        println!("  {} {}", "Threshold".dimmed(), total.threshold);
        println!(
            "  {:<28} {:>6} {:>7} {:>7}",
            "User".dimmed(),
            "Tests".dimmed(),
            "TPR".dimmed(),
            "FPR".dimmed(),
        );
        println!("  {}", "-".repeat(51).dimmed());

        for user in &report.users {
            if let Some(result) = user.results.get(i) {
                print_row(&user.user, user.test_count, result);
            }
        }

        println!("  {}", "-".repeat(51).dimmed());
        let overall = (total.matrix.total() / 2) as usize;
        print_row("all users", overall, total);
    }
    println!();
}

fn print_row(label: &str, tests: usize, result: &ThresholdResult) {
    let m = &result.matrix;
    println!(
        "  {:<28} {:>6} {:>7} {:>7}",
        super::truncate_chars(label, 25),
        tests,
        colorize_tpr(m.true_positive_rate()),
        colorize_fpr(m.false_positive_rate()),
    );
}

/// Display a ROC table with its AUC.
pub fn display_roc(label: &str, points: &[RocPoint], auc: f64) {
    println!(
        "\n{}  AUC {}",
        format!("=== ROC: {label} ===").bold(),
        format!("{auc:.3}").bold()
    );
    println!(
        "  {:>10} {:>8} {:>8}",
        "Threshold".dimmed(),
        "TPR".dimmed(),
        "FPR".dimmed()
    );
    for p in points {
        println!(
            "  {:>10.3} {:>8.3} {:>8.3}",
            p.threshold, p.true_positive_rate, p.false_positive_rate
        );
    }
}

/// Display the AUC grid, highlighting the best model on each row.
pub fn display_comparison(comparison: &Comparison) {
    println!(
        "\n{}",
        format!("=== Model comparison ({} models) ===", comparison.models.len()).bold()
    );
    print!("  {:<28}", "User".dimmed());
    for model in &comparison.models {
        print!(" {:>w$}", model.dimmed(), w = model.len().max(8));
    }
    println!();

    for (label, aucs) in &comparison.rows {
        let best = aucs.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        print!("  {:<28}", super::truncate_chars(label, 25));
        for (model, cell) in comparison.models.iter().zip(aucs) {
            let w = model.len().max(8);
            let text = match cell {
                Some(a) if *a >= best => format!("{a:.3}").green().bold(),
                Some(a) => format!("{a:.3}").normal(),
                None => "-".dimmed(),
            };
            print!(" {text:>w$}");
        }
        println!();
    }
    println!();
}

/// Display scores and verdicts for ad-hoc texts.
pub fn display_check(model_name: &str, threshold: f64, rows: &[(String, f64, bool)]) {
    println!(
        "\n{}",
        format!("=== Check against {model_name} (threshold {threshold}) ===").bold()
    );
    for (text, score, flagged) in rows {
        let verdict = if *flagged {
            "inconsistent".red().bold()
        } else {
            "consistent".green()
        };
        println!(
            "  {:>7.3}  {:<13} {}",
            score,
            verdict,
            super::truncate_chars(text, 80).dimmed()
        );
    }
    println!();
}

/// Catching impostors: higher is better.
fn colorize_tpr(rate: Option<f64>) -> colored::ColoredString {
    let text = format_rate(rate);
    match rate {
        Some(r) if r >= 0.8 => text.green(),
        Some(r) if r >= 0.5 => text.yellow(),
        Some(_) => text.red(),
        None => text.dimmed(),
    }
}

/// Flagging the author: lower is better.
fn colorize_fpr(rate: Option<f64>) -> colored::ColoredString {
    let text = format_rate(rate);
    match rate {
        Some(r) if r <= 0.2 => text.green(),
        Some(r) if r <= 0.5 => text.yellow(),
        Some(_) => text.red(),
        None => text.dimmed(),
    }
}
