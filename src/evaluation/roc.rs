// ROC analysis over raw similarity scores.
//
// Here the positive class is the author's own text: sweeping a cut-off down
// from +inf, a sample counts as "accepted" when its score is at or above the
// cut-off. Each distinct score yields one point.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    /// Fraction of own samples accepted.
    pub true_positive_rate: f64,
    /// Fraction of other samples accepted.
    pub false_positive_rate: f64,
}

/// ROC curve from own and other scores, starting at (0, 0) with an
/// infinite threshold and ending at (1, 1).
pub fn roc_curve(own: &[f64], other: &[f64]) -> Result<Vec<RocPoint>> {
    if own.is_empty() || other.is_empty() {
        anyhow::bail!(
            "ROC needs both own and other scores (got {} own, {} other)",
            own.len(),
            other.len()
        );
    }
    if own.iter().chain(other).any(|s| s.is_nan()) {
        anyhow::bail!("Scores contain NaN");
    }

    let mut thresholds: Vec<f64> = own.iter().chain(other).copied().collect();
    thresholds.sort_by(|a, b| b.total_cmp(a));
    thresholds.dedup();

    let rate = |scores: &[f64], t: f64| {
        scores.iter().filter(|&&s| s >= t).count() as f64 / scores.len() as f64
    };

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        true_positive_rate: 0.0,
        false_positive_rate: 0.0,
    }];
    points.extend(thresholds.into_iter().map(|t| RocPoint {
        threshold: t,
        true_positive_rate: rate(own, t),
        false_positive_rate: rate(other, t),
    }));
    Ok(points)
}

/// Area under a ROC curve by the trapezoid rule.
pub fn auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = w[1].false_positive_rate - w[0].false_positive_rate;
            dx * (w[1].true_positive_rate + w[0].true_positive_rate) / 2.0
        })
        .sum()
}

/// Fixed-width text table of a curve, one point per line.
pub fn rates_table(points: &[RocPoint]) -> String {
    let mut out = format!(
        "{:>14} {:>14} {:>14}\n",
        "false_pos_rate", "true_pos_rate", "threshold"
    );
    for p in points {
        out.push_str(&format!(
            "{:>14.3} {:>14.3} {:>14.3}\n",
            p.false_positive_rate, p.true_positive_rate, p.threshold
        ));
    }
    out
}
