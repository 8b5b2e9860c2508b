// Evaluation harness: how well does a signature tell its author apart?
//
// For every user: fit a signature on their training rows, score their
// held-out rows (should pass) and an equal number of other users' held-out
// rows (should be flagged), then tally a confusion matrix per threshold.
// Signatures are fitted and scored once per user; each threshold only
// re-runs the cheap classification step.

pub mod compare;
pub mod confusion;
pub mod report;
pub mod roc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::corpus::{train_test_split, Dataset, Sample};
use crate::models::traits::AuthorshipModel;
use crate::models::Model;
use confusion::ConfusionMatrix;

/// Default held-out fraction.
pub const DEFAULT_TEST_FRACTION: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    /// Fraction of rows held out for testing.
    pub test_fraction: f64,
    /// Shuffle seed; `None` gives a different split every run.
    pub seed: Option<u64>,
    /// Thresholds to classify at. Must be non-empty.
    pub thresholds: Vec<f64>,
    /// Restrict to these users; `None` means every user with training rows.
    pub users: Option<Vec<String>>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: Some(1),
            thresholds: vec![crate::models::traits::DEFAULT_THRESHOLD],
            users: None,
        }
    }
}

/// Confusion matrix at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub threshold: f64,
    pub matrix: ConfusionMatrix,
}

/// Everything measured for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvaluation {
    pub user: String,
    pub train_count: usize,
    /// Own and other test sets after balancing; always equal.
    pub test_count: usize,
    pub own_scores: Vec<f64>,
    pub other_scores: Vec<f64>,
    pub results: Vec<ThresholdResult>,
    /// The fitted model, reset to its pre-sweep hyperparameters.
    pub model: Model,
}

/// Per-user results plus matrices summed across users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub users: Vec<UserEvaluation>,
    pub totals: Vec<ThresholdResult>,
}

/// Rows for one user's train/test problem, before balancing.
pub struct UserSplit<'a> {
    pub user: &'a str,
    pub own_train: &'a [Sample],
    pub context: &'a [Sample],
    pub own_test: &'a [Sample],
    pub other_test: &'a [Sample],
}

fn check_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        anyhow::bail!("At least one threshold is required");
    }
    if let Some(t) = thresholds.iter().find(|t| !t.is_finite()) {
        anyhow::bail!("Thresholds must be finite numbers, got {t}");
    }
    Ok(())
}

/// Fit, score and classify one user's problem.
///
/// Own and other test sets are truncated to the smaller of the two so the
/// matrix is balanced; the first rows are kept.
pub fn evaluate_user(
    model: &mut Model,
    split: &UserSplit<'_>,
    thresholds: &[f64],
) -> Result<UserEvaluation> {
    check_thresholds(thresholds)?;
    if split.own_train.is_empty() {
        anyhow::bail!("User {} has no training samples", split.user);
    }

    let n = split.own_test.len().min(split.other_test.len());
    if n < split.own_test.len() || n < split.other_test.len() {
        debug!(
            user = split.user,
            own = split.own_test.len(),
            other = split.other_test.len(),
            kept = n,
            "Balanced test sets"
        );
    }
    let own_test = &split.own_test[..n];
    let other_test = &split.other_test[..n];

    let context = (!split.context.is_empty()).then_some(split.context);
    model.characterize(split.own_train, context)?;

    let own_scores = model.similarity_score(own_test)?;
    let other_scores = model.similarity_score(other_test)?;

    let base = *model.hyperparameters();
    let mut results = Vec::with_capacity(thresholds.len());
    for &threshold in thresholds {
        model.set_threshold(threshold)?;
        let own_flags: Vec<bool> = own_scores.iter().map(|&s| model.classify(s)).collect();
        let other_flags: Vec<bool> = other_scores.iter().map(|&s| model.classify(s)).collect();
        results.push(ThresholdResult {
            threshold,
            matrix: ConfusionMatrix::from_predictions(&own_flags, &other_flags),
        });
    }
    model.set_hyperparameters(base)?;

    Ok(UserEvaluation {
        user: split.user.to_string(),
        train_count: split.own_train.len(),
        test_count: n,
        own_scores,
        other_scores,
        results,
        model: model.clone(),
    })
}

/// Run the full harness over a multi-user dataset.
///
/// Context for characterization and the "other" test rows come from the
/// other users in the same split. When `negative_pool` is given it is split
/// with the same fraction and seed and supplies both instead, with the
/// target user's own rows removed and the context capped to the size of the
/// user's own test set.
///
/// A user whose signature cannot be fitted is logged and left out of the
/// report, the same as a user without a balanced test set.
pub fn evaluate(
    model: &mut Model,
    dataset: &Dataset,
    negative_pool: Option<&Dataset>,
    config: &EvaluationConfig,
) -> Result<EvaluationReport> {
    check_thresholds(&config.thresholds)?;

    let (train, test) = train_test_split(dataset, config.test_fraction, config.seed)?;
    let pool = negative_pool
        .map(|p| train_test_split(p, config.test_fraction, config.seed))
        .transpose()?;

    let users = match &config.users {
        Some(users) => users.clone(),
        None => train.users(),
    };
    if users.is_empty() {
        anyhow::bail!("No users to evaluate");
    }

    info!(
        model = %model.name(),
        users = users.len(),
        train = train.len(),
        test = test.len(),
        thresholds = config.thresholds.len(),
        "Starting evaluation"
    );

    let pb = ProgressBar::new(users.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("  Users [{bar:30}] {pos}/{len} ({eta})")?);

    let mut evaluations = Vec::with_capacity(users.len());
    let mut totals: Vec<ThresholdResult> = config
        .thresholds
        .iter()
        .map(|&threshold| ThresholdResult {
            threshold,
            matrix: ConfusionMatrix::default(),
        })
        .collect();

    for user in &users {
        let own_train = train.samples_for(user);
        if own_train.is_empty() {
            anyhow::bail!("User {user} has no training samples");
        }
        let own_test = test.samples_for(user);
        let (context, other_test) = match &pool {
            Some((pool_train, pool_test)) => {
                // Pool context is capped to the own test count
                let mut context = pool_train.samples_excluding(user);
                context.truncate(own_test.len());
                (context, pool_test.samples_excluding(user))
            }
            None => (train.samples_excluding(user), test.samples_excluding(user)),
        };

        if own_test.is_empty() || other_test.is_empty() {
            warn!(
                user = %user,
                own = own_test.len(),
                other = other_test.len(),
                "No balanced test set available, skipping user"
            );
            pb.inc(1);
            continue;
        }

        let split = UserSplit {
            user,
            own_train: &own_train,
            context: &context,
            own_test: &own_test,
            other_test: &other_test,
        };
        let evaluation = match evaluate_user(model, &split, &config.thresholds) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(user = %user, error = %e, "Could not fit a signature, skipping user");
                pb.inc(1);
                continue;
            }
        };

        for (total, result) in totals.iter_mut().zip(&evaluation.results) {
            total.matrix += result.matrix;
        }
        evaluations.push(evaluation);
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        model = %model.name(),
        evaluated = evaluations.len(),
        "Evaluation complete"
    );

    Ok(EvaluationReport {
        model_name: model.name(),
        users: evaluations,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;

    fn embedded(v: &[f64], n: usize) -> Vec<Sample> {
        (0..n).map(|_| Sample::embedded("", v.to_vec())).collect()
    }

    #[test]
    fn test_evaluate_user_balances_to_smaller_set() {
        let mut model = ModelKind::Mean.build(0);
        let own_train = embedded(&[1.0, 0.0], 5);
        let own_test = embedded(&[1.0, 0.0], 10);
        let other_test = embedded(&[0.0, 1.0], 8);
        let split = UserSplit {
            user: "@a",
            own_train: &own_train,
            context: &[],
            own_test: &own_test,
            other_test: &other_test,
        };

        let eval = evaluate_user(&mut model, &split, &[0.3]).unwrap();
        assert_eq!(eval.test_count, 8);
        assert_eq!(eval.own_scores.len(), 8);
        assert_eq!(eval.other_scores.len(), 8);
        let m = eval.results[0].matrix;
        assert_eq!(m.genuine_passed, 8);
        assert_eq!(m.fraud_flagged, 8);
    }

    #[test]
    fn test_sweep_restores_threshold() {
        let mut model = ModelKind::Mean.build(0);
        let own = embedded(&[1.0, 0.0], 3);
        let other = embedded(&[0.0, 1.0], 3);
        let split = UserSplit {
            user: "@a",
            own_train: &own,
            context: &[],
            own_test: &own,
            other_test: &other,
        };
        let eval = evaluate_user(&mut model, &split, &[0.1, 0.9]).unwrap();
        assert_eq!(eval.results.len(), 2);
        assert_eq!(model.hyperparameters().threshold, 0.3);
        assert_eq!(eval.model.hyperparameters().threshold, 0.3);
    }

    #[test]
    fn test_empty_thresholds_rejected() {
        let mut model = ModelKind::Mean.build(0);
        let own = embedded(&[1.0, 0.0], 3);
        let split = UserSplit {
            user: "@a",
            own_train: &own,
            context: &[],
            own_test: &own,
            other_test: &own,
        };
        assert!(evaluate_user(&mut model, &split, &[]).is_err());
    }
}
