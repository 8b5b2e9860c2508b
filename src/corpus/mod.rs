// Corpus types: the samples every model characterizes and scores.
//
// A sample is one short text (a tweet), optionally stamped with when it was
// written and optionally carrying a precomputed embedding. A dataset tags
// each sample with the identity of its author.

pub mod loader;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// One text sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Precomputed embedding, if the corpus has been through an encoder.
    pub embedding: Option<Vec<f64>>,
}

impl Sample {
    /// A bare text sample with no timestamp or embedding.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: None,
            embedding: None,
        }
    }

    /// A sample carrying a precomputed embedding.
    pub fn embedded(text: impl Into<String>, embedding: Vec<f64>) -> Self {
        Self {
            text: text.into(),
            timestamp: None,
            embedding: Some(embedding),
        }
    }
}

/// A sample attributed to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub user: String,
    pub sample: Sample,
}

/// A multi-user collection of attributed samples, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct users in order of first appearance.
    pub fn users(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.user.as_str()))
            .map(|r| r.user.clone())
            .collect()
    }

    /// Samples written by `user`, in dataset order.
    pub fn samples_for(&self, user: &str) -> Vec<Sample> {
        self.records
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.sample.clone())
            .collect()
    }

    /// Samples written by anyone other than `user`, in dataset order.
    pub fn samples_excluding(&self, user: &str) -> Vec<Sample> {
        self.records
            .iter()
            .filter(|r| r.user != user)
            .map(|r| r.sample.clone())
            .collect()
    }
}

/// Shuffle and split a dataset into `(train, test)`.
///
/// The test half holds the first `ceil(len * test_fraction)` shuffled
/// records. With a seed the split is reproducible for a given input order;
/// without one the shuffle draws from OS entropy.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: Option<u64>,
) -> anyhow::Result<(Dataset, Dataset)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        anyhow::bail!("Test fraction must be between 0 and 1 (exclusive), got {test_fraction}");
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut records = dataset.records.clone();
    records.shuffle(&mut rng);

    let n_test = (records.len() as f64 * test_fraction).ceil() as usize;
    let train = records.split_off(n_test.min(records.len()));

    Ok((Dataset::new(train), Dataset::new(records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Dataset {
        Dataset::new(
            (0..n)
                .map(|i| Record {
                    user: format!("@user{}", i % 3),
                    sample: Sample::from_text(format!("tweet {i}")),
                })
                .collect(),
        )
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&dataset(10), 0.4, Some(1)).unwrap();
        assert_eq!(test.len(), 4);
        assert_eq!(train.len(), 6);
    }

    #[test]
    fn test_split_is_reproducible_with_seed() {
        let data = dataset(50);
        let a = train_test_split(&data, 0.4, Some(7)).unwrap();
        let b = train_test_split(&data, 0.4, Some(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        assert!(train_test_split(&dataset(4), 0.0, Some(1)).is_err());
        assert!(train_test_split(&dataset(4), 1.0, Some(1)).is_err());
    }

    #[test]
    fn test_users_in_first_appearance_order() {
        assert_eq!(dataset(5).users(), vec!["@user0", "@user1", "@user2"]);
    }
}
