// Authorship model trait: the capability every signature variant provides.
//
// A model is characterized once from a user's own corpus (plus, for some
// variants, a context corpus of other people's text), then scores and
// classifies new samples against that signature. Swapping variants never
// touches the evaluation harness.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::corpus::Sample;

/// Default classification threshold on the similarity score.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// What a model reads from each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// Raw text (term-frequency models).
    Text,
    /// Precomputed embedding vectors.
    Embedding,
}

/// Runtime-settable model knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Scores below this are flagged as inconsistent with the author.
    pub threshold: f64,
    /// Clustered models only: subtract each cluster's mean member
    /// similarity from the raw score before taking the best cluster.
    pub cluster_scaling: bool,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cluster_scaling: false,
        }
    }
}

impl Hyperparameters {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            anyhow::bail!("Threshold must be a finite number, got {}", self.threshold);
        }
        Ok(())
    }
}

/// The characterize / score / classify contract.
pub trait AuthorshipModel {
    /// Short identifier used in reports and output paths.
    fn name(&self) -> String;

    /// Which field of each sample the model consumes.
    fn input_kind(&self) -> InputKind;

    /// Build the signature from the author's own samples. `context` holds
    /// other authors' samples; variants that don't need it ignore it.
    /// Replaces any previous signature.
    fn characterize(&mut self, own: &[Sample], context: Option<&[Sample]>) -> Result<()>;

    /// Similarity of each sample to the signature, in input order.
    /// Higher means more like the author.
    fn similarity_score(&self, samples: &[Sample]) -> Result<Vec<f64>>;

    /// The threshold gate: `true` means flagged as inconsistent/fraudulent.
    fn classify(&self, score: f64) -> bool;

    fn hyperparameters(&self) -> &Hyperparameters;

    fn set_hyperparameters(&mut self, params: Hyperparameters) -> Result<()>;

    /// Convenience for changing only the threshold.
    fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        let params = Hyperparameters {
            threshold,
            ..*self.hyperparameters()
        };
        self.set_hyperparameters(params)
    }

    /// Classify each sample, in input order. `true` = flagged.
    fn infer(&self, samples: &[Sample]) -> Result<Vec<bool>> {
        Ok(self
            .similarity_score(samples)?
            .into_iter()
            .map(|score| self.classify(score))
            .collect())
    }
}

/// Pull the embedding out of every sample, failing if any is missing.
pub(crate) fn embeddings_of(samples: &[Sample], model: &str) -> Result<Vec<Vec<f64>>> {
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| {
            s.embedding.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "The {model} model requires embedded samples, but sample {i} has no embedding. \
                     Run `penprint embed` on the corpus first."
                )
            })
        })
        .collect()
}

/// Error for scoring before characterizing.
pub(crate) fn not_characterized(model: &str) -> anyhow::Error {
    anyhow::anyhow!("The {model} model has not been characterized yet; call characterize() first")
}
