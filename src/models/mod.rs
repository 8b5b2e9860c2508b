// Authorship models: characterize an author, score new text against them.

pub mod clustered;
pub mod kmeans;
pub mod mean;
pub mod tfidf;
pub mod traits;
pub mod vectorizer;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::corpus::Sample;
use clustered::ClusteredCosSimModel;
use mean::MeanCosSimModel;
use tfidf::TfIdfModel;
use traits::{AuthorshipModel, Hyperparameters, InputKind};

/// Which model to build, as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Single mean embedding direction.
    Mean,
    /// Up to `clusters` embedding directions.
    Clustered { clusters: usize },
    /// Term frequency over the author's own vocabulary.
    TermFrequency,
    /// Term frequency with IDF against other authors' text.
    TfIdf,
}

impl ModelKind {
    /// A fresh, uncharacterized model of this kind.
    pub fn build(self, seed: u64) -> Model {
        match self {
            ModelKind::Mean => Model::Mean(MeanCosSimModel::new()),
            ModelKind::Clustered { clusters } => {
                Model::Clustered(ClusteredCosSimModel::new(clusters, seed))
            }
            ModelKind::TermFrequency => Model::TfIdf(TfIdfModel::new(false)),
            ModelKind::TfIdf => Model::TfIdf(TfIdfModel::new(true)),
        }
    }
}

/// Any authorship model, dispatched by variant. Serializes with its
/// signature so a fitted model can be saved and reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Model {
    Mean(MeanCosSimModel),
    Clustered(ClusteredCosSimModel),
    TfIdf(TfIdfModel),
}

impl Model {
    fn inner(&self) -> &dyn AuthorshipModel {
        match self {
            Model::Mean(m) => m,
            Model::Clustered(m) => m,
            Model::TfIdf(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AuthorshipModel {
        match self {
            Model::Mean(m) => m,
            Model::Clustered(m) => m,
            Model::TfIdf(m) => m,
        }
    }

    /// Whether a signature has been fitted.
    pub fn is_characterized(&self) -> bool {
        match self {
            Model::Mean(m) => m.signature.is_some(),
            Model::Clustered(m) => m.signature.is_some(),
            Model::TfIdf(m) => m.signature.is_some(),
        }
    }

    /// Write the model (with its signature) as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model to {}", path.display()))
    }

    /// Read a model written by [`Model::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("{} is not a saved penprint model", path.display()))
    }
}

impl AuthorshipModel for Model {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn input_kind(&self) -> InputKind {
        self.inner().input_kind()
    }

    fn characterize(&mut self, own: &[Sample], context: Option<&[Sample]>) -> Result<()> {
        self.inner_mut().characterize(own, context)
    }

    fn similarity_score(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        self.inner().similarity_score(samples)
    }

    fn classify(&self, score: f64) -> bool {
        self.inner().classify(score)
    }

    fn hyperparameters(&self) -> &Hyperparameters {
        self.inner().hyperparameters()
    }

    fn set_hyperparameters(&mut self, params: Hyperparameters) -> Result<()> {
        self.inner_mut().set_hyperparameters(params)
    }
}
