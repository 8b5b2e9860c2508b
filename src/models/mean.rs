// Mean signature: the author as a single direction in embedding space.
//
// Every own-corpus vector is normalized, averaged, and the average is
// normalized again. A new sample's score is its cosine similarity to that
// direction.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    embeddings_of, not_characterized, AuthorshipModel, Hyperparameters, InputKind,
};
use crate::corpus::Sample;
use crate::embedding::{common_dimension, dot, mean_direction, normalize};

/// The fitted mean signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanSignature {
    /// Unit-length centroid of the own corpus.
    pub vector: Vec<f64>,
    /// Number of samples the centroid was built from.
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanCosSimModel {
    pub params: Hyperparameters,
    pub signature: Option<MeanSignature>,
}

impl MeanCosSimModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorshipModel for MeanCosSimModel {
    fn name(&self) -> String {
        "mean".to_string()
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Embedding
    }

    fn characterize(&mut self, own: &[Sample], _context: Option<&[Sample]>) -> Result<()> {
        if own.is_empty() {
            anyhow::bail!("Cannot characterize the mean model from an empty corpus");
        }
        let vectors = embeddings_of(own, "mean")?;
        common_dimension(&vectors)?;

        let vector = mean_direction(&vectors).ok_or_else(|| {
            anyhow::anyhow!(
                "Own-corpus embeddings cancel out (mean vector has zero length); \
                 cannot build a mean signature"
            )
        })?;

        debug!(samples = own.len(), dim = vector.len(), "Fitted mean signature");
        self.signature = Some(MeanSignature {
            vector,
            sample_count: own.len(),
        });
        Ok(())
    }

    fn similarity_score(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| not_characterized("mean"))?;
        let vectors = embeddings_of(samples, "mean")?;

        vectors
            .iter()
            .map(|v| {
                if v.len() != signature.vector.len() {
                    anyhow::bail!(
                        "Sample has {} dimensions but the signature has {}",
                        v.len(),
                        signature.vector.len()
                    );
                }
                Ok(normalize(v).map_or(0.0, |unit| dot(&unit, &signature.vector)))
            })
            .collect()
    }

    fn classify(&self, score: f64) -> bool {
        score < self.params.threshold
    }

    fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    fn set_hyperparameters(&mut self, params: Hyperparameters) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::norm;

    fn embedded(vectors: &[Vec<f64>]) -> Vec<Sample> {
        vectors
            .iter()
            .map(|v| Sample::embedded("", v.clone()))
            .collect()
    }

    #[test]
    fn test_signature_is_unit_norm() {
        let mut model = MeanCosSimModel::new();
        model
            .characterize(&embedded(&[vec![3.0, 1.0, 0.0], vec![0.5, 2.0, 1.0]]), None)
            .unwrap();
        let sig = model.signature.as_ref().unwrap();
        assert!((norm(&sig.vector) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identical_corpus_reproduces_vector() {
        let v = vec![0.6, 0.8, 0.0];
        let mut model = MeanCosSimModel::new();
        model
            .characterize(&embedded(&[v.clone(), v.clone(), v.clone()]), None)
            .unwrap();

        let sig = &model.signature.as_ref().unwrap().vector;
        for (a, b) in sig.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        let scores = model.similarity_score(&embedded(&[v])).unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_raw_text_rejected() {
        let mut model = MeanCosSimModel::new();
        let err = model
            .characterize(&[Sample::from_text("no vector here")], None)
            .unwrap_err();
        assert!(err.to_string().contains("requires embedded samples"));
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let mut model = MeanCosSimModel::new();
        assert!(model.characterize(&[], None).is_err());
    }

    #[test]
    fn test_dimension_mismatch_on_score() {
        let mut model = MeanCosSimModel::new();
        model.characterize(&embedded(&[vec![1.0, 0.0]]), None).unwrap();
        assert!(model.similarity_score(&embedded(&[vec![1.0, 0.0, 0.0]])).is_err());
    }

    #[test]
    fn test_score_before_characterize_fails() {
        let model = MeanCosSimModel::new();
        assert!(model.similarity_score(&embedded(&[vec![1.0]])).is_err());
    }

    #[test]
    fn test_infer_thresholds_scores() {
        let mut model = MeanCosSimModel::new();
        model.characterize(&embedded(&[vec![1.0, 0.0]]), None).unwrap();
        model.set_threshold(0.5).unwrap();
        // cos = 1.0 passes, cos = 0.0 is flagged
        let flags = model
            .infer(&embedded(&[vec![1.0, 0.0], vec![0.0, 1.0]]))
            .unwrap();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut model = MeanCosSimModel::new();
        assert!(model.set_threshold(f64::NAN).is_err());
        assert_eq!(model.params.threshold, 0.3);
    }
}
