// Term-frequency signature: the author as a weighted vocabulary.
//
// The own corpus is concatenated into a single document. Without context the
// signature is that document's unit-length term-frequency row. With context,
// a second document (own text followed by everyone else's) joins the fit so
// IDF can separate words the author shares with others from words that are
// theirs; the signature is still the own-document row.
//
// Vocabulary and weights are frozen at characterization. Scoring re-vectorizes
// each sample against that vocabulary (unknown words count for nothing) and
// takes the dot product with the stored weights.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::traits::{not_characterized, AuthorshipModel, Hyperparameters, InputKind};
use super::vectorizer::{build_vocabulary, inverse_document_frequency, term_counts, tf_row, Vocabulary};
use crate::corpus::Sample;
use crate::embedding::{dot, normalize};

/// The fitted term-frequency signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermFrequencySignature {
    pub vocabulary: Vocabulary,
    /// Unit-length weight per vocabulary column.
    pub weights: Vec<f64>,
    /// Whether IDF weighting against a context document was applied.
    pub idf: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfModel {
    /// Fit IDF against a context corpus (TF-IDF) or not (plain TF).
    pub use_context: bool,
    pub params: Hyperparameters,
    pub signature: Option<TermFrequencySignature>,
}

impl TfIdfModel {
    pub fn new(use_context: bool) -> Self {
        Self {
            use_context,
            params: Hyperparameters::default(),
            signature: None,
        }
    }
}

impl Default for TfIdfModel {
    fn default() -> Self {
        Self::new(true)
    }
}

fn join_texts(samples: &[Sample]) -> String {
    samples
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl AuthorshipModel for TfIdfModel {
    fn name(&self) -> String {
        let name = if self.use_context { "tfidf" } else { "tf" };
        name.to_string()
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Text
    }

    fn characterize(&mut self, own: &[Sample], context: Option<&[Sample]>) -> Result<()> {
        if own.is_empty() {
            anyhow::bail!("Cannot characterize the {} model from an empty corpus", self.name());
        }

        let own_doc = join_texts(own);

        let signature = if self.use_context {
            let context = match context {
                Some(c) if !c.is_empty() => c,
                _ => anyhow::bail!(
                    "The tfidf model needs a non-empty context corpus of other authors' text"
                ),
            };
            let documents = vec![own_doc.clone(), format!("{own_doc} {}", join_texts(context))];
            let vocabulary = build_vocabulary(&documents);
            let idf = inverse_document_frequency(&documents, &vocabulary);
            let weighted: Vec<f64> = term_counts(&own_doc, &vocabulary)
                .iter()
                .zip(&idf)
                .map(|(tf, w)| tf * w)
                .collect();
            TermFrequencySignature {
                weights: normalize(&weighted).unwrap_or(weighted),
                vocabulary,
                idf: true,
            }
        } else {
            let vocabulary = build_vocabulary(std::slice::from_ref(&own_doc));
            TermFrequencySignature {
                weights: tf_row(&own_doc, &vocabulary),
                vocabulary,
                idf: false,
            }
        };

        if signature.weights.iter().all(|&w| w == 0.0) {
            anyhow::bail!(
                "The own corpus has no usable terms (only stop words or single characters)"
            );
        }

        info!(
            model = %self.name(),
            samples = own.len(),
            vocabulary = signature.vocabulary.len(),
            "Fitted term-frequency signature"
        );
        self.signature = Some(signature);
        Ok(())
    }

    fn similarity_score(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| not_characterized(&self.name()))?;

        Ok(samples
            .iter()
            .map(|s| dot(&tf_row(&s.text, &signature.vocabulary), &signature.weights))
            .collect())
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

    fn texts(items: &[&str]) -> Vec<Sample> {
        items.iter().map(|t| Sample::from_text(*t)).collect()
    }

    #[test]
    fn test_in_vocabulary_beats_out_of_vocabulary() {
        let mut model = TfIdfModel::new(false);
        model.characterize(&texts(&["cat cat dog"]), None).unwrap();

        let scores = model.similarity_score(&texts(&["cat", "bird"])).unwrap();
        assert!(scores[0] > 0.0);
        assert!(scores[0] > scores[1]);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn test_tf_weights_follow_counts() {
        let mut model = TfIdfModel::new(false);
        model.characterize(&texts(&["cat cat dog"]), None).unwrap();
        let sig = model.signature.as_ref().unwrap();
        let cat = sig.weights[sig.vocabulary["cat"]];
        let dog = sig.weights[sig.vocabulary["dog"]];
        assert!((cat - 2.0 / 5.0_f64.sqrt()).abs() < 1e-12);
        assert!((dog - 1.0 / 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_context_required_for_tfidf() {
        let mut model = TfIdfModel::new(true);
        assert!(model.characterize(&texts(&["cat dog"]), None).is_err());
        assert!(model.characterize(&texts(&["cat dog"]), Some(&[][..])).is_err());
    }

    #[test]
    fn test_context_words_join_vocabulary_with_zero_weight() {
        let mut model = TfIdfModel::new(true);
        model
            .characterize(&texts(&["cat dog"]), Some(texts(&["bird fish"]).as_slice()))
            .unwrap();
        let sig = model.signature.as_ref().unwrap();
        assert!(sig.idf);
        assert_eq!(sig.weights[sig.vocabulary["bird"]], 0.0);
        assert!(sig.weights[sig.vocabulary["cat"]] > 0.0);

        // A query full of other people's words now scores lower than the
        // author's own phrasing
        let scores = model
            .similarity_score(&texts(&["cat dog", "cat bird fish"]))
            .unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_stop_word_only_corpus_rejected() {
        let mut model = TfIdfModel::new(false);
        assert!(model.characterize(&texts(&["the and of"]), None).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(TfIdfModel::new(true).name(), "tfidf");
        assert_eq!(TfIdfModel::new(false).name(), "tf");
    }
}
