// Bag-of-words vectorization over a fixed vocabulary.
//
// Tokens are runs of two or more word characters, lower-cased, with English
// stop words removed. Counts can be reweighted by smoothed inverse document
// frequency, idf(t) = ln((1 + n) / (1 + df(t))) + 1, and every row is scaled
// to unit length.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

use crate::embedding::normalize;

/// Term -> column index, in alphabetical order.
pub type Vocabulary = BTreeMap<String, usize>;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

fn stop_word_set() -> &'static HashSet<String> {
    static WORDS: OnceLock<HashSet<String>> = OnceLock::new();
    WORDS.get_or_init(|| {
        let words: Vec<String> = get(LANGUAGE::English);
        words.into_iter().map(|w| w.to_lowercase()).collect()
    })
}

/// Split text into lower-cased, stop-word-free tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let stop = stop_word_set();
    token_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| !stop.contains(t))
        .collect()
}

/// Build the vocabulary of every token in `documents`.
pub fn build_vocabulary(documents: &[String]) -> Vocabulary {
    let terms: BTreeSet<String> = documents.iter().flat_map(|d| tokenize(d)).collect();
    terms
        .into_iter()
        .enumerate()
        .map(|(i, t)| (t, i))
        .collect()
}

/// Raw term counts of one document against a vocabulary.
/// Out-of-vocabulary tokens are dropped.
pub fn term_counts(document: &str, vocabulary: &Vocabulary) -> Vec<f64> {
    let mut counts = vec![0.0; vocabulary.len()];
    for token in tokenize(document) {
        if let Some(&i) = vocabulary.get(&token) {
            counts[i] += 1.0;
        }
    }
    counts
}

/// Smoothed inverse document frequency per vocabulary column.
pub fn inverse_document_frequency(documents: &[String], vocabulary: &Vocabulary) -> Vec<f64> {
    let n = documents.len() as f64;
    let mut df = vec![0.0; vocabulary.len()];
    for doc in documents {
        let present: BTreeSet<usize> = tokenize(doc)
            .iter()
            .filter_map(|t| vocabulary.get(t).copied())
            .collect();
        for i in present {
            df[i] += 1.0;
        }
    }
    df.iter().map(|d| ((1.0 + n) / (1.0 + d)).ln() + 1.0).collect()
}

/// Unit-length term-frequency row; all zeros when nothing is in vocabulary.
pub fn tf_row(document: &str, vocabulary: &Vocabulary) -> Vec<f64> {
    let counts = term_counts(document, vocabulary);
    normalize(&counts).unwrap_or(counts)
}
