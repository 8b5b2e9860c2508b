// Composition tests: verifying that the subsystems chain together.
//
// These tests exercise the data flow end to end on a temporary directory:
//   raw corpus -> embed -> load -> evaluate -> report -> ROC / compare / reload
// with a deterministic keyword embedder standing in for the ONNX model.

use std::path::Path;

use async_trait::async_trait;

use penprint::corpus::{loader, Sample};
use penprint::embedding::embed_directory;
use penprint::embedding::traits::EmbeddingProvider;
use penprint::evaluation::compare::{load_runs, write_comparison, COMPARISON_DIR, POOLED_LABEL};
use penprint::evaluation::report::{load_scores, write_report, SUMMARY_FILE};
use penprint::evaluation::roc::{auc, roc_curve};
use penprint::evaluation::{evaluate, EvaluationConfig};
use penprint::models::traits::AuthorshipModel;
use penprint::models::{Model, ModelKind};

/// Maps each text onto three topic axes by keyword.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    if t.contains("bread") { 1.0 } else { 0.0 },
                    if t.contains("miles") { 1.0 } else { 0.0 },
                    if t.contains("chess") { 1.0 } else { 0.0 },
                ]
            })
            .collect())
    }
}

/// Always returns one vector too few.
struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    fn dimension(&self) -> usize {
        1
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
        Ok(vec![vec![1.0]; texts.len().saturating_sub(1)])
    }
}

/// Declares three dimensions but returns vectors of varying length.
struct RaggedEmbedder;

#[async_trait]
impl EmbeddingProvider for RaggedEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
        Ok((0..texts.len()).map(|i| vec![1.0; 2 + i % 3]).collect())
    }
}

fn write_raw_corpus(dir: &Path) {
    let topics = [
        ("@baker", "fresh bread from the oven"),
        ("@runner", "ran ten miles this morning"),
        ("@player", "won a chess game in the park"),
    ];
    for (user, phrase) in topics {
        let samples: Vec<Sample> = (0..10)
            .map(|i| Sample::from_text(format!("{phrase} #{i}")))
            .collect();
        loader::write_user_file(&dir.join(format!("{user}.json")), &samples).unwrap();
    }
    // Not a user file; must be ignored
    std::fs::write(dir.join("notes.txt"), "ignore me").unwrap();
}

// ============================================================
// Chain: raw corpus -> embed -> load
// ============================================================

#[tokio::test]
async fn embedded_corpus_round_trips_through_loader() {
    let raw = tempfile::tempdir().unwrap();
    let embedded = tempfile::tempdir().unwrap();
    write_raw_corpus(raw.path());

    let files = embed_directory(&KeywordEmbedder, raw.path(), embedded.path())
        .await
        .unwrap();
    assert_eq!(files, 3);

    let dataset = loader::load_directory(embedded.path()).unwrap();
    assert_eq!(dataset.len(), 30);
    assert_eq!(dataset.users(), vec!["@baker", "@player", "@runner"]);
    let baker = dataset.samples_for("@baker");
    assert_eq!(baker[0].embedding, Some(vec![1.0, 0.0, 0.0]));
    assert!(baker[0].text.starts_with("fresh bread"));
}

#[tokio::test]
async fn provider_returning_wrong_count_is_an_error() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_raw_corpus(raw.path());
    assert!(embed_directory(&ShortEmbedder, raw.path(), out.path())
        .await
        .is_err());
}

#[tokio::test]
async fn provider_returning_wrong_dimension_is_an_error() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_raw_corpus(raw.path());

    let err = embed_directory(&RaggedEmbedder, raw.path(), out.path())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expected 3"));
    // Nothing half-embedded is left behind
    assert!(loader::user_files(out.path()).unwrap().is_empty());
}

#[test]
fn empty_corpus_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(loader::load_directory(dir.path()).is_err());
}

// ============================================================
// Chain: load -> evaluate -> report -> ROC
// ============================================================

#[tokio::test]
async fn evaluation_report_feeds_roc_and_reloads_models() {
    let raw = tempfile::tempdir().unwrap();
    let embedded = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_raw_corpus(raw.path());
    embed_directory(&KeywordEmbedder, raw.path(), embedded.path())
        .await
        .unwrap();
    let dataset = loader::load_directory(embedded.path()).unwrap();

    let mut model = ModelKind::Clustered { clusters: 2 }.build(1);
    let config = EvaluationConfig {
        thresholds: vec![0.3, 0.6],
        ..EvaluationConfig::default()
    };
    let report = evaluate(&mut model, &dataset, None, &config).unwrap();
    assert_eq!(report.model_name, "emb_2");

    let run_dir = write_report(output.path(), None, &report).unwrap();
    assert!(run_dir.ends_with("emb_2"));
    assert!(run_dir.join(SUMMARY_FILE).is_file());

    for user in &report.users {
        let user_dir = run_dir.join(&user.user);
        assert!(user_dir.join(format!("{}_conf_mat.txt", user.user)).is_file());
        let details =
            std::fs::read_to_string(user_dir.join(format!("{}_details.txt", user.user))).unwrap();
        assert!(details.contains("TPR: 1.00, FPR: 0.00"));

        // The saved model scores exactly like the in-memory one
        let saved = Model::load(&user_dir.join(format!("{}_model.json", user.user))).unwrap();
        assert_eq!(saved, user.model);
        assert_eq!(saved.hyperparameters().threshold, 0.3);
    }

    let scores = load_scores(&run_dir).unwrap();
    assert_eq!(scores.len(), report.users.len());
    for user in &scores {
        let points = roc_curve(&user.own, &user.other).unwrap();
        assert!((auc(&points) - 1.0).abs() < 1e-12);
    }
}

#[test]
fn custom_prefix_names_the_run_directory() {
    let output = tempfile::tempdir().unwrap();
    let mut records = Vec::new();
    for (user, text) in [("@a", "tea kettle steep"), ("@b", "guitar chords strum")] {
        for _ in 0..10 {
            records.push(penprint::corpus::Record {
                user: user.to_string(),
                sample: Sample::from_text(text),
            });
        }
    }
    let dataset = penprint::corpus::Dataset::new(records);
    let mut model = ModelKind::TermFrequency.build(0);
    let report = evaluate(&mut model, &dataset, None, &EvaluationConfig::default()).unwrap();

    let run_dir = write_report(output.path(), Some("tf_baseline"), &report).unwrap();
    assert!(run_dir.ends_with("tf_baseline"));
    assert_eq!(load_scores(&run_dir).unwrap().len(), report.users.len());
}

// ============================================================
// Chain: several runs -> compare
// ============================================================

#[tokio::test]
async fn runs_of_different_models_are_compared_per_user() {
    let raw = tempfile::tempdir().unwrap();
    let embedded = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_raw_corpus(raw.path());
    embed_directory(&KeywordEmbedder, raw.path(), embedded.path())
        .await
        .unwrap();
    let dataset = loader::load_directory(embedded.path()).unwrap();

    let config = EvaluationConfig::default();
    let mut names = Vec::new();
    for kind in [ModelKind::Mean, ModelKind::Clustered { clusters: 2 }] {
        let mut model = kind.build(1);
        let report = evaluate(&mut model, &dataset, None, &config).unwrap();
        write_report(output.path(), None, &report).unwrap();
        names.push(report.model_name);
    }

    let runs = load_runs(output.path()).unwrap();
    assert_eq!(runs.len(), 2);
    let out_dir = output.path().join(COMPARISON_DIR);
    let comparison = write_comparison(&runs, &out_dir).unwrap();

    for (user, _) in &comparison.rows {
        for name in &names {
            let auc = comparison.auc(user, name).unwrap();
            assert!((auc - 1.0).abs() < 1e-12, "{user} under {name}");
            if user != POOLED_LABEL {
                assert!(out_dir.join(user).join(format!("rates_{name}.txt")).is_file());
            }
        }
    }

    // The comparison directory itself is not mistaken for a run
    assert_eq!(load_runs(output.path()).unwrap().len(), 2);
}
