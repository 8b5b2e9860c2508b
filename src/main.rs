use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::info;

use penprint::config::Config;
use penprint::corpus::{loader, Sample};
use penprint::embedding::onnx::OnnxEmbedder;
use penprint::embedding::traits::EmbeddingProvider;
use penprint::evaluation::{self, compare, report, roc, EvaluationConfig, EvaluationReport};
use penprint::models::traits::{AuthorshipModel, Hyperparameters, InputKind};
use penprint::models::{Model, ModelKind};
use penprint::output::terminal;

/// Penprint: authorship signatures for short social posts.
///
/// Learns what a user's writing looks like and measures how well that
/// signature tells their posts apart from everyone else's.
#[derive(Parser)]
#[command(name = "penprint", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelChoice {
    /// Mean embedding direction
    Mean,
    /// Several embedding directions from spherical k-means
    Clustered,
    /// Term frequency over the author's own words
    Tf,
    /// Term frequency weighted by IDF against other authors
    Tfidf,
}

/// Options shared by `evaluate` and `scores`.
#[derive(Args)]
struct RunArgs {
    /// Signature to fit
    #[arg(long, value_enum, default_value = "mean")]
    model: ModelChoice,

    /// Number of clusters for the clustered model
    #[arg(long, default_value = "5")]
    clusters: usize,

    /// Subtract each cluster's mean member similarity (clustered model)
    #[arg(long)]
    scaled: bool,

    /// Thresholds to classify at, comma separated
    #[arg(long, value_delimiter = ',', default_value = "0.3")]
    thresholds: Vec<f64>,

    /// Only evaluate these users (e.g. @alice), comma separated
    #[arg(long, value_delimiter = ',')]
    users: Vec<String>,

    /// Embedded corpus directory (overrides PENPRINT_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Draw other-author context from this corpus instead of the same split
    /// (overrides PENPRINT_NEGATIVE_DIR)
    #[arg(long)]
    negative_dir: Option<PathBuf>,

    /// Fraction of each corpus held out for testing
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Output subdirectory name (default: the model name)
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a raw corpus directory with the local ONNX sentence encoder
    Embed {
        /// Raw corpus directory (overrides PENPRINT_RAW_DIR)
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Where embedded files go (overrides PENPRINT_DATA_DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Evaluate a signature across users and print TPR/FPR per threshold
    Evaluate {
        #[command(flatten)]
        run: RunArgs,

        /// Print results without writing the report directory
        #[arg(long)]
        no_save: bool,
    },

    /// Export held-out similarity scores (plus models and matrices) per user
    Scores {
        #[command(flatten)]
        run: RunArgs,
    },

    /// ROC curves and AUC from exported scores
    Roc {
        /// Run directory written by `scores` or `evaluate`
        run_dir: PathBuf,

        /// Only this user
        #[arg(long)]
        user: Option<String>,
    },

    /// Compare ROC/AUC across models, per user and pooled
    Compare {
        /// Results root holding one run directory per model
        /// (default: PENPRINT_OUTPUT_DIR)
        #[arg(long, conflicts_with = "runs")]
        results_dir: Option<PathBuf>,

        /// Compare exactly these run directories instead, comma separated
        #[arg(long, value_delimiter = ',')]
        runs: Vec<PathBuf>,

        /// Where rates tables and the AUC grid go
        /// (default: <results>/comparison)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Score ad-hoc texts against a saved model
    Check {
        /// A `<user>_model.json` file
        model: PathBuf,

        /// Texts to score
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("penprint=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Embed { raw_dir, out_dir } => {
            let raw_dir = match raw_dir {
                Some(dir) => dir,
                None => config.require_raw_dir()?.clone(),
            };
            let out_dir = match out_dir {
                Some(dir) => dir,
                None => config.require_data_dir()?.clone(),
            };
            config.require_model()?;

            let embedder = OnnxEmbedder::load(&config.model_dir, config.embedding_dim)?;
            let files = penprint::embedding::embed_directory(&embedder, &raw_dir, &out_dir).await?;
            println!(
                "Embedded {files} user files into {}",
                out_dir.display().to_string().bold()
            );
        }

        Commands::Evaluate { run, no_save } => {
            let results = run_evaluation(&config, &run)?;
            terminal::display_evaluation(&results);
            if !no_save {
                let dir = report::write_report(&config.output_dir, run.prefix.as_deref(), &results)?;
                println!("{}", format!("Report written to {}", dir.display()).dimmed());
            }
        }

        Commands::Scores { run } => {
            let results = run_evaluation(&config, &run)?;
            let dir = report::write_report(&config.output_dir, run.prefix.as_deref(), &results)?;
            println!(
                "Scores for {} users written to {}",
                results.users.len(),
                dir.display().to_string().bold()
            );
        }

        Commands::Roc { run_dir, user } => {
            show_roc(&run_dir, user.as_deref())?;
        }

        Commands::Compare {
            results_dir,
            runs,
            out_dir,
        } => {
            let root = results_dir.unwrap_or_else(|| config.output_dir.clone());
            let loaded = if runs.is_empty() {
                compare::load_runs(&root)?
            } else {
                runs.iter()
                    .map(|dir| compare::load_run(dir))
                    .collect::<Result<Vec<_>>>()?
            };
            let out_dir = out_dir.unwrap_or_else(|| root.join(compare::COMPARISON_DIR));
            let comparison = compare::write_comparison(&loaded, &out_dir)?;
            terminal::display_comparison(&comparison);
            println!("{}", format!("Comparison written to {}", out_dir.display()).dimmed());
        }

        Commands::Check { model, texts } => {
            check_texts(&config, &model, texts).await?;
        }
    }

    Ok(())
}

fn build_model(run: &RunArgs, seed: Option<u64>) -> Result<Model> {
    let kind = match run.model {
        ModelChoice::Mean => ModelKind::Mean,
        ModelChoice::Clustered => ModelKind::Clustered {
            clusters: run.clusters,
        },
        ModelChoice::Tf => ModelKind::TermFrequency,
        ModelChoice::Tfidf => ModelKind::TfIdf,
    };
    if run.scaled && !matches!(kind, ModelKind::Clustered { .. }) {
        anyhow::bail!("--scaled only applies to --model clustered");
    }

    let mut model = kind.build(seed.unwrap_or_default());
    let threshold = run
        .thresholds
        .first()
        .copied()
        .unwrap_or(penprint::models::traits::DEFAULT_THRESHOLD);
    model.set_hyperparameters(Hyperparameters {
        threshold,
        cluster_scaling: run.scaled,
    })?;
    Ok(model)
}

fn run_evaluation(config: &Config, run: &RunArgs) -> Result<EvaluationReport> {
    let data_dir = match &run.data_dir {
        Some(dir) => dir.clone(),
        None => config.require_data_dir()?.clone(),
    };
    let seed = run.seed.or(config.seed);
    let mut model = build_model(run, seed)?;

    let dataset = loader::load_directory(&data_dir)?;
    let negative = match run.negative_dir.as_ref().or(config.negative_dir.as_ref()) {
        Some(dir) => Some(loader::load_directory(dir)?),
        None => None,
    };

    let eval_config = EvaluationConfig {
        test_fraction: run.test_fraction.unwrap_or(config.test_fraction),
        seed,
        thresholds: run.thresholds.clone(),
        users: (!run.users.is_empty()).then(|| run.users.clone()),
    };
    info!(
        model = %model.name(),
        data = %data_dir.display(),
        negative_pool = negative.is_some(),
        "Running evaluation"
    );
    evaluation::evaluate(&mut model, &dataset, negative.as_ref(), &eval_config)
}

fn show_roc(run_dir: &Path, only: Option<&str>) -> Result<()> {
    let mut all = report::load_scores(run_dir)?;
    if let Some(user) = only {
        all.retain(|s| s.user == user);
        if all.is_empty() {
            anyhow::bail!("No scores for {user} under {}", run_dir.display());
        }
    }

    let mut pooled_own = Vec::new();
    let mut pooled_other = Vec::new();
    for scores in &all {
        let points = roc::roc_curve(&scores.own, &scores.other)?;
        terminal::display_roc(&scores.user, &points, roc::auc(&points));

        let table_path = run_dir.join(&scores.user).join("roc.txt");
        std::fs::write(&table_path, roc::rates_table(&points))
            .with_context(|| format!("Failed to write {}", table_path.display()))?;

        pooled_own.extend_from_slice(&scores.own);
        pooled_other.extend_from_slice(&scores.other);
    }

    if all.len() > 1 {
        let points = roc::roc_curve(&pooled_own, &pooled_other)?;
        terminal::display_roc("all users", &points, roc::auc(&points));
        let table_path = run_dir.join("roc.txt");
        std::fs::write(&table_path, roc::rates_table(&points))
            .with_context(|| format!("Failed to write {}", table_path.display()))?;
    }
    println!();
    Ok(())
}

async fn check_texts(config: &Config, model_path: &Path, texts: Vec<String>) -> Result<()> {
    let model = Model::load(model_path)?;
    if !model.is_characterized() {
        anyhow::bail!("{} holds an uncharacterized model", model_path.display());
    }

    let samples: Vec<Sample> = match model.input_kind() {
        InputKind::Text => texts.iter().map(Sample::from_text).collect(),
        InputKind::Embedding => {
            config.require_model()?;
            let embedder = OnnxEmbedder::load(&config.model_dir, config.embedding_dim)?;
            let vectors = embedder.embed_batch(&texts).await?;
            texts
                .iter()
                .zip(vectors)
                .map(|(text, v)| Sample::embedded(text.as_str(), v))
                .collect()
        }
    };

    let scores = model.similarity_score(&samples)?;
    let rows: Vec<(String, f64, bool)> = texts
        .into_iter()
        .zip(scores)
        .map(|(text, score)| {
            let flagged = model.classify(score);
            (text, score, flagged)
        })
        .collect();

    terminal::display_check(&model.name(), model.hyperparameters().threshold, &rows);
    Ok(())
}
