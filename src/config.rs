use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::embedding::onnx::DEFAULT_DIMENSION;
use crate::evaluation::DEFAULT_TEST_FRACTION;

/// Seed used when PENPRINT_SEED is unset.
pub const DEFAULT_SEED: u64 = 1;

/// Default location for the sentence-embedding model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("penprint")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Command-line
/// flags override anything set here.
pub struct Config {
    /// Embedded corpus (`@handle.json` files with vectors).
    pub data_dir: Option<PathBuf>,
    /// Raw corpus (`[text, date]` rows) that `embed` reads from.
    pub raw_dir: Option<PathBuf>,
    /// Optional negative pool used as other-author context.
    pub negative_dir: Option<PathBuf>,
    /// Where evaluation reports and score exports go.
    pub output_dir: PathBuf,
    /// Directory containing model.onnx and tokenizer.json.
    pub model_dir: PathBuf,
    /// Hidden size of the encoder in `model_dir`.
    pub embedding_dim: usize,
    pub test_fraction: f64,
    /// `None` when PENPRINT_SEED=random.
    pub seed: Option<u64>,
}

fn dir_var(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// PENPRINT_EMBEDDING_DIM, defaulting to the bundled encoder's width.
fn parse_embedding_dim(value: Option<&str>) -> Result<usize> {
    let Some(v) = value.filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_DIMENSION);
    };
    let dim = v
        .parse::<usize>()
        .with_context(|| format!("PENPRINT_EMBEDDING_DIM={v} is not a positive integer"))?;
    if dim == 0 {
        anyhow::bail!("PENPRINT_EMBEDDING_DIM must be greater than zero");
    }
    Ok(dim)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the directories a subcommand actually touches are required; see
    /// the `require_*` methods.
    pub fn load() -> Result<Self> {
        let test_fraction = match env::var("PENPRINT_TEST_FRACTION") {
            Ok(v) => v
                .parse::<f64>()
                .with_context(|| format!("PENPRINT_TEST_FRACTION={v} is not a number"))?,
            Err(_) => DEFAULT_TEST_FRACTION,
        };
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            anyhow::bail!("PENPRINT_TEST_FRACTION must be between 0 and 1, got {test_fraction}");
        }

        let seed = match env::var("PENPRINT_SEED").as_deref() {
            Ok("random") => None,
            Ok(v) => Some(
                v.parse::<u64>()
                    .with_context(|| format!("PENPRINT_SEED={v} is not an integer or \"random\""))?,
            ),
            Err(_) => Some(DEFAULT_SEED),
        };

        Ok(Self {
            data_dir: dir_var("PENPRINT_DATA_DIR"),
            raw_dir: dir_var("PENPRINT_RAW_DIR"),
            negative_dir: dir_var("PENPRINT_NEGATIVE_DIR"),
            output_dir: dir_var("PENPRINT_OUTPUT_DIR").unwrap_or_else(|| PathBuf::from("./results")),
            model_dir: dir_var("PENPRINT_MODEL_DIR").unwrap_or_else(default_model_dir),
            embedding_dim: parse_embedding_dim(env::var("PENPRINT_EMBEDDING_DIM").ok().as_deref())?,
            test_fraction,
            seed,
        })
    }

    /// The embedded corpus directory, or an error telling the user how to set it.
    pub fn require_data_dir(&self) -> Result<&PathBuf> {
        self.data_dir.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "PENPRINT_DATA_DIR not set. Add it to your .env file or pass --data-dir.\n\
                 It should point at a directory of embedded @handle.json files."
            )
        })
    }

    /// The raw corpus directory `embed` reads from.
    pub fn require_raw_dir(&self) -> Result<&PathBuf> {
        self.raw_dir.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "PENPRINT_RAW_DIR not set. Add it to your .env file or pass --raw-dir."
            )
        })
    }

    /// Check that the ONNX model files exist before loading the embedder.
    pub fn require_model(&self) -> Result<()> {
        if !crate::embedding::onnx::model_files_present(&self.model_dir) {
            anyhow::bail!(
                "Embedding model files not found in {}\n\
                 Place {} and {} there, or set PENPRINT_MODEL_DIR.",
                self.model_dir.display(),
                crate::embedding::onnx::MODEL_FILE,
                crate::embedding::onnx::TOKENIZER_FILE
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_penprint() {
        let dir = default_model_dir();
        let path = dir.to_string_lossy();
        assert!(path.contains("penprint") && path.contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_missing_dirs_give_actionable_errors() {
        let config = Config {
            data_dir: None,
            raw_dir: None,
            negative_dir: None,
            output_dir: PathBuf::from("out"),
            model_dir: PathBuf::from("/nonexistent/penprint-model"),
            embedding_dim: DEFAULT_DIMENSION,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: Some(DEFAULT_SEED),
        };
        let err = config.require_data_dir().unwrap_err().to_string();
        assert!(err.contains("PENPRINT_DATA_DIR"));
        assert!(config.require_raw_dir().is_err());
        assert!(config.require_model().is_err());
    }

    #[test]
    fn test_embedding_dim_parsing() {
        assert_eq!(parse_embedding_dim(None).unwrap(), DEFAULT_DIMENSION);
        assert_eq!(parse_embedding_dim(Some("")).unwrap(), DEFAULT_DIMENSION);
        assert_eq!(parse_embedding_dim(Some("512")).unwrap(), 512);
        assert!(parse_embedding_dim(Some("0")).is_err());
        assert!(parse_embedding_dim(Some("wide")).is_err());
    }
}
