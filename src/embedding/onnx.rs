// Local sentence encoder running a transformer through ONNX Runtime.
//
// The encoder is expensive to load, so it is a handle the caller creates
// once, passes to whatever needs vectors, and drops when done. Nothing in
// the crate keeps one alive behind its back.
//
// Token embeddings are pooled under the attention mask and the pooled
// vector is scaled to unit length. The hidden size comes from configuration
// (PENPRINT_EMBEDDING_DIM) and is checked against what the model returns.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};
use tracing::debug;

use super::traits::EmbeddingProvider;

/// Output width of the default encoder (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSION: usize = 384;

/// Model and tokenizer file names expected inside the model directory.
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Whether both encoder files exist in `model_dir`.
pub fn model_files_present(model_dir: &Path) -> bool {
    model_dir.join(MODEL_FILE).exists() && model_dir.join(TOKENIZER_FILE).exists()
}

/// Sentence encoder backed by a local ONNX model.
///
/// `Session::run` takes `&mut self`, hence the mutex; the `Arc`s let a batch
/// move into `spawn_blocking`.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load the encoder from `model_dir`, which must contain `model.onnx`
    /// and `tokenizer.json`. `dimension` is the hidden size of the model.
    pub fn load(model_dir: &Path, dimension: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nSet PENPRINT_MODEL_DIR to a directory containing {} and {}.",
                model_path.display(),
                MODEL_FILE,
                TOKENIZER_FILE
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}",
                tokenizer_path.display()
            );
        }
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than zero");
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        debug!(dir = %model_dir.display(), dimension, "Loaded sentence encoder");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();
        let dimension = self.dimension;

        tokio::task::spawn_blocking(move || encode(&session, &tokenizer, &texts, dimension))
            .await
            .context("spawn_blocking panicked")?
    }
}

/// Token ids and attention mask for a batch, right-padded with zeros to the
/// longest encoding.
struct PaddedBatch {
    rows: usize,
    width: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
}

impl PaddedBatch {
    fn new(encodings: &[Encoding]) -> Self {
        let rows = encodings.len();
        let width = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let mut ids = vec![0_i64; rows * width];
        let mut mask = vec![0_i64; rows * width];

        if width > 0 {
            let slots = ids.chunks_mut(width).zip(mask.chunks_mut(width));
            for (enc, (id_row, mask_row)) in encodings.iter().zip(slots) {
                for (slot, &id) in id_row.iter_mut().zip(enc.get_ids()) {
                    *slot = i64::from(id);
                }
                for (slot, &m) in mask_row.iter_mut().zip(enc.get_attention_mask()) {
                    *slot = i64::from(m);
                }
            }
        }

        Self {
            rows,
            width,
            ids,
            mask,
        }
    }

    fn shape(&self) -> [i64; 2] {
        [self.rows as i64, self.width as i64]
    }

    fn tensor(&self, values: Vec<i64>, name: &str) -> Result<Tensor<i64>> {
        Tensor::from_array((self.shape(), values))
            .with_context(|| format!("Failed to create {name} tensor"))
    }
}

/// Tokenize, run the encoder, pool and normalize. Blocking.
fn encode(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: &[String],
    dimension: usize,
) -> Result<Vec<Vec<f64>>> {
    let encodings = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;
    let batch = PaddedBatch::new(&encodings);

    if batch.width == 0 {
        return Ok(vec![vec![0.0; dimension]; batch.rows]);
    }

    let inputs = ort::inputs! {
        "input_ids" => batch.tensor(batch.ids.clone(), "input_ids")?,
        "attention_mask" => batch.tensor(batch.mask.clone(), "attention_mask")?,
        "token_type_ids" => batch.tensor(vec![0; batch.rows * batch.width], "token_type_ids")?
    };

    let hidden: Vec<f32> = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;
        let outputs = session.run(inputs).context("Embedding inference failed")?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;
        data.to_vec()
    };

    let expected = batch.rows * batch.width * dimension;
    if hidden.len() != expected {
        anyhow::bail!(
            "Encoder produced {} values, expected {} for {} texts of {} tokens at dimension {} \
             (set PENPRINT_EMBEDDING_DIM to the model's hidden size)",
            hidden.len(),
            expected,
            batch.rows,
            batch.width,
            dimension
        );
    }

    debug!(rows = batch.rows, width = batch.width, dimension, "Encoded text batch");
    Ok(mean_pool(&hidden, &batch.mask, batch.width, dimension))
}

/// Pool each row's token vectors under the attention mask and scale the
/// result to unit length. Only the direction is kept, so the masked sum
/// stands in for the masked mean.
fn mean_pool(hidden: &[f32], mask: &[i64], width: usize, dimension: usize) -> Vec<Vec<f64>> {
    hidden
        .chunks(width * dimension)
        .zip(mask.chunks(width))
        .map(|(tokens, row_mask)| {
            let mut pooled = vec![0.0_f64; dimension];
            for (token, &m) in tokens.chunks(dimension).zip(row_mask) {
                if m == 0 {
                    continue;
                }
                for (p, &x) in pooled.iter_mut().zip(token) {
                    *p += f64::from(x) * m as f64;
                }
            }
            super::normalize(&pooled).unwrap_or(pooled)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_skips_padding() {
        // Two rows, three token slots, dimension 2
        let hidden = [
            1.0_f32, 0.0, 3.0, 0.0, 100.0, 100.0, // row 0, last slot padded
            0.0, 2.0, 0.0, 0.0, 0.0, 0.0, // row 1, only the first slot is real
        ];
        let mask = [1_i64, 1, 0, 1, 0, 0];
        let pooled = mean_pool(&hidden, &mask, 3, 2);
        assert_eq!(pooled.len(), 2);
        assert!((pooled[0][0] - 1.0).abs() < 1e-12);
        assert!(pooled[0][1].abs() < 1e-12);
        assert!(pooled[1][0].abs() < 1e-12);
        assert!((pooled[1][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = match OnnxEmbedder::load(dir.path(), DEFAULT_DIMENSION) {
            Ok(_) => panic!("loading from an empty directory should fail"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Embedding model not found"));
        assert!(!model_files_present(dir.path()));
    }
}
