// Embedding support: the provider seam plus the vector math every
// embedding-based model shares.
//
// Embeddings live on the unit hypersphere: every vector is normalized before
// it is compared, so an inner product is a cosine similarity.

pub mod onnx;
pub mod traits;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::corpus::loader;
use traits::EmbeddingProvider;

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean length of a vector.
pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Scale a vector to unit length.
///
/// Returns `None` for (near-)zero vectors, which have no direction.
pub fn normalize(v: &[f64]) -> Option<Vec<f64>> {
    let n = norm(v);
    if n < f64::EPSILON || !n.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / n).collect())
}

/// Unit-length direction of the mean of a set of vectors.
///
/// Each input is normalized first so that no single long vector dominates.
/// Returns `None` when the input is empty or the mean has no direction
/// (e.g. two antipodal vectors).
pub fn mean_direction(vectors: &[Vec<f64>]) -> Option<Vec<f64>> {
    let first = vectors.first()?;
    let mut sum = vec![0.0_f64; first.len()];
    for v in vectors {
        if let Some(unit) = normalize(v) {
            for (s, x) in sum.iter_mut().zip(unit.iter()) {
                *s += x;
            }
        }
    }
    normalize(&sum)
}

/// Check that all vectors share one dimension and return it.
pub fn common_dimension(vectors: &[Vec<f64>]) -> Result<usize> {
    let Some(first) = vectors.first() else {
        anyhow::bail!("Cannot determine the dimension of an empty vector set");
    };
    let dim = first.len();
    if dim == 0 {
        anyhow::bail!("Embedding vectors must not be empty");
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        anyhow::bail!(
            "Embedding dimension mismatch: vector {} has {} values, expected {}",
            i,
            v.len(),
            dim
        );
    }
    Ok(dim)
}

/// Embed every `@handle.json` file in `input_dir` and write the results,
/// identically named, to `output_dir`.
///
/// One batch per user file. Every vector must have the provider's declared
/// dimension; a file with a bad batch is not written. Returns the number of
/// files processed.
pub async fn embed_directory(
    provider: &dyn EmbeddingProvider,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<usize> {
    let files = loader::user_files(input_dir)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    for (user, path) in &files {
        let mut samples = loader::read_user_file(path)?;
        let texts: Vec<String> = samples.iter().map(|s| s.text.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.len() != samples.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                samples.len()
            );
        }
        let dim = provider.dimension();
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            anyhow::bail!(
                "Embedding provider returned {} values for sample {} of {}, expected {}",
                v.len(),
                i,
                user,
                dim
            );
        }
        for (sample, vector) in samples.iter_mut().zip(vectors) {
            sample.embedding = Some(vector);
        }

        let out_path = output_dir.join(format!("{user}.json"));
        loader::write_user_file(&out_path, &samples)?;
        info!(user = %user, samples = samples.len(), "Embedded user corpus");
    }

    Ok(files.len())
}
