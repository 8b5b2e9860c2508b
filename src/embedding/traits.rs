// Embedding provider trait: the boundary to whatever sentence encoder is in use.
//
// The models never call an encoder themselves: they read the `embedding`
// field of each sample. This trait is what fills that field in, and the
// caller owns the provider for as long as it wants the model resident.

use anyhow::Result;
use async_trait::async_trait;

/// Maps an ordered batch of texts to fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order,
/// and every vector must have length `dimension()`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}
