//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and a local implementation using
//! the CLIP ViT-B/32 text tower (512 dimensions, L2-normalized). CLIP is used
//! so that item phrases from chats and labels detected in photos land in the
//! same vector space. The provider is created via [`create_provider`] from
//! configuration.

pub mod local;

use anyhow::Result;

/// Number of dimensions in the embedding vectors (CLIP ViT-B/32 projection).
pub const EMBEDDING_DIM: usize = 512;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`EMBEDDING_DIM`] dimensions.
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Storage-time text for one record: item and context separated by a single space.
pub fn document_text(item: &str, context: &str) -> String {
    format!("{item} {context}")
}

/// Query-time text for a key phrase, mirroring the labelled storage convention.
pub fn query_text(key_item: &str) -> String {
    format!("Item: {key_item} Context: ")
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + CLIP text model).
/// Returns an error if model files are not found. Run `whereabouts model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}
