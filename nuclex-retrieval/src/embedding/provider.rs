//! Embedding provider abstraction

use async_trait::async_trait;

use crate::error::Result;

/// Source of text embeddings.
///
/// The same provider (and therefore the same model) must embed both the
/// corpus and live queries, otherwise distances are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Declared embedding dimension
    fn dimension(&self) -> usize;

    /// Embed a batch of texts.
    ///
    /// Vectors are returned in input order. A response may be shorter than
    /// the input, and an entry may be empty when the provider returned no
    /// usable values for it; callers decide how to treat both.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
