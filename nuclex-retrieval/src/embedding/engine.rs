//! Embedding engine
//!
//! Shared front for an [`EmbeddingProvider`], with a query cache.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::provider::EmbeddingProvider;
use crate::config::DEFAULT_QUERY_CACHE_CAPACITY;
use crate::error::{Result, RetrievalError};

/// Embedding engine with query caching
///
/// Wraps a provider with an LRU cache so repeated queries cost a single
/// provider round-trip. Corpus batches bypass the cache.
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    dimension: usize,
}

impl EmbeddingEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_cache_capacity(provider, DEFAULT_QUERY_CACHE_CAPACITY)
    }

    /// Engine whose query cache holds at most `capacity` entries (minimum 1)
    pub fn with_cache_capacity(provider: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let dimension = provider.dimension();
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        log::info!(
            "EmbeddingEngine ready ({}, {}d, {} cached queries)",
            provider.model(),
            dimension,
            capacity
        );

        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
            dimension,
        }
    }

    /// Embed a live query, with caching
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        // Check cache first
        if let Some(cached) = self.cache.lock().get(text) {
            return Ok(cached.clone());
        }

        let mut vectors = self.provider.embed(&[text.to_string()]).await?;
        let embedding = match vectors.pop() {
            Some(v) if !v.is_empty() => v,
            _ => return Err(RetrievalError::provider("no embedding returned for query")),
        };
        if embedding.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Embed a batch of corpus texts, uncached
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.provider.embed(texts).await
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::StaticProvider;

    #[tokio::test]
    async fn test_query_cache_hits_provider_once() {
        let provider = Arc::new(StaticProvider::new(3).with_vector("reactor", vec![1.0, 0.0, 0.0]));
        let engine = EmbeddingEngine::new(provider.clone());

        let first = engine.embed_query("reactor").await.unwrap();
        let second = engine.embed_query("reactor").await.unwrap();

        assert_eq!(first, vec![1.0, 0.0, 0.0]);
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
        assert_eq!(engine.cache_size(), 1);

        engine.clear_cache();
        assert_eq!(engine.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_query_cache_is_bounded() {
        let provider = Arc::new(StaticProvider::new(2));
        let engine = EmbeddingEngine::with_cache_capacity(provider.clone(), 2);

        engine.embed_query("a").await.unwrap();
        engine.embed_query("b").await.unwrap();
        engine.embed_query("a").await.unwrap();
        engine.embed_query("c").await.unwrap();
        assert_eq!(engine.cache_size(), 2);
        assert_eq!(provider.calls(), 3);

        // "b" was least recently used and got evicted
        engine.embed_query("a").await.unwrap();
        assert_eq!(provider.calls(), 3);
        engine.embed_query("b").await.unwrap();
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_query_wrong_dimension_rejected() {
        let provider = Arc::new(StaticProvider::new(3).with_vector("short", vec![1.0]));
        let engine = EmbeddingEngine::new(provider);

        let err = engine.embed_query("short").await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
        assert_eq!(engine.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_not_cached() {
        let provider = Arc::new(StaticProvider::new(2));
        provider.set_unreachable(true);
        let engine = EmbeddingEngine::new(provider.clone());

        assert!(engine.embed_query("q").await.is_err());
        provider.set_unreachable(false);
        assert!(engine.embed_query("q").await.is_ok());
    }
}
