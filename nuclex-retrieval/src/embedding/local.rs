//! In-process embeddings via fastembed
//!
//! Runs an ONNX sentence embedding model locally (BGE-Small-EN-v1.5 by
//! default) so the corpus can be indexed without network access.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::provider::EmbeddingProvider;
use crate::error::{Result, RetrievalError};

/// Embedding provider backed by a local fastembed model
pub struct LocalProvider {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
    dimension: usize,
}

impl LocalProvider {
    /// Load BGE-Small-EN-v1.5
    pub fn new() -> Result<Self> {
        Self::with_model(EmbeddingModel::BGESmallENV15)
    }

    pub fn with_model(model: EmbeddingModel) -> Result<Self> {
        let name = format!("{:?}", model);
        log::info!("Loading local embedding model {}", name);

        let embedding = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| RetrievalError::provider(format!("Failed to load {}: {}", name, e)))?;

        // Get dimension by encoding test string
        let probe = embedding
            .embed(vec!["test"], None)
            .map_err(|e| RetrievalError::provider(format!("Failed to encode test string: {}", e)))?;
        let dimension = probe.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(RetrievalError::provider(format!(
                "{} produced an empty test embedding",
                name
            )));
        }

        log::info!("Loaded {} ({}d)", name, dimension);
        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            name,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let embedding = model.lock();
            embedding
                .embed(texts, None)
                .map_err(|e| RetrievalError::provider(format!("Failed to encode texts: {}", e)))
        })
        .await
        .map_err(|e| RetrievalError::provider(format!("embedding task failed: {}", e)))?
    }
}
