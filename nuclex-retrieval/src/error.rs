//! Error types for nuclex-retrieval

use thiserror::Error;

/// Errors that can occur in the retrieval core
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error talking to the embedding provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A corpus file could not be read or parsed
    #[error("Corpus load error in {path}: {reason}")]
    CorpusLoad { path: String, reason: String },

    /// A batch of chunk embeddings failed
    #[error("Embedding batch starting at {start} failed: {reason}")]
    EmbeddingBatch { start: usize, reason: String },

    /// Embedding provider returned an error or unusable data
    #[error("Provider error: {0}")]
    Provider(String),

    /// Embedding provider could not be reached for a live query
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vector of the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No embeddings exist to index
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Create a corpus load error
    pub fn corpus_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorpusLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an embedding batch error
    pub fn embedding_batch(start: usize, reason: impl Into<String>) -> Self {
        Self::EmbeddingBatch {
            start,
            reason: reason.into(),
        }
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a provider unavailable error
    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }

    /// Create an index unavailable error
    pub fn index_unavailable(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure came from the embedding provider rather than local state
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Provider(_) | Self::ProviderUnavailable(_)
        )
    }
}

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;
