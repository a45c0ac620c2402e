//! NucLex CLI Library
//!
//! Argument parsing, provider selection and output formatting for the
//! `nuclex` binary. The binary owns a single `SearchEngine` for its
//! lifetime.

pub mod args;
pub mod error;
pub mod output;

pub use args::{Args, Command};
pub use error::{CliError, CliResult};

use nuclex_retrieval::{EmbeddingProvider, GeminiConfig, GeminiProvider};
use std::sync::Arc;

/// Select the embedding provider for this run
pub fn provider(local: bool) -> CliResult<Arc<dyn EmbeddingProvider>> {
    if local {
        return local_provider();
    }
    let provider = GeminiProvider::new(GeminiConfig::from_env()?)?;
    Ok(Arc::new(provider))
}

#[cfg(feature = "local-embeddings")]
fn local_provider() -> CliResult<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(nuclex_retrieval::LocalProvider::new()?))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_provider() -> CliResult<Arc<dyn EmbeddingProvider>> {
    Err(CliError::ProviderNotAvailable(
        "built without the local-embeddings feature".to_string(),
    ))
}
