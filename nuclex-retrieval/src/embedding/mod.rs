//! Embedding module
//!
//! Provider abstraction, the Gemini HTTP provider, an optional local
//! fastembed provider, and the batched corpus pipeline.

mod engine;
mod gemini;
#[cfg(feature = "local-embeddings")]
mod local;
mod pipeline;
mod provider;
pub mod testing;

pub use engine::EmbeddingEngine;
pub use gemini::{GeminiConfig, GeminiProvider, DEFAULT_GEMINI_MODEL};
#[cfg(feature = "local-embeddings")]
pub use local::LocalProvider;
pub use pipeline::{EmbeddingPipeline, EmbeddingReport};
pub use provider::EmbeddingProvider;
