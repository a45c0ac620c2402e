//! NucLex Retrieval Core
//!
//! Retrieval layer for question answering over the 10 CFR regulatory
//! corpus: loads structured regulation files into chunks, embeds them in
//! batches, indexes the vectors, and answers queries with ranked passages.
//!
//! ## Features
//!
//! - **Section-tree chunking** - Nested sections flattened with part/section/title provenance
//! - **Batched embeddings** - Gemini `text-embedding-004` (or local fastembed), tolerant of failed batches
//! - **Exact or approximate search** - Flat L2 scan by default, HNSW on request
//! - **Bounded scores** - `1 / (1 + distance)`, in (0, 1]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nuclex_retrieval::{GeminiConfig, GeminiProvider, RetrievalConfig, SearchEngine};
//!
//! let provider = Arc::new(GeminiProvider::new(GeminiConfig::from_env()?)?);
//! let engine = SearchEngine::open(RetrievalConfig::from_env()?, provider).await?;
//!
//! for result in engine.search("What are the occupational dose limits?", 3).await {
//!     println!("{} {} ({:.3})", result.metadata.part, result.metadata.section, result.score);
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod search;

// Re-exports for convenience
pub use chunk::{Chunk, ChunkMetadata, SearchResult};
pub use config::{DistanceMetric, IndexKind, IndexOptions, RetrievalConfig};
pub use corpus::{Corpus, CorpusStats, IndexPhase};
pub use embedding::{
    EmbeddingEngine, EmbeddingPipeline, EmbeddingProvider, EmbeddingReport, GeminiConfig,
    GeminiProvider,
};
#[cfg(feature = "local-embeddings")]
pub use embedding::LocalProvider;
pub use error::{Result, RetrievalError};
pub use index::{Neighbor, VectorIndex};
pub use search::{relevance_score, SearchEngine};
