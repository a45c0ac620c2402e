//! Retrieval configuration
//!
//! Defaults match the Gemini `text-embedding-004` model and the layout of
//! the processed 10 CFR corpus. Values can be overridden from the
//! environment with [`RetrievalConfig::from_env`].

use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, RetrievalError};

/// Default embedding dimension (text-embedding-004)
pub const DEFAULT_DIMENSION: usize = 768;
/// Maximum texts per provider call
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Results returned when the caller does not ask for a specific count
pub const DEFAULT_K: usize = 3;
/// Query embeddings kept in the engine's LRU cache
pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 1024;
/// File name suffix of structured corpus documents
pub const DEFAULT_FILE_SUFFIX: &str = "_structured.json";

/// Nearest-neighbor backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force scan over a flat matrix
    #[default]
    Flat,
    /// Approximate HNSW graph
    Hnsw,
}

impl FromStr for IndexKind {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "exact" => Ok(Self::Flat),
            "hnsw" => Ok(Self::Hnsw),
            other => Err(RetrievalError::config(format!("unknown index kind: {}", other))),
        }
    }
}

/// Distance reported by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Squared L2 distance, as returned by a flat L2 index
    #[default]
    SquaredEuclidean,
    /// Plain L2 distance
    Euclidean,
}

/// Index construction options
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub kind: IndexKind,
    pub metric: DistanceMetric,
    /// Index chunks whose embedding is a zero-vector fallback (default: false)
    pub include_fallback: bool,
    /// HNSW build-time candidate list size (default: 100)
    pub ef_construction: usize,
    /// HNSW query-time candidate list size (default: 100)
    pub ef_search: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            kind: IndexKind::Flat,
            metric: DistanceMetric::SquaredEuclidean,
            include_fallback: false,
            ef_construction: 100,
            ef_search: 100,
        }
    }
}

/// Top-level retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Directory holding the structured corpus files
    pub data_dir: PathBuf,
    /// Suffix that marks a corpus file
    pub file_suffix: String,
    /// Embedding dimension expected from the provider
    pub dimension: usize,
    /// Texts per embedding call (default: 100)
    pub batch_size: usize,
    /// Embedding batches in flight at once (default: 1)
    pub max_concurrent_batches: usize,
    /// Default number of results per query (default: 3)
    pub default_k: usize,
    /// Query embeddings kept in the LRU cache (default: 1024)
    pub query_cache_capacity: usize,
    pub index: IndexOptions,
    /// Skip the startup build and build on the first search instead
    pub defer_index_build: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/processed"),
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: 1,
            default_k: DEFAULT_K,
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            index: IndexOptions::default(),
            defer_index_build: false,
        }
    }
}

impl RetrievalConfig {
    /// Build a config from defaults plus environment overrides:
    /// - `NUCLEX_DATA_DIR`
    /// - `NUCLEX_BATCH_SIZE`
    /// - `NUCLEX_EMBED_CONCURRENCY`
    /// - `NUCLEX_INDEX_KIND` (`flat` or `hnsw`)
    /// - `NUCLEX_INCLUDE_FALLBACK` (`true`/`false`)
    /// - `NUCLEX_TOP_K`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("NUCLEX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(batch_size) = env_parse::<usize>("NUCLEX_BATCH_SIZE")? {
            config.batch_size = batch_size;
        }
        if let Some(concurrency) = env_parse::<usize>("NUCLEX_EMBED_CONCURRENCY")? {
            config.max_concurrent_batches = concurrency;
        }
        if let Some(kind) = env_parse::<IndexKind>("NUCLEX_INDEX_KIND")? {
            config.index.kind = kind;
        }
        if let Some(include) = env_parse::<bool>("NUCLEX_INCLUDE_FALLBACK")? {
            config.index.include_fallback = include;
        }
        if let Some(k) = env_parse::<usize>("NUCLEX_TOP_K")? {
            config.default_k = k;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RetrievalError::config("dimension must be positive"));
        }
        if self.default_k == 0 {
            return Err(RetrievalError::config("default_k must be positive"));
        }
        if self.batch_size == 0 {
            return Err(RetrievalError::config("batch_size must be positive"));
        }
        if self.max_concurrent_batches == 0 {
            return Err(RetrievalError::config(
                "max_concurrent_batches must be positive",
            ));
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RetrievalError::config(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
