//! Command-line arguments

use clap::{Parser, Subcommand};
use nuclex_retrieval::{IndexKind, RetrievalConfig, RetrievalError};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nuclex")]
#[command(about = "Search the 10 CFR regulatory corpus")]
#[command(version)]
pub struct Args {
    /// Directory of *_structured.json corpus files [env: NUCLEX_DATA_DIR]
    #[arg(long, short)]
    pub data_dir: Option<PathBuf>,

    /// Nearest-neighbor backend: flat (exact) or hnsw [env: NUCLEX_INDEX_KIND]
    #[arg(long)]
    pub index: Option<IndexKind>,

    /// Texts per embedding request [env: NUCLEX_BATCH_SIZE]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Embedding requests in flight at once [env: NUCLEX_EMBED_CONCURRENCY]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Index chunks that only received a zero-vector fallback
    /// [env: NUCLEX_INCLUDE_FALLBACK]
    #[arg(long)]
    pub include_fallback: bool,

    /// Use the local fastembed model instead of Gemini
    #[arg(long)]
    pub local: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one query
    Search {
        /// Number of passages to return [default: 3, env: NUCLEX_TOP_K]
        #[arg(long, short)]
        k: Option<usize>,

        /// Query text
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Read queries from stdin, one per line
    Interactive {
        #[arg(long, short)]
        k: Option<usize>,
    },
    /// Load and index the corpus, then print counts
    Stats,
}

impl Args {
    /// Defaults and environment, overridden by flags
    pub fn retrieval_config(&self) -> Result<RetrievalConfig, RetrievalError> {
        let mut config = RetrievalConfig::from_env()?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(kind) = self.index {
            config.index.kind = kind;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_batches = concurrency;
        }
        if self.include_fallback {
            config.index.include_fallback = true;
        }
        config.validate()?;
        Ok(config)
    }
}

impl Command {
    /// Requested result count, if the subcommand takes one
    pub fn k(&self) -> Option<usize> {
        match self {
            Command::Search { k, .. } | Command::Interactive { k } => *k,
            Command::Stats => None,
        }
    }
}
