//! Error types for the NucLex CLI.

use nuclex_retrieval::RetrievalError;
use thiserror::Error;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::EmptyQuery | CliError::ProviderNotAvailable(_) => 2,
            CliError::Retrieval(RetrievalError::Config(_)) => 2,
            CliError::Retrieval(e) if e.is_provider_failure() => 3,
            _ => 1,
        }
    }
}

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
