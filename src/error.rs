//! Error types for the deposit advisor

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Provider Faults
    // =============================

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Groundedness check error: {0}")]
    Groundedness(String),

    #[error("Provider timed out after {0}s")]
    ProviderTimeout(u64),

    // =============================
    // Ledger / Config
    // =============================

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for AdvisorError {
    fn from(e: sqlx::Error) -> Self {
        AdvisorError::Database(e.to_string())
    }
}
