//! Provider error types.

use thiserror::Error;

use echovault_types::MemoryError;

/// Errors from embedding / enrichment providers. Always recoverable:
/// callers degrade rather than abort.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider cannot be constructed from the configuration
    #[error("Provider configuration error: {0}")]
    Config(String),

    /// Request could not be sent or timed out
    #[error("Provider unreachable: {0}")]
    Http(String),

    /// Provider answered with something unusable
    #[error("Provider response error: {0}")]
    Response(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Http(err.to_string())
    }
}

impl From<EmbeddingError> for MemoryError {
    fn from(err: EmbeddingError) -> Self {
        MemoryError::Provider(err.to_string())
    }
}
