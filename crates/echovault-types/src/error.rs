//! The unified error taxonomy for EchoVault operations.

use thiserror::Error;

/// Errors surfaced by memory operations.
///
/// `Provider` is always recoverable (search degrades to lexical-only);
/// `LockTimeout` is transient and retryable; the rest are fatal for the
/// current operation but never corrupt stored data.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed or missing configuration; fatal for the invocation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Id or prefix did not resolve to any memory
    #[error("No memory found for '{0}'")]
    NotFound(String),

    /// Prefix matched more than one memory; caller must disambiguate
    #[error("Ambiguous id prefix '{prefix}' matches: {}", .candidates.join(", "))]
    AmbiguousId {
        prefix: String,
        candidates: Vec<String>,
    },

    /// Vault file or index unreachable; fatal for the current operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding/enrichment provider unreachable or rejected the request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Could not acquire the vault write lock within the bound
    #[error("Vault is busy (lock timeout): {0}")]
    LockTimeout(String),

    /// Invalid caller input (bad category, empty title, conflicting flags)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Canonical payload serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        MemoryError::Storage(err.to_string())
    }
}
