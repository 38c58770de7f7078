//! Vault layer error types.

use thiserror::Error;

use echovault_types::MemoryError;

/// Errors that can occur in the vault layer
#[derive(Error, Debug)]
pub enum VaultError {
    /// Filesystem operation failed
    #[error("Vault I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not acquire the session file lock within the bound
    #[error("Vault lock timeout: {0}")]
    LockTimeout(String),

    /// A session file does not parse back into memories
    #[error("Vault parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Canonical payload encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<VaultError> for MemoryError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::LockTimeout(msg) => MemoryError::LockTimeout(msg),
            VaultError::Serialization(e) => MemoryError::Serialization(e),
            other => MemoryError::Storage(other.to_string()),
        }
    }
}
