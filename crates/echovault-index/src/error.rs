//! Index layer error types.

use thiserror::Error;

use echovault_types::MemoryError;

/// Errors that can occur in the index layer
#[derive(Error, Debug)]
pub enum IndexError {
    /// SQLite operation failed
    #[error("Index database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row does not decode back into a memory
    #[error("Index row corrupt: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Corrupt(err.to_string())
    }
}

impl From<IndexError> for MemoryError {
    fn from(err: IndexError) -> Self {
        MemoryError::Storage(err.to_string())
    }
}
