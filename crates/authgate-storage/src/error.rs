//! Storage errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend cannot be reached or used in this execution context.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
