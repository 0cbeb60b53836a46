// src/error.rs

use thiserror::Error;

/// Core error types for layoutkit
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence store failure not covered by the database driver
    #[error("Store error: {0}")]
    Store(String),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Catalog could not be fetched or parsed
    #[error("Failed to fetch catalog: {0}")]
    Fetch(String),

    /// A download policy name that does not map to any state
    #[error("Unknown download policy state: {0}")]
    UnknownPolicyState(String),

    /// The mutation queue is no longer running
    #[error("Installed set queue is closed")]
    QueueClosed,
}

impl Error {
    /// True for failures of the persistence store (read, write or delete).
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Serialization(_) | Error::Store(_)
        )
    }
}

/// Result type alias using layoutkit's Error type
pub type Result<T> = std::result::Result<T, Error>;
