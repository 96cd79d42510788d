//! Error types for notice bus

use thiserror::Error;

/// Notice bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Consumer side dropped, nothing will ever drain the queue
    #[error("Notification queue closed")]
    Closed,

    /// Queue at capacity (non-blocking publish only)
    #[error("Notification queue full")]
    Full,

    /// Handler failed to deliver a message
    #[error("Handler error: {0}")]
    Handler(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
