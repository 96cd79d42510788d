//! Error types for the reputation ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error class, mapped to a response status by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Validation or eligibility failure
    BadRequest,
    /// Target content, user or row absent
    NotFound,
    /// Store or internal failure
    Internal,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Object kind does not accept votes
    #[error("Voting not allowed: {0}")]
    DisallowVote(String),

    /// Object kind cannot be followed
    #[error("Following not allowed: {0}")]
    DisallowFollow(String),

    /// Content absent or its kind unknown
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// User absent
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Request rejected by validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage error (RocksDB or row encoding)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invariant violation (duplicate slot, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Coarse class of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DisallowVote(_) | Error::DisallowFollow(_) | Error::InvalidRequest(_) => {
                ErrorKind::BadRequest
            }
            Error::ObjectNotFound(_) | Error::UserNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Error::DisallowVote(_) => "disallow_vote",
            Error::DisallowFollow(_) => "disallow_follow",
            Error::ObjectNotFound(_) => "object_not_found",
            Error::UserNotFound(_) => "user_not_found",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Storage(_) | Error::InvariantViolation(_) | Error::Io(_) => "database_error",
            Error::Config(_) => "config_error",
            Error::Other(_) => "unknown_error",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Storage(format!("row encoding: {}", err))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures_share_one_reason() {
        let encode: Error = bincode::deserialize::<u64>(&[1u8]).unwrap_err().into();
        let slot = Error::InvariantViolation("slot taken".to_string());

        assert_eq!(encode.reason(), "database_error");
        assert_eq!(slot.reason(), "database_error");
        assert_eq!(encode.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_validation_is_bad_request() {
        assert_eq!(Error::DisallowVote("tag".into()).kind(), ErrorKind::BadRequest);
        assert_eq!(Error::DisallowFollow("answer".into()).reason(), "disallow_follow");
        assert_eq!(Error::ObjectNotFound("x".into()).kind(), ErrorKind::NotFound);
    }
}
