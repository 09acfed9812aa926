//! Error and Result types for ColumnTS operations.

use common::StorageError;
use thiserror::Error;

use crate::model::Timestamp;

/// A convenience `Result` type for ColumnTS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for ColumnTS operations.
///
/// Validation errors (`Format`, `InvalidValue`, `InvalidType`,
/// `SessionNotAvailable`, `ModelNotAvailable`) are raised before anything is
/// sent to the engine. `RemoteExecution` and `Storage` are passed up exactly
/// as the engine or backend reported them and are never retried here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed 9-byte record or malformed request bytes.
    #[error("format error: {0}")]
    Format(String),

    /// Semantically invalid argument.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Argument of the wrong shape or arity.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// A mutating call was made with no session to flush it through.
    #[error("session not available: {0}")]
    SessionNotAvailable(String),

    /// The series is not attached to a session, so it cannot be read.
    #[error("model not available: series '{0}' is not attached to a session")]
    ModelNotAvailable(String),

    /// The atomic procedure itself failed, e.g. a key holds the wrong kind of value.
    #[error("remote execution error: {0}")]
    RemoteExecution(String),

    /// The requested timestamp is not in the series.
    #[error("timestamp {0} not found")]
    TimestampNotFound(Timestamp),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err.to_string())
    }
}
