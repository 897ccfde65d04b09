//! Error types for upload-spooler
//!
//! This module defines the error hierarchy that covers:
//! - Spooler definition parsing
//! - Storage backend failures
//! - Worker thread errors
//!
//! Backend errors never escape a worker: they are folded into the job's
//! result fields and reported through the completion callback. Only
//! definition and worker errors reach the caller as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the upload spooler
#[derive(Error, Debug)]
pub enum SpoolerError {
    /// Definition parsing errors
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Spooler definition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Wrong number of comma separated fields
    #[error("Invalid spooler definition '{definition}': expected 3 comma separated fields, found {found}")]
    FieldCount { definition: String, found: usize },

    /// First field is not `<driver>:<description>`
    #[error("Invalid spooler driver '{field}': expected <driver>:<description>")]
    MalformedDriver { field: String },

    /// Driver name not recognized
    #[error("Unknown spooler driver: {name}")]
    UnknownDriver { name: String },

    /// Queue capacity of zero
    #[error("Invalid max pending jobs {value}: must be at least 1")]
    InvalidCapacity { value: usize },

    /// Worker count out of range
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Stat descriptor not usable
    #[error("Invalid upstream '{descriptor}'")]
    InvalidUpstream { descriptor: String },
}

/// Errors raised by a storage backend while executing a job
#[derive(Error, Debug)]
pub enum BackendError {
    /// Local file operation failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote store answered with a non-success status
    #[error("Remote store rejected '{key}' with status {status}")]
    RemoteStatus { key: String, status: u16 },

    /// Remote store could not be reached
    #[error("Remote store request for '{key}' failed: {reason}")]
    RemoteTransport { key: String, reason: String },

    /// Compressing content failed
    #[error("Failed to compress '{path}': {reason}")]
    Compression { path: PathBuf, reason: String },
}

impl BackendError {
    /// Build an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }

    /// Numeric return code reported to the completion callback
    ///
    /// Raw OS errors keep their errno, remote rejections their HTTP
    /// status. Everything else maps to `-1`.
    pub fn return_code(&self) -> i32 {
        match self {
            BackendError::Io { source, .. } => source.raw_os_error().unwrap_or(-1),
            BackendError::RemoteStatus { status, .. } => i32::from(*status),
            BackendError::RemoteTransport { .. } | BackendError::Compression { .. } => -1,
        }
    }
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker thread could not be started
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// Backend for a worker could not be built
    #[error("Failed to initialize backend for worker {id}: {source}")]
    BackendInit { id: usize, source: BackendError },

    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },
}

/// Result type alias for SpoolerError
pub type Result<T> = std::result::Result<T, SpoolerError>;

/// Result type alias for BackendError
pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_from_os_error() {
        let err = BackendError::io("/missing", std::io::Error::from_raw_os_error(2));
        assert_eq!(err.return_code(), 2);

        let err = BackendError::io("/x", std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.return_code(), -1);
    }

    #[test]
    fn test_return_code_from_remote_status() {
        let err = BackendError::RemoteStatus {
            key: "data/ab".into(),
            status: 503,
        };
        assert_eq!(err.return_code(), 503);
    }

    #[test]
    fn test_error_conversion() {
        let def_err = DefinitionError::UnknownDriver { name: "ftp".into() };
        let err: SpoolerError = def_err.into();
        assert!(matches!(err, SpoolerError::Definition(_)));
        assert!(err.to_string().contains("ftp"));

        let worker_err = WorkerError::BackendInit {
            id: 1,
            source: BackendError::RemoteStatus {
                key: "k".into(),
                status: 403,
            },
        };
        let err: SpoolerError = worker_err.into();
        assert!(matches!(err, SpoolerError::Worker(WorkerError::BackendInit { id: 1, .. })));
    }
}
