//! Error types for the store crate.

use replica_kv::KvError;
use replica_types::TypeError;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `put` or `delete` was called with a directory-shaped path.
    #[error("directory path not allowed for this operation: {0}")]
    DirectoryPath(String),

    /// A listing was requested for a document path.
    #[error("not a directory path: {0}")]
    NotADirectory(String),

    /// Invalid path, action or resolution supplied by the caller.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The underlying engine failed or rejected the unit of work.
    #[error("engine error: {0}")]
    Kv(#[from] KvError),

    /// The engine did not open within the configured deadline.
    #[error("opening store {name:?} timed out after {timeout_ms} ms")]
    OpenTimeout { name: String, timeout_ms: u64 },

    /// A resolution was requested for a path with no recorded conflict.
    #[error("no conflict recorded at {0}")]
    NoConflict(String),

    /// The handle was closed; reopen the store to continue.
    #[error("store is closed")]
    Closed,

    /// A unit of work kept conflicting with concurrent commits.
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
