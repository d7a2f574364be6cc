use std::path::PathBuf;

use crate::traits::Container;

/// Errors from key-value engine operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// A key read by the transaction was changed by another commit.
    #[error("write conflict on {container}/{key}")]
    Conflict { container: Container, key: String },

    /// The engine has been closed or destroyed.
    #[error("engine is closed")]
    Closed,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest exists but cannot be decoded.
    #[error("corrupt manifest at {path}: {reason}")]
    CorruptManifest { path: PathBuf, reason: String },

    /// The store was written by a newer schema than this build understands.
    #[error("schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// The store name cannot be used as a directory name.
    #[error("invalid store name {0:?}")]
    InvalidName(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("engine lock poisoned: {0}")]
    Poisoned(String),
}

impl KvError {
    /// Returns `true` for failures that a fresh attempt of the same unit of
    /// work may not hit.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for engine operations.
pub type KvResult<T> = Result<T, KvError>;
