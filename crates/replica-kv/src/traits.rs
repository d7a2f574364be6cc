use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KvResult;

/// Commit version. Every key written by a commit takes that commit's
/// sequence number; an absent key reads as version 0.
pub type Version = u64;

/// The two record containers of a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Container {
    Nodes,
    Changes,
}

impl Container {
    pub const ALL: [Container; 2] = [Container::Nodes, Container::Changes];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Changes => "changes",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A committed value together with the version that wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: Version,
}

/// The version of a key as observed by a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadStamp {
    pub container: Container,
    pub key: String,
    pub version: Version,
}

/// A single buffered write. `value: None` deletes the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOp {
    pub container: Container,
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Everything a transaction read and wants to write, validated and applied
/// as one unit by [`KvEngine::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub reads: Vec<ReadStamp>,
    pub writes: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Transactional key-value engine.
///
/// All implementations must satisfy these invariants:
/// - `commit` validates every read stamp and applies every write under one
///   critical section; on any error nothing is applied.
/// - A stamp whose key changed since it was read fails the commit with
///   `KvError::Conflict`.
/// - `scan_prefix` returns keys in ascending byte-wise order.
/// - After `close`, every operation fails with `KvError::Closed`.
pub trait KvEngine: Send + Sync + fmt::Debug {
    /// Short backend label used in logs (`"memory"`, `"file"`).
    fn kind(&self) -> &'static str;

    /// The store name this engine was opened under.
    fn name(&self) -> &str;

    /// Read the committed value and version of a key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn read(&self, container: Container, key: &str) -> KvResult<Option<Versioned>>;

    /// All committed entries whose key starts with `prefix`, ascending.
    fn scan_prefix(&self, container: Container, prefix: &str) -> KvResult<Vec<(String, Vec<u8>)>>;

    /// Validate and apply a batch atomically. Returns the commit version.
    fn commit(&self, batch: WriteBatch) -> KvResult<Version>;

    /// Number of keys in a container.
    fn len(&self, container: Container) -> KvResult<usize>;

    /// Remove every key from both containers.
    fn clear(&self) -> KvResult<()>;

    /// Release the engine. Idempotent.
    fn close(&self) -> KvResult<()>;

    fn is_closed(&self) -> bool;

    /// Returns `true` if both containers are empty.
    fn is_empty(&self) -> KvResult<bool> {
        for container in Container::ALL {
            if self.len(container)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
