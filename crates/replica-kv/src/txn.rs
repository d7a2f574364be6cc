use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::traits::{Container, KvEngine, ReadStamp, Version, WriteBatch, WriteOp};

/// Encode a record value.
pub fn encode_value<T: Serialize>(value: &T) -> KvResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| KvError::Serialization(e.to_string()))
}

/// Decode a record value.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> KvResult<T> {
    bincode::deserialize(bytes).map_err(|e| KvError::Serialization(e.to_string()))
}

/// An optimistic unit of work over a [`KvEngine`].
///
/// Reads go to the transaction's own buffered writes first and to committed
/// state otherwise; the first version observed for each committed key is
/// remembered. Nothing is visible to other readers until [`commit`]
/// succeeds, and dropping the transaction discards everything.
///
/// [`commit`]: Transaction::commit
pub struct Transaction<'e> {
    engine: &'e dyn KvEngine,
    reads: HashMap<(Container, String), Version>,
    writes: BTreeMap<(Container, String), Option<Vec<u8>>>,
}

impl<'e> Transaction<'e> {
    pub fn begin(engine: &'e dyn KvEngine) -> Self {
        Self {
            engine,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Read raw bytes, seeing this transaction's own writes.
    pub fn get_raw(&mut self, container: Container, key: &str) -> KvResult<Option<Vec<u8>>> {
        let slot = (container, key.to_string());
        if let Some(pending) = self.writes.get(&slot) {
            return Ok(pending.clone());
        }
        let found = self.engine.read(container, key)?;
        let version = found.as_ref().map(|v| v.version).unwrap_or(0);
        self.reads.entry(slot).or_insert(version);
        Ok(found.map(|v| v.value))
    }

    /// Read and decode a value.
    pub fn get<T: DeserializeOwned>(&mut self, container: Container, key: &str) -> KvResult<Option<T>> {
        self.get_raw(container, key)?
            .map(|bytes| decode_value(&bytes))
            .transpose()
    }

    pub fn put_raw(&mut self, container: Container, key: &str, value: Vec<u8>) {
        self.writes.insert((container, key.to_string()), Some(value));
    }

    /// Encode and buffer a value.
    pub fn put<T: Serialize>(&mut self, container: Container, key: &str, value: &T) -> KvResult<()> {
        let bytes = encode_value(value)?;
        self.put_raw(container, key, bytes);
        Ok(())
    }

    /// Buffer a deletion. Deleting an absent key is a no-op at commit.
    pub fn delete(&mut self, container: Container, key: &str) {
        self.writes.insert((container, key.to_string()), None);
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Validate the read set and apply every buffered write atomically.
    pub fn commit(self) -> KvResult<Version> {
        let batch = WriteBatch {
            reads: self
                .reads
                .into_iter()
                .map(|((container, key), version)| ReadStamp {
                    container,
                    key,
                    version,
                })
                .collect(),
            writes: self
                .writes
                .into_iter()
                .map(|((container, key), value)| WriteOp {
                    container,
                    key,
                    value,
                })
                .collect(),
        };
        let (reads, writes) = (batch.reads.len(), batch.writes.len());
        let version = self.engine.commit(batch)?;
        debug!(engine = self.engine.name(), version, reads, writes, "transaction committed");
        Ok(version)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("engine", &self.engine.name())
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;

    #[test]
    fn reads_see_own_writes() {
        let engine = MemoryEngine::new("t");
        let mut txn = Transaction::begin(&engine);
        txn.put(Container::Nodes, "a", &"hello".to_string()).unwrap();
        let read: Option<String> = txn.get(Container::Nodes, "a").unwrap();
        assert_eq!(read.as_deref(), Some("hello"));

        txn.delete(Container::Nodes, "a");
        let read: Option<String> = txn.get(Container::Nodes, "a").unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let engine = MemoryEngine::new("t");
        let mut txn = Transaction::begin(&engine);
        txn.put(Container::Nodes, "a", &1u32).unwrap();
        assert!(engine.read(Container::Nodes, "a").unwrap().is_none());
        drop(txn);
        assert!(engine.read(Container::Nodes, "a").unwrap().is_none());
    }

    #[test]
    fn commit_applies_all_writes() {
        let engine = MemoryEngine::new("t");
        let mut txn = Transaction::begin(&engine);
        txn.put(Container::Nodes, "a", &1u32).unwrap();
        txn.put(Container::Changes, "a", &2u32).unwrap();
        txn.commit().unwrap();

        assert_eq!(engine.len(Container::Nodes).unwrap(), 1);
        assert_eq!(engine.len(Container::Changes).unwrap(), 1);
    }

    #[test]
    fn concurrent_read_modify_write_conflicts() {
        let engine = MemoryEngine::new("t");

        let mut first = Transaction::begin(&engine);
        let mut second = Transaction::begin(&engine);

        let _: Option<u32> = first.get(Container::Nodes, "dir/").unwrap();
        let _: Option<u32> = second.get(Container::Nodes, "dir/").unwrap();

        first.put(Container::Nodes, "dir/", &1u32).unwrap();
        second.put(Container::Nodes, "dir/", &2u32).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict());

        let stored: u32 = decode_value(&engine.read(Container::Nodes, "dir/").unwrap().unwrap().value).unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn disjoint_keys_commit_independently() {
        let engine = MemoryEngine::new("t");
        let mut first = Transaction::begin(&engine);
        let mut second = Transaction::begin(&engine);

        let _: Option<u32> = first.get(Container::Nodes, "a/").unwrap();
        let _: Option<u32> = second.get(Container::Nodes, "b/").unwrap();
        first.put(Container::Nodes, "a/", &1u32).unwrap();
        second.put(Container::Nodes, "b/", &2u32).unwrap();

        first.commit().unwrap();
        second.commit().unwrap();
        assert_eq!(engine.len(Container::Nodes).unwrap(), 2);
    }
}
