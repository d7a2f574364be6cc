//! Versioned in-memory container state shared by every engine.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{KvError, KvResult};
use crate::traits::{Container, ReadStamp, Version, Versioned, WriteOp};

#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    version: Version,
}

/// Committed contents of both containers plus the commit sequence.
///
/// Engines wrap this behind a lock; it performs no locking itself.
#[derive(Debug, Default)]
pub struct EngineState {
    nodes: BTreeMap<String, Entry>,
    changes: BTreeMap<String, Entry>,
    seq: Version,
    closed: bool,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, container: Container) -> &BTreeMap<String, Entry> {
        match container {
            Container::Nodes => &self.nodes,
            Container::Changes => &self.changes,
        }
    }

    fn map_mut(&mut self, container: Container) -> &mut BTreeMap<String, Entry> {
        match container {
            Container::Nodes => &mut self.nodes,
            Container::Changes => &mut self.changes,
        }
    }

    pub fn ensure_open(&self) -> KvResult<()> {
        if self.closed {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sequence number of the last applied commit.
    pub fn seq(&self) -> Version {
        self.seq
    }

    pub fn read(&self, container: Container, key: &str) -> KvResult<Option<Versioned>> {
        self.ensure_open()?;
        Ok(self.map(container).get(key).map(|e| Versioned {
            value: e.value.clone(),
            version: e.version,
        }))
    }

    pub fn scan_prefix(
        &self,
        container: Container,
        prefix: &str,
    ) -> KvResult<Vec<(String, Vec<u8>)>> {
        self.ensure_open()?;
        Ok(self
            .map(container)
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }

    pub fn len(&self, container: Container) -> KvResult<usize> {
        self.ensure_open()?;
        Ok(self.map(container).len())
    }

    /// Total number of keys across both containers.
    pub fn live_keys(&self) -> usize {
        self.nodes.len() + self.changes.len()
    }

    /// Check every stamp against the committed versions.
    pub fn validate(&self, reads: &[ReadStamp]) -> KvResult<()> {
        self.ensure_open()?;
        for stamp in reads {
            let current = self
                .map(stamp.container)
                .get(&stamp.key)
                .map(|e| e.version)
                .unwrap_or(0);
            if current != stamp.version {
                return Err(KvError::Conflict {
                    container: stamp.container,
                    key: stamp.key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Apply writes as commit `seq`. Callers validate first.
    pub fn apply(&mut self, writes: &[WriteOp], seq: Version) {
        for op in writes {
            let map = self.map_mut(op.container);
            match &op.value {
                Some(value) => {
                    map.insert(
                        op.key.clone(),
                        Entry {
                            value: value.clone(),
                            version: seq,
                        },
                    );
                }
                None => {
                    map.remove(&op.key);
                }
            }
        }
        self.seq = self.seq.max(seq);
    }

    /// Drop every key of one container.
    pub fn drop_container(&mut self, container: Container) {
        self.map_mut(container).clear();
    }

    /// Drop every key. The sequence keeps growing so versions never repeat.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.changes.clear();
    }

    /// The full contents as a list of puts, used to compact a log.
    pub fn snapshot_ops(&self) -> Vec<WriteOp> {
        Container::ALL
            .iter()
            .flat_map(|&container| {
                self.map(container).iter().map(move |(k, e)| WriteOp {
                    container,
                    key: k.clone(),
                    value: Some(e.value.clone()),
                })
            })
            .collect()
    }
}
