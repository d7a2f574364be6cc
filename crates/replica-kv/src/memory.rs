use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{KvError, KvResult};
use crate::state::EngineState;
use crate::traits::{Container, KvEngine, Version, Versioned, WriteBatch};

/// In-memory, `BTreeMap`-based engine.
///
/// Intended for tests and as the fallback when persistent storage cannot be
/// opened. All state lives behind a `RwLock`; a commit validates and applies
/// under the write lock, so it is atomic with respect to every reader. Data
/// is lost when the engine is dropped.
pub struct MemoryEngine {
    name: String,
    state: RwLock<EngineState>,
}

impl MemoryEngine {
    /// Create a new empty engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(EngineState::new()),
        }
    }

    fn read_state(&self) -> KvResult<RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|e| KvError::Poisoned(e.to_string()))
    }

    fn write_state(&self) -> KvResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|e| KvError::Poisoned(e.to_string()))
    }
}

impl KvEngine for MemoryEngine {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, container: Container, key: &str) -> KvResult<Option<Versioned>> {
        self.read_state()?.read(container, key)
    }

    fn scan_prefix(&self, container: Container, prefix: &str) -> KvResult<Vec<(String, Vec<u8>)>> {
        self.read_state()?.scan_prefix(container, prefix)
    }

    fn commit(&self, batch: WriteBatch) -> KvResult<Version> {
        let mut state = self.write_state()?;
        state.validate(&batch.reads)?;
        if batch.is_read_only() {
            return Ok(state.seq());
        }
        let seq = state.seq() + 1;
        state.apply(&batch.writes, seq);
        Ok(seq)
    }

    fn len(&self, container: Container) -> KvResult<usize> {
        self.read_state()?.len(container)
    }

    fn clear(&self) -> KvResult<()> {
        let mut state = self.write_state()?;
        state.ensure_open()?;
        state.clear();
        Ok(())
    }

    fn close(&self) -> KvResult<()> {
        self.write_state()?.mark_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.read().map(|s| s.is_closed()).unwrap_or(true)
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (nodes, changes) = self
            .read_state()
            .map(|s| {
                (
                    s.len(Container::Nodes).unwrap_or(0),
                    s.len(Container::Changes).unwrap_or(0),
                )
            })
            .unwrap_or((0, 0));
        f.debug_struct("MemoryEngine")
            .field("name", &self.name)
            .field("nodes", &nodes)
            .field("changes", &changes)
            .finish()
    }
}
