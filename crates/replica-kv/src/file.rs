use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::{KvError, KvResult};
use crate::schema::{self, Manifest, SCHEMA_VERSION};
use crate::state::EngineState;
use crate::traits::{Container, KvEngine, Version, Versioned, WriteBatch};
use crate::wal::{CommitRecord, SyncMode, WriteAheadLog};

/// Name of the commit log inside a store directory.
pub const WAL_FILE: &str = "commits.wal";

/// Replayed operations allowed beyond twice the live key count before the
/// log is compacted on open.
const COMPACT_SLACK: usize = 256;

/// Durable engine backed by a write-ahead log.
///
/// Layout under `<root>/<name>/`:
///
/// ```text
/// MANIFEST      {"schema_version": 2}
/// commits.wal   framed CommitRecords
/// ```
///
/// The full state is held in memory and rebuilt from the log on open. A
/// commit is appended to the log before it is applied, under the same write
/// lock that readers take, so a commit that fails to persist is never
/// observed.
pub struct FileEngine {
    name: String,
    dir: PathBuf,
    state: RwLock<EngineState>,
    wal: WriteAheadLog,
}

impl FileEngine {
    /// Open (or create) the store `name` under `root`, replaying its log and
    /// migrating it to the current schema.
    pub fn open(root: &Path, name: &str, sync_mode: SyncMode) -> KvResult<Self> {
        validate_name(name)?;
        let dir = root.join(name);
        fs::create_dir_all(&dir)?;

        let manifest = Manifest::load(&dir)?;
        let wal = WriteAheadLog::open(&dir.join(WAL_FILE), sync_mode)?;
        let records = wal.recover()?;

        let mut state = EngineState::new();
        let mut replayed_ops = 0usize;
        for record in &records {
            replayed_ops += record.ops.len();
            state.apply(&record.ops, record.seq);
        }

        let from = manifest
            .as_ref()
            .map(|m| m.schema_version)
            .unwrap_or(SCHEMA_VERSION);
        let migrated = schema::migrate(&mut state, from)?;

        let engine = Self {
            name: name.to_string(),
            dir,
            state: RwLock::new(state),
            wal,
        };

        let live = engine.read_state()?.live_keys();
        if migrated || replayed_ops > 2 * live + COMPACT_SLACK {
            engine.compact()?;
        }
        if manifest.is_none() || migrated {
            Manifest::current().store(&engine.dir)?;
        }

        info!(
            name,
            dir = %engine.dir.display(),
            records = records.len(),
            live_keys = live,
            migrated,
            "file engine opened"
        );
        Ok(engine)
    }

    /// Irreversibly remove the store `name` under `root`.
    pub fn destroy(root: &Path, name: &str) -> KvResult<()> {
        validate_name(name)?;
        let dir = root.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(name, dir = %dir.display(), "file engine destroyed");
        }
        Ok(())
    }

    /// Rewrite the log as a single snapshot record of the live state.
    pub fn compact(&self) -> KvResult<()> {
        let state = self.write_state()?;
        state.ensure_open()?;
        let ops = state.snapshot_ops();
        let records = if ops.is_empty() {
            Vec::new()
        } else {
            vec![CommitRecord {
                seq: state.seq(),
                ops,
            }]
        };
        self.wal.rewrite(&records)?;
        debug!(name = %self.name, live_keys = state.live_keys(), "log compacted");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
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

fn validate_name(name: &str) -> KvResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(KvError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl KvEngine for FileEngine {
    fn kind(&self) -> &'static str {
        "file"
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

        let record = CommitRecord {
            seq: state.seq() + 1,
            ops: batch.writes,
        };
        self.wal.append(&record)?;
        state.apply(&record.ops, record.seq);
        Ok(record.seq)
    }

    fn len(&self, container: Container) -> KvResult<usize> {
        self.read_state()?.len(container)
    }

    fn clear(&self) -> KvResult<()> {
        let mut state = self.write_state()?;
        state.ensure_open()?;
        self.wal.truncate()?;
        state.clear();
        Ok(())
    }

    fn close(&self) -> KvResult<()> {
        let mut state = self.write_state()?;
        if state.is_closed() {
            return Ok(());
        }
        self.wal.sync()?;
        state.mark_closed();
        info!(name = %self.name, "file engine closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.read().map(|s| s.is_closed()).unwrap_or(true)
    }
}

impl std::fmt::Debug for FileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEngine")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .finish()
    }
}
