//! Versioned on-disk schema.
//!
//! A store directory carries a `MANIFEST` recording the schema version its
//! log was written with. Version history:
//!
//! - 1: nodes stored documents and directories as loosely typed records
//! - 2: nodes store typed `Node` records; directory nodes keep separate
//!   `body` and `cached` presence sets
//!
//! Opening a store below the current version recreates the `nodes`
//! container and preserves `changes`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{KvError, KvResult};
use crate::state::EngineState;
use crate::traits::Container;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

pub const MANIFEST_FILE: &str = "MANIFEST";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
}

impl Manifest {
    pub fn current() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Load the manifest from a store directory, if one exists.
    pub fn load(dir: &Path) -> KvResult<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| KvError::CorruptManifest {
                path,
                reason: e.to_string(),
            })
    }

    /// Write the manifest via a temporary file and rename.
    pub fn store(&self, dir: &Path) -> KvResult<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| KvError::Serialization(e.to_string()))?;
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, dir.join(MANIFEST_FILE))?;
        Ok(())
    }
}

/// Bring recovered state from `from` up to [`SCHEMA_VERSION`].
///
/// Returns `true` if anything was migrated.
pub fn migrate(state: &mut EngineState, from: u32) -> KvResult<bool> {
    if from > SCHEMA_VERSION {
        return Err(KvError::SchemaTooNew {
            found: from,
            supported: SCHEMA_VERSION,
        });
    }
    if from == SCHEMA_VERSION {
        return Ok(false);
    }

    let dropped = state.len(Container::Nodes)?;
    state.drop_container(Container::Nodes);
    info!(
        from,
        to = SCHEMA_VERSION,
        dropped_nodes = dropped,
        kept_changes = state.len(Container::Changes)?,
        "migrated store schema; nodes container recreated"
    );
    Ok(true)
}
