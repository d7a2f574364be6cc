use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use replica_kv::SyncMode;

use crate::error::{StoreError, StoreResult};

/// Which engine backs a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Durable write-ahead-logged engine under `root/name`.
    #[default]
    File,
    /// Process-local engine; contents vanish with the last handle.
    Memory,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Store configuration.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// name = "documents"
/// root = "/var/lib/replica"
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name; one live engine exists per name per process.
    pub name: String,
    pub engine: EngineKind,
    /// Parent directory of file-backed stores.
    pub root: PathBuf,
    pub open_timeout_ms: u64,
    /// Re-runs of a unit of work after a commit conflict.
    pub max_commit_retries: u32,
    /// Capacity of each subscriber's event channel.
    pub event_capacity: usize,
    /// Substitute the memory engine when the file engine cannot be opened.
    pub fallback_to_memory: bool,
    pub sync_mode: SyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "replica".to_string(),
            engine: EngineKind::File,
            root: PathBuf::from(".replica"),
            open_timeout_ms: 3500,
            max_commit_retries: 16,
            event_capacity: 1024,
            fallback_to_memory: false,
            sync_mode: SyncMode::OsDefault,
        }
    }
}

impl StoreConfig {
    /// A file-backed store `name` under `root`.
    pub fn file(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: EngineKind::File,
            root: root.into(),
            ..Self::default()
        }
    }

    /// A memory-backed store.
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: EngineKind::Memory,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        toml::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Directory holding a file-backed store.
    pub fn store_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.engine, EngineKind::File);
        assert_eq!(c.open_timeout(), Duration::from_millis(3500));
        assert_eq!(c.max_commit_retries, 16);
        assert_eq!(c.event_capacity, 1024);
        assert!(!c.fallback_to_memory);
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            name = "docs"
            engine = "memory"
            sync_mode = "every_write"
            "#,
        )
        .unwrap();
        assert_eq!(c.name, "docs");
        assert_eq!(c.engine, EngineKind::Memory);
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.max_commit_retries, 16);
    }

    #[test]
    fn toml_roundtrip() {
        let c = StoreConfig::file("/tmp/replica", "docs");
        let raw = c.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&raw).unwrap(), c);
        assert_eq!(c.store_dir(), PathBuf::from("/tmp/replica/docs"));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            StoreConfig::from_toml_str("engine = \"tape\""),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.toml");
        std::fs::write(&path, "open_timeout_ms = 100\n").unwrap();
        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.open_timeout_ms, 100);
        assert!(matches!(
            StoreConfig::load(&dir.path().join("missing.toml")),
            Err(StoreError::Io(_))
        ));
    }
}
