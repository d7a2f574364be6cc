//! Engine selection and the process-wide engine registry.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use replica_kv::{FileEngine, KvEngine, MemoryEngine};

use crate::config::{EngineKind, StoreConfig};
use crate::error::StoreResult;
use crate::notifier::Notifier;

/// Live engines and notifiers by location. Only weak references are kept,
/// so each is released once its last store handle lets go of it.
#[derive(Default)]
struct Registry {
    engines: HashMap<String, Weak<dyn KvEngine>>,
    notifiers: HashMap<String, Weak<Notifier>>,
    /// Serializes opens of one location without blocking other locations.
    opening: HashMap<String, Arc<Mutex<()>>>,
}

impl Registry {
    fn live_engine(&self, key: &str) -> Option<Arc<dyn KvEngine>> {
        self.engines
            .get(key)
            .and_then(Weak::upgrade)
            .filter(|engine| !engine.is_closed())
    }
}

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

fn registry_key(config: &StoreConfig) -> String {
    match config.engine {
        EngineKind::File => format!("file:{}", config.store_dir().display()),
        EngineKind::Memory => format!("memory:{}", config.name),
    }
}

/// What every handle on one store location shares.
pub struct Acquired {
    pub engine: Arc<dyn KvEngine>,
    pub notifier: Arc<Notifier>,
}

/// The live engine and notifier for `config`, opening an engine if none is
/// registered.
///
/// Blocks on file I/O; call from a blocking context.
pub fn acquire(config: &StoreConfig) -> StoreResult<Acquired> {
    let key = registry_key(config);
    let engine = acquire_engine(config, &key)?;
    let notifier = acquire_notifier(config, &key);
    Ok(Acquired { engine, notifier })
}

fn acquire_engine(config: &StoreConfig, key: &str) -> StoreResult<Arc<dyn KvEngine>> {
    let gate = {
        let mut registry = registry();
        if let Some(engine) = registry.live_engine(key) {
            debug!(key, "sharing live engine");
            return Ok(engine);
        }
        registry.opening.entry(key.to_string()).or_default().clone()
    };

    // The registry lock is not held while the engine replays its log.
    let _opening = gate.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(engine) = registry().live_engine(key) {
        debug!(key, "sharing engine opened concurrently");
        return Ok(engine);
    }
    let engine = open_engine(config)?;
    let mut registry = registry();
    registry.engines.retain(|_, weak| weak.strong_count() > 0);
    registry.engines.insert(key.to_string(), Arc::downgrade(&engine));
    registry.opening.remove(key);
    Ok(engine)
}

fn acquire_notifier(config: &StoreConfig, key: &str) -> Arc<Notifier> {
    let mut registry = registry();
    if let Some(notifier) = registry.notifiers.get(key).and_then(Weak::upgrade) {
        return notifier;
    }
    let notifier = Arc::new(Notifier::new(config.event_capacity));
    registry.notifiers.retain(|_, weak| weak.strong_count() > 0);
    registry
        .notifiers
        .insert(key.to_string(), Arc::downgrade(&notifier));
    notifier
}

fn open_engine(config: &StoreConfig) -> StoreResult<Arc<dyn KvEngine>> {
    match config.engine {
        EngineKind::Memory => Ok(Arc::new(MemoryEngine::new(config.name.clone()))),
        EngineKind::File => match FileEngine::open(&config.root, &config.name, config.sync_mode) {
            Ok(engine) => Ok(Arc::new(engine)),
            Err(err) if config.fallback_to_memory => {
                warn!(
                    name = %config.name,
                    root = %config.root.display(),
                    error = %err,
                    "file engine unavailable, using memory engine"
                );
                Ok(Arc::new(MemoryEngine::new(config.name.clone())))
            }
            Err(err) => Err(err.into()),
        },
    }
}

/// Irreversibly destroy both containers of the store described by `config`.
///
/// A registered live engine is emptied and closed first, so handles still
/// holding it fail with a closed error rather than writing to a removed log.
pub fn destroy(config: &StoreConfig) -> StoreResult<()> {
    let live = registry()
        .engines
        .remove(&registry_key(config))
        .and_then(|weak| weak.upgrade());
    if let Some(engine) = live {
        if !engine.is_closed() {
            engine.clear()?;
            engine.close()?;
        }
    }
    if config.engine == EngineKind::File {
        FileEngine::destroy(&config.root, &config.name)?;
    }
    info!(name = %config.name, engine = %config.engine, "store destroyed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use replica_kv::{Container, Transaction};

    #[test]
    fn same_name_shares_one_engine() {
        let config = StoreConfig::memory("engine-shared");
        let a = acquire(&config).unwrap();
        let b = acquire(&config).unwrap();
        assert!(Arc::ptr_eq(&a.engine, &b.engine));
        assert!(Arc::ptr_eq(&a.notifier, &b.notifier));
    }

    #[test]
    fn notifier_outlives_engine_replacement() {
        let config = StoreConfig::memory("engine-notifier");
        let a = acquire(&config).unwrap();
        a.engine.close().unwrap();
        let b = acquire(&config).unwrap();
        assert!(!Arc::ptr_eq(&a.engine, &b.engine));
        assert!(Arc::ptr_eq(&a.notifier, &b.notifier));
    }

    #[test]
    fn concurrent_opens_of_one_file_store_share_an_engine() {
        let root = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(root.path(), "engine-race");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let config = config.clone();
                std::thread::spawn(move || acquire(&config).unwrap().engine)
            })
            .collect();
        let engines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
    }

    #[test]
    fn released_engine_is_reopened() {
        let config = StoreConfig::memory("engine-released");
        let a = acquire(&config).unwrap().engine;
        let mut txn = Transaction::begin(a.as_ref());
        txn.put(Container::Nodes, "k", &1u32).unwrap();
        txn.commit().unwrap();
        drop(a);

        let b = acquire(&config).unwrap().engine;
        assert!(b.is_empty().unwrap());
    }

    #[test]
    fn closed_engine_is_replaced() {
        let config = StoreConfig::memory("engine-closed");
        let a = acquire(&config).unwrap().engine;
        a.close().unwrap();
        let b = acquire(&config).unwrap().engine;
        assert!(!b.is_closed());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn destroy_closes_live_engine_and_removes_files() {
        let root = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(root.path(), "engine-destroy");
        let engine = acquire(&config).unwrap().engine;
        assert_eq!(engine.kind(), "file");

        destroy(&config).unwrap();
        assert!(engine.is_closed());
        assert!(!config.store_dir().exists());
    }

    #[test]
    fn fallback_to_memory_when_file_engine_fails() {
        let root = tempfile::NamedTempFile::new().unwrap();
        let mut config = StoreConfig::file(root.path(), "engine-fallback");
        assert!(matches!(acquire(&config), Err(StoreError::Kv(_))));

        config.fallback_to_memory = true;
        let engine = acquire(&config).unwrap().engine;
        assert_eq!(engine.kind(), "memory");
    }
}
