use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use replica_kv::KvEngine;
use replica_types::{
    Body, Change, ChangeAttributes, ConflictAttributes, DocumentNode, Node, NodePath, Resolution,
};

use crate::changes;
use crate::config::StoreConfig;
use crate::conflict;
use crate::engine;
use crate::error::{StoreError, StoreResult};
use crate::event::{ChangeEvent, Origin, StoreEvent};
use crate::nodes;
use crate::notifier::{self, EventFilter, EventStream, InitialStream, Notifier};
use crate::revision;
use crate::unit::{scan_nodes, UnitOfWork};

pub(crate) struct Shared {
    config: StoreConfig,
    engine: RwLock<Option<Arc<dyn KvEngine>>>,
    notifier: Arc<Notifier>,
}

/// Handle to an open replica store.
///
/// Cloning the handle is cheap; clones share the engine and the
/// subscribers, as do handles opened separately on the same store. Every mutation runs as one unit of work on Tokio's blocking
/// pool and is retried from scratch when its commit conflicts with a
/// concurrent one. Events are published only after the unit commits.
#[derive(Clone)]
pub struct ReplicaStore {
    shared: Arc<Shared>,
}

impl ReplicaStore {
    /// Open the store described by `config`, failing with
    /// [`StoreError::OpenTimeout`] if the engine is not ready within
    /// `open_timeout_ms`.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let acquired = open_within(&config).await?;
        info!(name = %config.name, engine = acquired.engine.kind(), "store opened");
        Ok(Self::with_parts(config, acquired.engine, acquired.notifier))
    }

    #[cfg(test)]
    pub(crate) fn with_engine(config: StoreConfig, engine: Arc<dyn KvEngine>) -> Self {
        let notifier = Arc::new(Notifier::new(config.event_capacity));
        Self::with_parts(config, engine, notifier)
    }

    fn with_parts(config: StoreConfig, engine: Arc<dyn KvEngine>, notifier: Arc<Notifier>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                engine: RwLock::new(Some(engine)),
                notifier,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Irreversibly destroy both containers of a store.
    pub async fn clean(config: &StoreConfig) -> StoreResult<()> {
        let config = config.clone();
        blocking(move || engine::destroy(&config)).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// `"file"` or `"memory"`; the latter also after a fallback.
    pub fn engine_kind(&self) -> StoreResult<&'static str> {
        Ok(self.engine()?.kind())
    }

    pub fn is_closed(&self) -> bool {
        self.engine().is_err()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub async fn get(&self, path: &str) -> StoreResult<Option<Node>> {
        let path = NodePath::new(path)?;
        self.read(move |engine| nodes::get(engine, &path)).await
    }

    /// Write a document. `Origin::Remote` marks a replayed remote change:
    /// no pending change is recorded.
    pub async fn put(
        &self,
        path: &str,
        body: impl Into<Body>,
        content_type: &str,
        origin: Origin,
    ) -> StoreResult<Option<DocumentNode>> {
        let path = NodePath::new(path)?;
        nodes::ensure_document(&path)?;
        let body = body.into();
        let content_type = content_type.to_string();
        self.run_unit("put", move |unit| {
            nodes::put(unit, &path, body.clone(), &content_type, origin)
        })
        .await
    }

    pub async fn delete(&self, path: &str, origin: Origin) -> StoreResult<Option<DocumentNode>> {
        let path = NodePath::new(path)?;
        nodes::ensure_document(&path)?;
        self.run_unit("delete", move |unit| nodes::delete(unit, &path, origin))
            .await
    }

    /// Child names of a directory in either namespace.
    pub async fn list(&self, path: &str) -> StoreResult<Vec<String>> {
        let path = NodePath::new(path)?;
        self.read(move |engine| nodes::list(engine, &path)).await
    }

    // -----------------------------------------------------------------------
    // Revisions
    // -----------------------------------------------------------------------

    pub async fn set_revision(&self, path: &str, revision: &str) -> StoreResult<()> {
        self.set_revisions([(path, revision)]).await
    }

    /// Set several revisions in one unit of work.
    pub async fn set_revisions<P, R>(&self, pairs: impl IntoIterator<Item = (P, R)>) -> StoreResult<()>
    where
        P: AsRef<str>,
        R: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(p, r)| NodePath::new(p.as_ref()).map(|path| (path, r.into())))
            .collect::<Result<Vec<(NodePath, String)>, _>>()?;
        self.run_unit("set_revisions", move |unit| {
            revision::set_revisions(unit, &pairs)
        })
        .await
    }

    pub async fn get_revision(&self, path: &str) -> StoreResult<Option<String>> {
        let path = NodePath::new(path)?;
        self.read(move |engine| revision::get_revision(engine, &path))
            .await
    }

    /// Clear revisions of paths no longer present remotely.
    pub async fn forget_revisions<P: AsRef<str>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> StoreResult<()> {
        let paths = paths
            .into_iter()
            .map(|p| NodePath::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.run_unit("forget_revisions", move |unit| {
            revision::forget_revisions(unit, &paths)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Changes and conflicts
    // -----------------------------------------------------------------------

    pub async fn record_change(&self, path: &str, attributes: ChangeAttributes) -> StoreResult<Change> {
        let path = NodePath::new(path)?;
        self.run_unit("record_change", move |unit| {
            changes::record_change(unit, &path, attributes.clone())
        })
        .await
    }

    /// Returns whether a change was pending.
    pub async fn clear_change(&self, path: &str) -> StoreResult<bool> {
        let path = NodePath::new(path)?;
        self.run_unit("clear_change", move |unit| changes::clear_change(unit, &path))
            .await
    }

    /// Pending changes whose path starts with `prefix` (plain string match).
    pub async fn changes_below(&self, prefix: &str) -> StoreResult<Vec<Change>> {
        let prefix = prefix.to_string();
        self.read(move |engine| changes::changes_below(engine, &prefix))
            .await
    }

    pub async fn changes(&self) -> StoreResult<Vec<Change>> {
        self.changes_below("").await
    }

    /// Record a conflict and publish one conflict event carrying a resolver.
    pub async fn set_conflict(&self, path: &str, attributes: ConflictAttributes) -> StoreResult<Change> {
        let path = NodePath::new(path)?;
        let store = Arc::downgrade(&self.shared);
        self.run_unit("set_conflict", move |unit| {
            conflict::set_conflict(unit, &path, attributes.clone(), store.clone())
        })
        .await
    }

    /// Record `resolution` on the conflict pending at `path`. Fails with
    /// [`StoreError::NoConflict`] if the change there carries none.
    pub async fn resolve(&self, path: &str, resolution: Resolution) -> StoreResult<Change> {
        self.resolve_conflict(NodePath::new(path)?, resolution, None)
            .await
    }

    pub(crate) async fn resolve_conflict(
        &self,
        path: NodePath,
        resolution: Resolution,
        recorded: Option<ConflictAttributes>,
    ) -> StoreResult<Change> {
        let change = self
            .run_unit("resolve", {
                let path = path.clone();
                move |unit| conflict::resolve(unit, &path, resolution, recorded.as_ref())
            })
            .await?;
        info!(%path, %resolution, "conflict resolved");
        Ok(change)
    }

    pub async fn conflicts(&self) -> StoreResult<Vec<Change>> {
        self.read(conflict::conflicts).await
    }

    // -----------------------------------------------------------------------
    // Events and lifecycle
    // -----------------------------------------------------------------------

    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.shared.notifier.subscribe(filter)
    }

    /// One remote-origin change event per document with a body, matching
    /// `filter`, on a stream of its own. Seeds a new subscriber with the
    /// current state without going through the bounded live channels.
    pub async fn fire_initial(&self, filter: EventFilter) -> StoreResult<InitialStream> {
        let events = self
            .read(|engine| {
                scan_nodes(engine, "")?
                    .into_iter()
                    .filter_map(|(key, node)| match node {
                        Node::Document(doc) if doc.body.is_some() => Some((key, doc)),
                        _ => None,
                    })
                    .map(|(key, doc)| {
                        NodePath::new(key).map(|path| {
                            StoreEvent::Change(ChangeEvent::new(
                                &path,
                                Origin::Remote,
                                None,
                                Some(&doc),
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(StoreError::from)
            })
            .await?;
        let count = events.len();
        info!(name = %self.shared.config.name, count, "initial state fired");
        Ok(notifier::seed(&filter, events))
    }

    /// Release the engine. Later operations on this handle and its clones
    /// fail with [`StoreError::Closed`].
    pub async fn close(&self) -> StoreResult<()> {
        let engine = self
            .shared
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(engine) = engine else {
            return Ok(());
        };
        // Other handles opened on the same name may still hold the engine.
        if Arc::strong_count(&engine) == 1 {
            blocking(move || Ok(engine.close()?)).await?;
        }
        info!(name = %self.shared.config.name, "store closed");
        Ok(())
    }

    /// Destroy the store's contents and reopen it under the same name.
    pub async fn reset(&self) -> StoreResult<()> {
        let config = self.shared.config.clone();
        self.shared
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Self::clean(&config).await?;
        let engine = open_within(&config).await?.engine;
        *self
            .shared
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(engine);
        info!(name = %config.name, "store reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn engine(&self) -> StoreResult<Arc<dyn KvEngine>> {
        self.shared
            .engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::Closed)
    }

    async fn read<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn KvEngine) -> StoreResult<T> + Send + 'static,
    {
        let engine = self.engine()?;
        blocking(move || work(engine.as_ref())).await
    }

    /// Run `work` as one unit of work, re-running it on commit conflicts,
    /// then publish its events.
    async fn run_unit<T, F>(&self, operation: &'static str, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: Fn(&mut UnitOfWork<'_>) -> StoreResult<T> + Send + 'static,
    {
        let engine = self.engine()?;
        let max_retries = self.shared.config.max_commit_retries;
        let (value, events) = blocking(move || {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                let mut unit = UnitOfWork::begin(engine.as_ref());
                let value = work(&mut unit)?;
                match unit.commit() {
                    Ok(events) => return Ok((value, events)),
                    Err(StoreError::Kv(err)) if err.is_conflict() => {
                        if attempts > max_retries {
                            warn!(operation, attempts, "giving up after repeated commit conflicts");
                            return Err(StoreError::Contention {
                                operation,
                                attempts,
                            });
                        }
                        debug!(operation, attempts, error = %err, "commit conflict, retrying");
                    }
                    Err(err) => return Err(err),
                }
            }
        })
        .await?;
        self.shared.notifier.publish(events);
        Ok(value)
    }
}

impl std::fmt::Debug for ReplicaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaStore")
            .field("name", &self.shared.config.name)
            .field("engine", &self.engine().ok().map(|e| e.kind()))
            .field("notifier", &self.shared.notifier)
            .finish()
    }
}

async fn blocking<T, F>(work: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

async fn open_within(config: &StoreConfig) -> StoreResult<engine::Acquired> {
    let cfg = config.clone();
    with_deadline(config, blocking(move || engine::acquire(&cfg))).await
}

async fn with_deadline<T>(
    config: &StoreConfig,
    fut: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(config.open_timeout(), fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(name = %config.name, timeout_ms = config.open_timeout_ms, "store open timed out");
            Err(StoreError::OpenTimeout {
                name: config.name.clone(),
                timeout_ms: config.open_timeout_ms,
            })
        }
    }
}
