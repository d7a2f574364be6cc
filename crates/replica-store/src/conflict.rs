//! Conflict recording and resolution.

use std::sync::Weak;

use replica_kv::KvEngine;
use replica_types::{Change, ChangeAttributes, ConflictAttributes, NodePath, Resolution};

use crate::changes::{changes_below, record_change};
use crate::error::{StoreError, StoreResult};
use crate::event::{ConflictEvent, StoreEvent};
use crate::store::{ReplicaStore, Shared};
use crate::unit::UnitOfWork;

/// Record a conflict on the change at `path` and queue one conflict event.
pub(crate) fn set_conflict(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    attributes: ConflictAttributes,
    store: Weak<Shared>,
) -> StoreResult<Change> {
    let change = record_change(unit, path, ChangeAttributes::conflict(attributes.clone()))?;
    unit.emit(StoreEvent::Conflict(ConflictEvent {
        path: path.clone(),
        attributes: attributes.clone(),
        resolver: ConflictResolver {
            store,
            path: path.clone(),
            attributes,
        },
    }));
    Ok(change)
}

/// Record `resolution` on the conflict at `path`.
///
/// `recorded` is the conflict as it was published; without it the stored
/// change must carry a conflict, or this fails with
/// [`StoreError::NoConflict`].
pub(crate) fn resolve(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    resolution: Resolution,
    recorded: Option<&ConflictAttributes>,
) -> StoreResult<Change> {
    let mut attributes = match recorded {
        Some(attributes) => attributes.clone(),
        None => unit
            .change(path)?
            .and_then(|change| change.conflict)
            .ok_or_else(|| StoreError::NoConflict(path.to_string()))?,
    };
    attributes.resolution = Some(resolution);
    record_change(unit, path, ChangeAttributes::conflict(attributes))
}

/// Every pending change carrying a conflict, in key order.
pub fn conflicts(engine: &dyn KvEngine) -> StoreResult<Vec<Change>> {
    Ok(changes_below(engine, "")?
        .into_iter()
        .filter(Change::is_conflicted)
        .collect())
}

/// Records the caller's choice for one conflict.
///
/// Holds only a weak reference to the store: once every handle is dropped,
/// resolving fails with [`StoreError::Closed`].
#[derive(Clone)]
pub struct ConflictResolver {
    store: Weak<Shared>,
    path: NodePath,
    attributes: ConflictAttributes,
}

impl ConflictResolver {
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Resolve with `"local"` or `"remote"`. Any other value fails before
    /// anything is written.
    pub async fn resolve(&self, resolution: &str) -> StoreResult<Change> {
        let resolution: Resolution = resolution.parse()?;
        self.resolve_with(resolution).await
    }

    pub async fn resolve_with(&self, resolution: Resolution) -> StoreResult<Change> {
        let shared = self.store.upgrade().ok_or(StoreError::Closed)?;
        ReplicaStore::from_shared(shared)
            .resolve_conflict(self.path.clone(), resolution, Some(self.attributes.clone()))
            .await
    }
}

impl std::fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("path", &self.path)
            .field("attributes", &self.attributes)
            .field("live", &(self.store.strong_count() > 0))
            .finish()
    }
}
