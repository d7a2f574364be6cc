use replica_types::{Body, ConflictAttributes, DocumentNode, NodePath};

use crate::conflict::ConflictResolver;

/// Where a mutation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Made through this store; recorded as a pending change.
    Local,
    /// Replayed from the remote peer; not recorded.
    Remote,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Classification of store events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    Conflict,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Change => f.write_str("change"),
            Self::Conflict => f.write_str("conflict"),
        }
    }
}

/// A document was written or removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: NodePath,
    pub origin: Origin,
    pub old_value: Option<Body>,
    pub new_value: Option<Body>,
    pub old_content_type: Option<String>,
    pub new_content_type: Option<String>,
}

impl ChangeEvent {
    pub(crate) fn new(
        path: &NodePath,
        origin: Origin,
        old: Option<&DocumentNode>,
        new: Option<&DocumentNode>,
    ) -> Self {
        Self {
            path: path.clone(),
            origin,
            old_value: old.and_then(|d| d.body.clone()),
            new_value: new.and_then(|d| d.body.clone()),
            old_content_type: old.and_then(|d| d.content_type.clone()),
            new_content_type: new.and_then(|d| d.content_type.clone()),
        }
    }
}

/// A conflict was recorded for a path.
///
/// Carries the conflict as recorded plus a [`ConflictResolver`] that records
/// the caller's choice.
#[derive(Clone, Debug)]
pub struct ConflictEvent {
    pub path: NodePath,
    pub attributes: ConflictAttributes,
    pub resolver: ConflictResolver,
}

/// An event delivered to subscribers after the unit of work that produced
/// it has committed.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Change(ChangeEvent),
    Conflict(ConflictEvent),
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Change(_) => EventKind::Change,
            Self::Conflict(_) => EventKind::Conflict,
        }
    }

    pub fn path(&self) -> &NodePath {
        match self {
            Self::Change(e) => &e.path,
            Self::Conflict(e) => &e.path,
        }
    }

    pub fn as_change(&self) -> Option<&ChangeEvent> {
        match self {
            Self::Change(e) => Some(e),
            Self::Conflict(_) => None,
        }
    }

    pub fn as_conflict(&self) -> Option<&ConflictEvent> {
        match self {
            Self::Conflict(e) => Some(e),
            Self::Change(_) => None,
        }
    }
}
