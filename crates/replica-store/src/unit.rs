//! Units of work: one engine transaction plus the events it will publish.

use replica_kv::{decode_value, Container, KvEngine, Transaction};
use replica_types::{Change, DirectoryNode, Node, NodePath};

use crate::error::{StoreError, StoreResult};
use crate::event::StoreEvent;

/// A single atomic mutation of the store.
///
/// Node and change records are read and written through the wrapped
/// transaction; events are queued in an outbox that [`commit`] hands back
/// only when the transaction commits. Dropping the unit discards both.
///
/// [`commit`]: UnitOfWork::commit
pub struct UnitOfWork<'e> {
    txn: Transaction<'e>,
    outbox: Vec<StoreEvent>,
}

impl<'e> UnitOfWork<'e> {
    pub fn begin(engine: &'e dyn KvEngine) -> Self {
        Self {
            txn: Transaction::begin(engine),
            outbox: Vec::new(),
        }
    }

    pub fn node(&mut self, path: &NodePath) -> StoreResult<Option<Node>> {
        Ok(self.txn.get(Container::Nodes, path.as_str())?)
    }

    /// The directory node at `path`, if one is stored there.
    pub fn directory(&mut self, path: &NodePath) -> StoreResult<Option<DirectoryNode>> {
        Ok(self.node(path)?.and_then(Node::into_directory))
    }

    pub fn put_node(&mut self, path: &NodePath, node: &Node) -> StoreResult<()> {
        Ok(self.txn.put(Container::Nodes, path.as_str(), node)?)
    }

    pub fn delete_node(&mut self, path: &NodePath) {
        self.txn.delete(Container::Nodes, path.as_str());
    }

    pub fn change(&mut self, path: &NodePath) -> StoreResult<Option<Change>> {
        Ok(self.txn.get(Container::Changes, path.as_str())?)
    }

    pub fn put_change(&mut self, change: &Change) -> StoreResult<()> {
        Ok(self.txn.put(Container::Changes, change.path.as_str(), change)?)
    }

    pub fn delete_change(&mut self, path: &NodePath) {
        self.txn.delete(Container::Changes, path.as_str());
    }

    /// Queue an event for delivery after commit.
    pub fn emit(&mut self, event: StoreEvent) {
        self.outbox.push(event);
    }

    pub fn write_count(&self) -> usize {
        self.txn.write_count()
    }

    /// Commit the transaction and release the outbox.
    pub fn commit(self) -> StoreResult<Vec<StoreEvent>> {
        if self.txn.write_count() > 0 {
            self.txn.commit()?;
        }
        Ok(self.outbox)
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("txn", &self.txn)
            .field("outbox", &self.outbox.len())
            .finish()
    }
}

/// Read one node from committed state.
pub fn load_node(engine: &dyn KvEngine, path: &NodePath) -> StoreResult<Option<Node>> {
    engine
        .read(Container::Nodes, path.as_str())?
        .map(|v| decode_value(&v.value))
        .transpose()
        .map_err(StoreError::from)
}

/// Every committed node whose key starts with `prefix`, in key order.
pub fn scan_nodes(engine: &dyn KvEngine, prefix: &str) -> StoreResult<Vec<(String, Node)>> {
    engine
        .scan_prefix(Container::Nodes, prefix)?
        .into_iter()
        .map(|(key, bytes)| decode_value(&bytes).map(|node| (key, node)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

/// Every committed change whose key starts with `prefix`, in key order.
pub fn scan_changes(engine: &dyn KvEngine, prefix: &str) -> StoreResult<Vec<Change>> {
    engine
        .scan_prefix(Container::Changes, prefix)?
        .into_iter()
        .map(|(_, bytes)| decode_value(&bytes))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}
