//! Document writes and lookups.

use replica_kv::KvEngine;
use replica_types::{
    Body, ChangeAction, ChangeAttributes, DocumentNode, Namespace, Node, NodePath,
};

use crate::changes::record_change;
use crate::directory::{add_to_parent, remove_from_parent};
use crate::error::{StoreError, StoreResult};
use crate::event::{ChangeEvent, Origin, StoreEvent};
use crate::unit::{load_node, UnitOfWork};

/// Reject directory-shaped paths for document writes.
pub fn ensure_document(path: &NodePath) -> StoreResult<()> {
    if path.is_dir() {
        return Err(StoreError::DirectoryPath(path.to_string()));
    }
    Ok(())
}

fn document(node: Option<Node>) -> Option<DocumentNode> {
    match node {
        Some(Node::Document(doc)) => Some(doc),
        _ => None,
    }
}

/// Write a document, keeping its revision, and register it with its
/// ancestors. Returns the previous document.
pub fn put(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    body: Body,
    content_type: &str,
    origin: Origin,
) -> StoreResult<Option<DocumentNode>> {
    ensure_document(path)?;
    let previous = document(unit.node(path)?);
    let doc = DocumentNode {
        content_type: Some(content_type.to_string()),
        body: Some(body),
        revision: previous.as_ref().and_then(|p| p.revision.clone()),
    };
    unit.put_node(path, &Node::Document(doc.clone()))?;
    add_to_parent(unit, path, Namespace::Body)?;

    if origin == Origin::Local {
        record_change(unit, path, ChangeAttributes::action(ChangeAction::Put))?;
    }
    unit.emit(StoreEvent::Change(ChangeEvent::new(
        path,
        origin,
        previous.as_ref(),
        Some(&doc),
    )));
    Ok(previous)
}

/// Remove a document and unregister it from its ancestors. Deleting an
/// absent document succeeds. Returns the previous document.
pub fn delete(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    origin: Origin,
) -> StoreResult<Option<DocumentNode>> {
    ensure_document(path)?;
    let existing = unit.node(path)?;
    if existing.is_some() {
        unit.delete_node(path);
        remove_from_parent(unit, path, Namespace::Body)?;
    }
    let previous = document(existing);

    if origin == Origin::Local {
        record_change(unit, path, ChangeAttributes::action(ChangeAction::Delete))?;
    }
    unit.emit(StoreEvent::Change(ChangeEvent::new(
        path,
        origin,
        previous.as_ref(),
        None,
    )));
    Ok(previous)
}

pub fn get(engine: &dyn KvEngine, path: &NodePath) -> StoreResult<Option<Node>> {
    load_node(engine, path)
}

/// Names listed by a directory in either namespace, sorted.
pub fn list(engine: &dyn KvEngine, path: &NodePath) -> StoreResult<Vec<String>> {
    if !path.is_dir() {
        return Err(StoreError::NotADirectory(path.to_string()));
    }
    Ok(load_node(engine, path)?
        .and_then(Node::into_directory)
        .map(|dir| dir.children())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::changes_below;
    use replica_kv::MemoryEngine;

    fn path(p: &str) -> NodePath {
        NodePath::new(p).unwrap()
    }

    fn put_doc(engine: &MemoryEngine, p: &str, body: &str, origin: Origin) -> Vec<StoreEvent> {
        let mut unit = UnitOfWork::begin(engine);
        put(&mut unit, &path(p), body.into(), "text/plain", origin).unwrap();
        unit.commit().unwrap()
    }

    fn delete_doc(engine: &MemoryEngine, p: &str, origin: Origin) -> Vec<StoreEvent> {
        let mut unit = UnitOfWork::begin(engine);
        delete(&mut unit, &path(p), origin).unwrap();
        unit.commit().unwrap()
    }

    #[test]
    fn put_then_get() {
        let engine = MemoryEngine::new("nodes");
        put_doc(&engine, "a/b/c", "hello", Origin::Local);

        let doc = get(&engine, &path("a/b/c")).unwrap().unwrap();
        let doc = doc.as_document().unwrap();
        assert_eq!(doc.body, Some(Body::from("hello")));
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(list(&engine, &path("a/")).unwrap(), vec!["b/"]);
    }

    #[test]
    fn put_keeps_revision() {
        let engine = MemoryEngine::new("nodes");
        let mut unit = UnitOfWork::begin(&engine);
        unit.put_node(
            &path("x"),
            &Node::Document(DocumentNode {
                revision: Some("r1".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        unit.commit().unwrap();

        put_doc(&engine, "x", "v", Origin::Local);
        let node = get(&engine, &path("x")).unwrap().unwrap();
        assert_eq!(node.revision(), Some("r1"));
    }

    #[test]
    fn directory_paths_are_rejected_before_any_write() {
        let engine = MemoryEngine::new("nodes");
        let mut unit = UnitOfWork::begin(&engine);
        let err = put(&mut unit, &path("a/"), "x".into(), "text/plain", Origin::Local)
            .unwrap_err();
        assert!(matches!(err, StoreError::DirectoryPath(_)));
        assert!(matches!(
            delete(&mut unit, &path("a/"), Origin::Local),
            Err(StoreError::DirectoryPath(_))
        ));
        assert_eq!(unit.write_count(), 0);
    }

    #[test]
    fn local_writes_record_changes() {
        let engine = MemoryEngine::new("nodes");
        put_doc(&engine, "a", "1", Origin::Local);
        assert_eq!(
            changes_below(&engine, "a").unwrap()[0].action,
            Some(ChangeAction::Put)
        );
        delete_doc(&engine, "a", Origin::Local);
        assert_eq!(
            changes_below(&engine, "a").unwrap()[0].action,
            Some(ChangeAction::Delete)
        );
    }

    #[test]
    fn incoming_writes_record_nothing() {
        let engine = MemoryEngine::new("nodes");
        let events = put_doc(&engine, "a", "1", Origin::Remote);
        assert!(changes_below(&engine, "").unwrap().is_empty());
        assert_eq!(events[0].as_change().unwrap().origin, Origin::Remote);
    }

    #[test]
    fn events_carry_old_and_new_values() {
        let engine = MemoryEngine::new("nodes");
        put_doc(&engine, "a", "1", Origin::Local);
        let events = put_doc(&engine, "a", "2", Origin::Local);
        let change = events[0].as_change().unwrap();
        assert_eq!(change.old_value, Some(Body::from("1")));
        assert_eq!(change.new_value, Some(Body::from("2")));

        let events = delete_doc(&engine, "a", Origin::Local);
        let change = events[0].as_change().unwrap();
        assert_eq!(change.old_value, Some(Body::from("2")));
        assert!(change.new_value.is_none());
    }

    #[test]
    fn deleting_last_child_prunes_directories() {
        let engine = MemoryEngine::new("nodes");
        put_doc(&engine, "a/b/c", "1", Origin::Local);
        delete_doc(&engine, "a/b/c", Origin::Local);

        assert!(get(&engine, &path("a/b/c")).unwrap().is_none());
        assert!(get(&engine, &path("a/b/")).unwrap().is_none());
        assert!(get(&engine, &path("a/")).unwrap().is_none());
        assert!(list(&engine, &path("/")).unwrap().is_empty());
    }

    #[test]
    fn deleting_absent_document_succeeds() {
        let engine = MemoryEngine::new("nodes");
        let events = delete_doc(&engine, "ghost", Origin::Remote);
        assert_eq!(events.len(), 1);
        assert!(events[0].as_change().unwrap().old_value.is_none());
    }

    #[test]
    fn list_requires_directory_path() {
        let engine = MemoryEngine::new("nodes");
        assert!(matches!(
            list(&engine, &path("a")),
            Err(StoreError::NotADirectory(_))
        ));
        assert!(list(&engine, &path("missing/")).unwrap().is_empty());
    }
}
