//! Directory index maintenance.
//!
//! Directory nodes are aggregates: a directory lists its immediate children
//! under two independent namespaces and exists only while either namespace
//! is non-empty. The root is exempt and is never deleted.
//!
//! Both walks run inside the caller's unit of work and visit at most one
//! directory per path segment.

use tracing::debug;

use replica_types::{Namespace, Node, NodePath};

use crate::error::StoreResult;
use crate::unit::UnitOfWork;

/// Register `path` in its parent under `ns`, creating ancestors as needed.
///
/// The walk stops at the first ancestor that already lists the child, since
/// every ancestor above it lists its own child too. Returns the number of
/// directory nodes written.
pub fn add_to_parent(unit: &mut UnitOfWork<'_>, path: &NodePath, ns: Namespace) -> StoreResult<usize> {
    let mut child = path.clone();
    let mut written = 0;
    while let Some(parent) = child.parent() {
        let mut dir = unit.directory(&parent)?.unwrap_or_default();
        if !dir.members_mut(ns).insert(child.basename().to_string()) {
            break;
        }
        unit.put_node(&parent, &Node::Directory(dir))?;
        written += 1;
        child = parent;
    }
    debug!(path = %path, %ns, written, "added to parent");
    Ok(written)
}

/// Remove `path` from its parent under `ns`, deleting directories that
/// become empty in both namespaces and stopping at the first one that does
/// not. Returns the number of directory nodes deleted.
pub fn remove_from_parent(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    ns: Namespace,
) -> StoreResult<usize> {
    let mut child = path.clone();
    let mut deleted = 0;
    while let Some(parent) = child.parent() {
        let Some(mut dir) = unit.directory(&parent)? else {
            break;
        };
        if !dir.members_mut(ns).remove(child.basename()) {
            break;
        }
        if dir.is_empty() && !parent.is_root() {
            unit.delete_node(&parent);
            deleted += 1;
            child = parent;
            continue;
        }
        unit.put_node(&parent, &Node::Directory(dir))?;
        break;
    }
    debug!(path = %path, %ns, deleted, "removed from parent");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::load_node;
    use replica_kv::MemoryEngine;
    use replica_types::DirectoryNode;

    fn path(p: &str) -> NodePath {
        NodePath::new(p).unwrap()
    }

    fn dir(engine: &MemoryEngine, p: &str) -> Option<DirectoryNode> {
        load_node(engine, &path(p))
            .unwrap()
            .and_then(Node::into_directory)
    }

    fn add(engine: &MemoryEngine, p: &str, ns: Namespace) -> usize {
        let mut unit = UnitOfWork::begin(engine);
        let n = add_to_parent(&mut unit, &path(p), ns).unwrap();
        unit.commit().unwrap();
        n
    }

    fn remove(engine: &MemoryEngine, p: &str, ns: Namespace) -> usize {
        let mut unit = UnitOfWork::begin(engine);
        let n = remove_from_parent(&mut unit, &path(p), ns).unwrap();
        unit.commit().unwrap();
        n
    }

    // -----------------------------------------------------------------------
    // add_to_parent
    // -----------------------------------------------------------------------

    #[test]
    fn creates_every_ancestor() {
        let engine = MemoryEngine::new("dir");
        assert_eq!(add(&engine, "a/b/c", Namespace::Body), 3);

        assert!(dir(&engine, "a/b/").unwrap().body.contains("c"));
        assert!(dir(&engine, "a/").unwrap().body.contains("b/"));
        assert!(dir(&engine, "/").unwrap().body.contains("a/"));
    }

    #[test]
    fn re_adding_writes_nothing() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/b/c", Namespace::Body);
        let before = dir(&engine, "a/b/").unwrap();
        assert_eq!(add(&engine, "a/b/c", Namespace::Body), 0);
        assert_eq!(dir(&engine, "a/b/").unwrap(), before);
    }

    #[test]
    fn sibling_stops_at_shared_ancestor() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/b/c", Namespace::Body);
        assert_eq!(add(&engine, "a/b/d", Namespace::Body), 1);
        let b = dir(&engine, "a/b/").unwrap();
        assert!(b.body.contains("c") && b.body.contains("d"));
    }

    #[test]
    fn leading_slash_paths_hang_off_root() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "/x/y", Namespace::Body);
        assert!(dir(&engine, "/x/").unwrap().body.contains("y"));
        assert!(dir(&engine, "/").unwrap().body.contains("x/"));
    }

    #[test]
    fn namespaces_are_independent() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/x", Namespace::Body);
        add(&engine, "a/x", Namespace::Cached);
        let a = dir(&engine, "a/").unwrap();
        assert!(a.body.contains("x"));
        assert!(a.cached.contains("x"));
    }

    // -----------------------------------------------------------------------
    // remove_from_parent
    // -----------------------------------------------------------------------

    #[test]
    fn removal_propagates_through_empty_ancestors() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/b/c", Namespace::Body);
        assert_eq!(remove(&engine, "a/b/c", Namespace::Body), 2);

        assert!(dir(&engine, "a/b/").is_none());
        assert!(dir(&engine, "a/").is_none());
        let root = dir(&engine, "/").unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn removal_stops_at_non_empty_ancestor() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/b/c", Namespace::Body);
        add(&engine, "a/d", Namespace::Body);
        assert_eq!(remove(&engine, "a/b/c", Namespace::Body), 1);

        assert!(dir(&engine, "a/b/").is_none());
        let a = dir(&engine, "a/").unwrap();
        assert!(!a.body.contains("b/"));
        assert!(a.body.contains("d"));
        assert!(dir(&engine, "/").unwrap().body.contains("a/"));
    }

    #[test]
    fn stale_cached_entry_keeps_directory() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/x", Namespace::Body);
        add(&engine, "a/y", Namespace::Cached);
        assert_eq!(remove(&engine, "a/x", Namespace::Body), 0);

        let a = dir(&engine, "a/").unwrap();
        assert!(a.body.is_empty());
        assert!(a.cached.contains("y"));
    }

    #[test]
    fn removing_from_one_namespace_leaves_the_other() {
        let engine = MemoryEngine::new("dir");
        add(&engine, "a/x", Namespace::Body);
        add(&engine, "a/x", Namespace::Cached);
        remove(&engine, "a/x", Namespace::Cached);
        let a = dir(&engine, "a/").unwrap();
        assert!(a.body.contains("x"));
        assert!(a.cached.is_empty());
    }

    #[test]
    fn removing_unknown_child_is_a_no_op() {
        let engine = MemoryEngine::new("dir");
        assert_eq!(remove(&engine, "nowhere/x", Namespace::Body), 0);
        assert!(dir(&engine, "nowhere/").is_none());
    }
}
