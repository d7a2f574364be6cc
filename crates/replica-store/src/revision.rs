//! Remote revision tokens, tracked independently of document content.

use replica_kv::KvEngine;
use replica_types::{DirectoryNode, DocumentNode, Namespace, Node, NodePath};

use crate::directory::{add_to_parent, remove_from_parent};
use crate::error::StoreResult;
use crate::unit::{load_node, UnitOfWork};

/// Attach a revision to each path, creating placeholder nodes where nothing
/// is stored yet and registering each path with its ancestors under the
/// `cached` namespace.
pub fn set_revisions(unit: &mut UnitOfWork<'_>, pairs: &[(NodePath, String)]) -> StoreResult<()> {
    for (path, revision) in pairs {
        let mut node = unit.node(path)?.unwrap_or_else(|| placeholder(path));
        node.set_revision(Some(revision.clone()));
        unit.put_node(path, &node)?;
        add_to_parent(unit, path, Namespace::Cached)?;
    }
    Ok(())
}

/// Drop the revision of each path and unregister it from its parent's
/// `cached` namespace. Nodes left with nothing but the revision are
/// deleted.
///
/// A directory that still has `cached` children stays registered: its
/// parent keeps listing it for as long as anything below it does.
pub fn forget_revisions(unit: &mut UnitOfWork<'_>, paths: &[NodePath]) -> StoreResult<()> {
    for path in paths {
        let mut still_cached = false;
        if let Some(mut node) = unit.node(path)? {
            node.set_revision(None);
            if is_bare(&node) && !path.is_root() {
                unit.delete_node(path);
            } else {
                still_cached = matches!(&node, Node::Directory(dir) if !dir.cached.is_empty());
                unit.put_node(path, &node)?;
            }
        }
        if !still_cached {
            remove_from_parent(unit, path, Namespace::Cached)?;
        }
    }
    Ok(())
}

pub fn get_revision(engine: &dyn KvEngine, path: &NodePath) -> StoreResult<Option<String>> {
    Ok(load_node(engine, path)?.and_then(|node| node.revision().map(str::to_string)))
}

fn placeholder(path: &NodePath) -> Node {
    if path.is_dir() {
        Node::Directory(DirectoryNode::default())
    } else {
        Node::Document(DocumentNode::default())
    }
}

fn is_bare(node: &Node) -> bool {
    match node {
        Node::Document(doc) => doc.is_placeholder(),
        Node::Directory(dir) => dir.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_kv::MemoryEngine;

    fn path(p: &str) -> NodePath {
        NodePath::new(p).unwrap()
    }

    fn set(engine: &MemoryEngine, pairs: &[(&str, &str)]) {
        let pairs: Vec<_> = pairs
            .iter()
            .map(|(p, r)| (path(p), r.to_string()))
            .collect();
        let mut unit = UnitOfWork::begin(engine);
        set_revisions(&mut unit, &pairs).unwrap();
        unit.commit().unwrap();
    }

    fn forget(engine: &MemoryEngine, paths: &[&str]) {
        let paths: Vec<_> = paths.iter().map(|p| path(p)).collect();
        let mut unit = UnitOfWork::begin(engine);
        forget_revisions(&mut unit, &paths).unwrap();
        unit.commit().unwrap();
    }

    fn cached(engine: &MemoryEngine, p: &str) -> Vec<String> {
        load_node(engine, &path(p))
            .unwrap()
            .and_then(Node::into_directory)
            .map(|d| d.cached.into_iter().collect())
            .unwrap_or_default()
    }

    #[test]
    fn revision_without_body() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("x", "r1")]);
        assert_eq!(get_revision(&engine, &path("x")).unwrap().as_deref(), Some("r1"));

        let node = load_node(&engine, &path("x")).unwrap().unwrap();
        assert!(node.as_document().unwrap().body.is_none());
    }

    #[test]
    fn missing_node_has_no_revision() {
        let engine = MemoryEngine::new("rev");
        assert!(get_revision(&engine, &path("nope")).unwrap().is_none());
    }

    #[test]
    fn batch_registers_under_cached() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("d/a", "1"), ("d/b", "2"), ("e/", "3")]);

        assert_eq!(cached(&engine, "d/"), vec!["a", "b"]);
        assert_eq!(cached(&engine, "/"), vec!["d/", "e/"]);
        assert_eq!(get_revision(&engine, &path("e/")).unwrap().as_deref(), Some("3"));
        let d = load_node(&engine, &path("d/")).unwrap().unwrap();
        assert!(d.as_directory().unwrap().body.is_empty());
    }

    #[test]
    fn resetting_revision_overwrites() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("x", "r1")]);
        set(&engine, &[("x", "r2")]);
        assert_eq!(get_revision(&engine, &path("x")).unwrap().as_deref(), Some("r2"));
    }

    #[test]
    fn forgetting_placeholder_removes_it() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("d/a", "1")]);
        forget(&engine, &["d/a"]);

        assert!(load_node(&engine, &path("d/a")).unwrap().is_none());
        assert!(load_node(&engine, &path("d/")).unwrap().is_none());
        assert!(cached(&engine, "/").is_empty());
    }

    #[test]
    fn forgetting_document_keeps_its_body() {
        let engine = MemoryEngine::new("rev");
        let mut unit = UnitOfWork::begin(&engine);
        crate::nodes::put(
            &mut unit,
            &path("d/a"),
            "body".into(),
            "text/plain",
            crate::event::Origin::Remote,
        )
        .unwrap();
        unit.commit().unwrap();
        set(&engine, &[("d/a", "1")]);
        forget(&engine, &["d/a"]);

        let node = load_node(&engine, &path("d/a")).unwrap().unwrap();
        assert!(node.revision().is_none());
        assert!(node.as_document().unwrap().body.is_some());
        let d = load_node(&engine, &path("d/")).unwrap().unwrap();
        let d = d.as_directory().unwrap();
        assert!(d.body.contains("a"));
        assert!(d.cached.is_empty());
    }

    #[test]
    fn forgetting_directory_with_children_keeps_it_listed() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("x/", "rx"), ("x/y", "r")]);
        forget(&engine, &["x/"]);

        let x = load_node(&engine, &path("x/")).unwrap().unwrap();
        assert!(x.revision().is_none());
        assert_eq!(cached(&engine, "x/"), vec!["y"]);
        assert_eq!(cached(&engine, "/"), vec!["x/"]);
    }

    #[test]
    fn forgetting_directory_without_own_revision_keeps_it_listed() {
        let engine = MemoryEngine::new("rev");
        set(&engine, &[("x/y", "r")]);
        forget(&engine, &["x/"]);

        assert!(load_node(&engine, &path("x/")).unwrap().is_some());
        assert_eq!(cached(&engine, "/"), vec!["x/"]);
    }
}
