use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SEPARATOR: char = '/';
const ROOT: &str = "/";

/// A validated, slash-separated record key.
///
/// A trailing slash marks a directory path (`"a/b/"`), anything else is a
/// document path (`"a/b/c"`). The root directory is `"/"`. A leading slash is
/// optional and significant: `"a/b"` and `"/a/b"` are different keys, both of
/// which hang off the root.
///
/// Keys order byte-wise on their UTF-8 encoding. Every key sharing a prefix
/// is contiguous under that order, which is what makes prefix range scans
/// over a sorted container exact.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Validate and wrap a path.
    ///
    /// Rejects the empty string, empty segments (`"a//b"`) and control
    /// characters.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        validate(&path)?;
        Ok(Self(path))
    }

    /// The root directory `"/"`.
    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    /// Returns `true` for directory-shaped paths (trailing slash).
    pub fn is_dir(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    pub fn is_document(&self) -> bool {
        !self.is_dir()
    }

    /// The immediate parent directory, or `None` for the root.
    ///
    /// The parent of a top-level entry (`"a"`, `"a/"`, `"/a"`) is the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.trimmed();
        match trimmed.rfind(SEPARATOR) {
            Some(idx) => Some(Self(trimmed[..=idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// The last segment, keeping the trailing slash of a directory.
    ///
    /// This is the name under which the path is listed in its parent
    /// directory: `"a/b/c"` → `"c"`, `"a/b/"` → `"b/"`. Empty for the root.
    pub fn basename(&self) -> &str {
        if self.is_root() {
            return "";
        }
        let start = self
            .trimmed()
            .rfind(SEPARATOR)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        &self.0[start..]
    }

    /// Iterate the ancestor directories from the immediate parent up to and
    /// including the root.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// Number of segments (`"a/b/c"` → 3, `"/"` → 0).
    pub fn depth(&self) -> usize {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty()).count()
    }

    /// Returns `true` if this key starts with `prefix` (plain string prefix,
    /// not segment-aware).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    fn trimmed(&self) -> &str {
        self.0.strip_suffix(SEPARATOR).unwrap_or(&self.0)
    }
}

fn validate(path: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if path.contains("//") {
        return Err(invalid("path must not contain empty segments"));
    }
    if path.chars().any(char::is_control) {
        return Err(invalid("path must not contain control characters"));
    }
    Ok(())
}

/// Iterator over the ancestor directories of a [`NodePath`].
#[derive(Clone, Debug)]
pub struct Ancestors {
    next: Option<NodePath>,
}

impl Iterator for Ancestors {
    type Item = NodePath;

    fn next(&mut self) -> Option<NodePath> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({:?})", self.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodePath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodePath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> NodePath {
        NodePath::new(s).unwrap()
    }

    #[test]
    fn directory_and_document_shapes() {
        assert!(p("a/b/").is_dir());
        assert!(p("/").is_dir());
        assert!(p("a/b/c").is_document());
        assert!(p("/").is_root());
    }

    #[test]
    fn parent_of_nested_document() {
        assert_eq!(p("a/b/c").parent(), Some(p("a/b/")));
        assert_eq!(p("/a/b/c").parent(), Some(p("/a/b/")));
    }

    #[test]
    fn parent_of_top_level_is_root() {
        assert_eq!(p("a").parent(), Some(NodePath::root()));
        assert_eq!(p("a/").parent(), Some(NodePath::root()));
        assert_eq!(p("/a").parent(), Some(NodePath::root()));
        assert_eq!(NodePath::root().parent(), None);
    }

    #[test]
    fn basename_keeps_directory_slash() {
        assert_eq!(p("a/b/c").basename(), "c");
        assert_eq!(p("a/b/").basename(), "b/");
        assert_eq!(p("x").basename(), "x");
        assert_eq!(NodePath::root().basename(), "");
    }

    #[test]
    fn ancestors_walk_to_root() {
        let chain: Vec<String> = p("a/b/c").ancestors().map(String::from).collect();
        assert_eq!(chain, vec!["a/b/", "a/", "/"]);
    }

    #[test]
    fn rejects_invalid_paths() {
        assert!(matches!(NodePath::new(""), Err(TypeError::InvalidPath { .. })));
        assert!(NodePath::new("a//b").is_err());
        assert!(NodePath::new("a/\nb").is_err());
    }

    #[test]
    fn depth_counts_segments() {
        assert_eq!(NodePath::root().depth(), 0);
        assert_eq!(p("a/b/c").depth(), 3);
        assert_eq!(p("/a/b/").depth(), 2);
    }

    #[test]
    fn serde_rejects_invalid_path() {
        let ok: NodePath = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(ok, p("a/b"));
        assert!(serde_json::from_str::<NodePath>("\"a//b\"").is_err());
    }

    #[test]
    fn bincode_roundtrip() {
        let path = p("docs/notes/today.md");
        let bytes = bincode::serialize(&path).unwrap();
        let decoded: NodePath = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, path);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9._-]{1,8}"
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        (
            any::<bool>(),
            proptest::collection::vec(segment(), 1..6),
            any::<bool>(),
        )
            .prop_map(|(leading, segments, dir)| {
                let mut s = String::new();
                if leading {
                    s.push('/');
                }
                s.push_str(&segments.join("/"));
                if dir {
                    s.push('/');
                }
                s
            })
    }

    proptest! {
        #[test]
        fn ancestor_chain_is_bounded_and_ends_at_root(raw in path_strategy()) {
            let path = NodePath::new(raw).unwrap();
            let chain: Vec<NodePath> = path.ancestors().collect();
            prop_assert_eq!(chain.len(), path.depth());
            prop_assert!(chain.last().unwrap().is_root());
            prop_assert!(chain.iter().all(NodePath::is_dir));
        }

        #[test]
        fn parent_and_basename_rebuild_rooted_path(raw in path_strategy()) {
            let path = NodePath::new(format!("/{}", raw.trim_start_matches('/'))).unwrap();
            let parent = path.parent().unwrap();
            prop_assert_eq!(format!("{}{}", parent, path.basename()), path.as_str());
        }

        #[test]
        fn every_descendant_has_its_ancestor_as_prefix(raw in path_strategy()) {
            let path = NodePath::new(raw).unwrap();
            for ancestor in path.ancestors().filter(|a| !a.is_root()) {
                prop_assert!(path.has_prefix(ancestor.as_str()));
            }
        }
    }
}
