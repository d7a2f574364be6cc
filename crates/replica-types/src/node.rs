//! Stored node records.
//!
//! A node is either a document (leaf) or a directory (aggregate). Directory
//! nodes are never written by callers directly; they are derived from the
//! documents below them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Content type reported for every directory node.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/json";

/// Opaque document payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

/// A leaf record.
///
/// A node created only to carry a revision (see `setRevision`) has neither a
/// body nor a content type yet; such a node is a *placeholder*.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub content_type: Option<String>,
    pub body: Option<Body>,
    pub revision: Option<String>,
}

impl DocumentNode {
    pub fn is_placeholder(&self) -> bool {
        self.body.is_none() && self.content_type.is_none()
    }
}

/// The two independent presence tracks of a directory node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Children known to exist locally.
    Body,
    /// Children known from the last synchronized listing.
    Cached,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body => f.write_str("body"),
            Self::Cached => f.write_str("cached"),
        }
    }
}

/// An aggregate record listing the immediate children of a directory.
///
/// Child names of sub-directories carry their trailing slash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub body: BTreeSet<String>,
    pub cached: BTreeSet<String>,
    pub revision: Option<String>,
}

impl DirectoryNode {
    pub fn members(&self, ns: Namespace) -> &BTreeSet<String> {
        match ns {
            Namespace::Body => &self.body,
            Namespace::Cached => &self.cached,
        }
    }

    pub fn members_mut(&mut self, ns: Namespace) -> &mut BTreeSet<String> {
        match ns {
            Namespace::Body => &mut self.body,
            Namespace::Cached => &mut self.cached,
        }
    }

    /// A directory is kept while either namespace lists a child.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.cached.is_empty()
    }

    /// Union of both namespaces, sorted.
    pub fn children(&self) -> Vec<String> {
        self.body.union(&self.cached).cloned().collect()
    }

    /// The directory listing as a JSON object of `name -> true`.
    pub fn listing(&self) -> serde_json::Value {
        let map = self
            .children()
            .into_iter()
            .map(|name| (name, serde_json::Value::Bool(true)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// A stored record at a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Document(DocumentNode),
    Directory(DirectoryNode),
}

impl Node {
    pub fn revision(&self) -> Option<&str> {
        match self {
            Self::Document(d) => d.revision.as_deref(),
            Self::Directory(d) => d.revision.as_deref(),
        }
    }

    pub fn set_revision(&mut self, revision: Option<String>) {
        match self {
            Self::Document(d) => d.revision = revision,
            Self::Directory(d) => d.revision = revision,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Document(d) => d.content_type.as_deref(),
            Self::Directory(_) => Some(DIRECTORY_CONTENT_TYPE),
        }
    }

    pub fn as_document(&self) -> Option<&DocumentNode> {
        match self {
            Self::Document(d) => Some(d),
            Self::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            Self::Directory(d) => Some(d),
            Self::Document(_) => None,
        }
    }

    pub fn into_directory(self) -> Option<DirectoryNode> {
        match self {
            Self::Directory(d) => Some(d),
            Self::Document(_) => None,
        }
    }
}
