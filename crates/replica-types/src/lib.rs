//! Foundation types for the Replica store.
//!
//! This crate provides the record types shared by every other Replica crate:
//! the keys records are stored under, the shapes of the records themselves,
//! and the pending-change bookkeeping used by the synchronization loop.
//!
//! # Key Types
//!
//! - [`NodePath`] — Validated slash-separated key; a trailing slash marks a directory
//! - [`Node`] — A stored record: [`DocumentNode`] or [`DirectoryNode`]
//! - [`Body`] — Opaque document payload (text or bytes)
//! - [`Namespace`] — Which presence set of a directory an operation touches
//! - [`Change`] — A pending local mutation awaiting propagation
//! - [`ConflictAttributes`] — Divergent local/remote actions plus a resolution

pub mod change;
pub mod error;
pub mod node;
pub mod path;

pub use change::{Change, ChangeAction, ChangeAttributes, ConflictAttributes, Resolution};
pub use error::TypeError;
pub use node::{Body, DirectoryNode, DocumentNode, Namespace, Node, DIRECTORY_CONTENT_TYPE};
pub use path::{Ancestors, NodePath};
