//! Local replica store for a path-addressed document synchronization client.
//!
//! Documents live under slash-separated paths. Synthetic directory nodes make
//! folders listable over the flat key space, remote revision tokens are
//! tracked per path, and local mutations are kept as pending changes until
//! the synchronization loop acknowledges them.
//!
//! # Key Types
//!
//! - [`ReplicaStore`] -- Handle to an open store; every operation is `async`
//! - [`StoreConfig`] -- Engine selection, location, deadlines (TOML-loadable)
//! - [`StoreEvent`] -- Change and conflict notifications
//! - [`EventFilter`] -- Subscription filter by kind and path prefix
//! - [`ConflictResolver`] -- Records the resolution of a published conflict
//!
//! # Design Rules
//!
//! 1. Every mutation is one unit of work: the node write, the ancestor
//!    directory updates and the pending change commit together or not at all.
//! 2. Events are published only after their unit of work commits.
//! 3. A directory exists while either its `body` or `cached` set is non-empty;
//!    the root is never removed.
//! 4. Units of work that touch the same directory are linearized by optimistic
//!    commit validation and retry.
//! 5. One live engine is shared per store per process.

pub mod changes;
pub mod config;
pub mod conflict;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod nodes;
pub mod notifier;
pub mod revision;
pub mod store;
pub mod unit;

pub use config::{EngineKind, StoreConfig};
pub use conflict::ConflictResolver;
pub use error::{StoreError, StoreResult};
pub use event::{ChangeEvent, ConflictEvent, EventKind, Origin, StoreEvent};
pub use notifier::{EventFilter, EventStream, InitialStream, Notifier};
pub use store::ReplicaStore;
pub use unit::UnitOfWork;
