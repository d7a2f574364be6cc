//! Transactional key-value storage for the Replica store.
//!
//! Records live in two named containers, `nodes` and `changes`, both keyed by
//! path strings and kept in byte-wise key order. Every mutation goes through a
//! [`Transaction`]: reads are stamped with the version they observed, writes
//! are buffered, and [`KvEngine::commit`] applies the whole batch atomically
//! or rejects it with [`KvError::Conflict`] if any stamped key moved.
//!
//! # Engines
//!
//! All backends implement the [`KvEngine`] trait:
//!
//! - [`MemoryEngine`] -- `BTreeMap`-based engine for tests and as the fallback
//!   when persistent storage is unavailable
//! - [`FileEngine`] -- durable engine: in-memory state rebuilt from a
//!   CRC-framed write-ahead log of commit records, under a versioned manifest
//!
//! # Design Rules
//!
//! 1. A commit is all-or-nothing: one WAL record, applied under one lock.
//! 2. A failed commit leaves no observable write.
//! 3. Reads outside a transaction see only committed state.
//! 4. Versions only grow; an absent key has version 0.
//! 5. The engine never interprets values -- it is a pure key-value store.

pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod state;
pub mod traits;
pub mod txn;
pub mod wal;

pub use error::{KvError, KvResult};
pub use file::FileEngine;
pub use memory::MemoryEngine;
pub use schema::{Manifest, SCHEMA_VERSION};
pub use traits::{Container, KvEngine, ReadStamp, Version, Versioned, WriteBatch, WriteOp};
pub use txn::{decode_value, encode_value, Transaction};
pub use wal::{CommitRecord, SyncMode, WriteAheadLog};
