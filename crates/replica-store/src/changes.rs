//! Pending-change log.

use replica_kv::KvEngine;
use replica_types::{Change, ChangeAttributes, NodePath};

use crate::error::StoreResult;
use crate::unit::{scan_changes, UnitOfWork};

/// Merge `attributes` into the change at `path`, creating it if needed.
pub fn record_change(
    unit: &mut UnitOfWork<'_>,
    path: &NodePath,
    attributes: ChangeAttributes,
) -> StoreResult<Change> {
    let mut change = unit
        .change(path)?
        .unwrap_or_else(|| Change::new(path.clone()));
    change.merge(attributes);
    unit.put_change(&change)?;
    Ok(change)
}

/// Delete the change at `path`. Returns whether one existed.
pub fn clear_change(unit: &mut UnitOfWork<'_>, path: &NodePath) -> StoreResult<bool> {
    if unit.change(path)?.is_none() {
        return Ok(false);
    }
    unit.delete_change(path);
    Ok(true)
}

/// Every change whose key starts with `prefix`, in ascending key order.
///
/// This is a plain string-prefix match: `"a/"` matches `"a/x"` and
/// `"a/y/z"`, `"a"` also matches `"ab"`.
pub fn changes_below(engine: &dyn KvEngine, prefix: &str) -> StoreResult<Vec<Change>> {
    scan_changes(engine, prefix)
}
