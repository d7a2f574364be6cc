//! Pending-change records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::NodePath;

/// The kind of local mutation awaiting propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put => f.write_str("PUT"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

impl FromStr for ChangeAction {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUT" | "put" => Ok(Self::Put),
            "DELETE" | "delete" => Ok(Self::Delete),
            other => Err(TypeError::InvalidAction(other.to_string())),
        }
    }
}

/// Which side of a conflict wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Local,
    Remote,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for Resolution {
    type Err = TypeError;

    /// Only the exact values `"local"` and `"remote"` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(TypeError::InvalidResolution(other.to_string())),
        }
    }
}

/// Description of a divergence between local and remote history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictAttributes {
    pub local_action: Option<ChangeAction>,
    pub remote_action: Option<ChangeAction>,
    pub local_revision: Option<String>,
    pub remote_revision: Option<String>,
    pub resolution: Option<Resolution>,
}

/// A partial update merged into a [`Change`].
///
/// Fields left as `None` leave the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAttributes {
    pub action: Option<ChangeAction>,
    pub conflict: Option<ConflictAttributes>,
}

impl ChangeAttributes {
    pub fn action(action: ChangeAction) -> Self {
        Self {
            action: Some(action),
            conflict: None,
        }
    }

    pub fn conflict(conflict: ConflictAttributes) -> Self {
        Self {
            action: None,
            conflict: Some(conflict),
        }
    }
}

/// A pending local mutation not yet acknowledged by the synchronization loop.
///
/// `action` is unset only when the record was created to carry a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: NodePath,
    pub action: Option<ChangeAction>,
    pub conflict: Option<ConflictAttributes>,
}

impl Change {
    pub fn new(path: NodePath) -> Self {
        Self {
            path,
            action: None,
            conflict: None,
        }
    }

    /// Overwrite every field that `attributes` sets; keep the rest.
    pub fn merge(&mut self, attributes: ChangeAttributes) {
        if let Some(action) = attributes.action {
            self.action = Some(action);
        }
        if let Some(conflict) = attributes.conflict {
            self.conflict = Some(conflict);
        }
    }

    pub fn is_conflicted(&self) -> bool {
        self.conflict.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> NodePath {
        NodePath::new(s).unwrap()
    }

    #[test]
    fn merge_overwrites_same_field() {
        let mut change = Change::new(path("a/x"));
        change.merge(ChangeAttributes::action(ChangeAction::Put));
        change.merge(ChangeAttributes::action(ChangeAction::Delete));
        assert_eq!(change.action, Some(ChangeAction::Delete));
        assert!(change.conflict.is_none());
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut change = Change::new(path("a/x"));
        change.merge(ChangeAttributes::action(ChangeAction::Put));
        change.merge(ChangeAttributes::conflict(ConflictAttributes {
            remote_action: Some(ChangeAction::Delete),
            ..Default::default()
        }));
        assert_eq!(change.action, Some(ChangeAction::Put));
        assert!(change.is_conflicted());
    }

    #[test]
    fn resolution_parsing_is_strict() {
        assert_eq!("local".parse::<Resolution>(), Ok(Resolution::Local));
        assert_eq!("remote".parse::<Resolution>(), Ok(Resolution::Remote));
        assert_eq!(
            "bogus".parse::<Resolution>(),
            Err(TypeError::InvalidResolution("bogus".into()))
        );
        assert!("Local".parse::<Resolution>().is_err());
    }

    #[test]
    fn action_serializes_uppercase() {
        let json = serde_json::to_string(&ChangeAction::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
        assert_eq!("put".parse::<ChangeAction>(), Ok(ChangeAction::Put));
    }
}
