//! Change records: the entries of the session's append-only mutation log.

use serde::{Deserialize, Serialize};

use crate::path::PathKey;
use crate::value::Value;

/// The kind of a recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A value was written at the path.
    Set,
    /// The value at the path was removed.
    Delete,
}

/// One recorded mutation.
///
/// Records are created by the session when a tracked operation mutates the
/// snapshot, and are never modified afterwards. For `Set` records, `value`
/// holds a deep snapshot taken at record time — later mutations of the live
/// structure do not reach back into history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Log position. Strictly increasing within a session, never reused.
    pub sequence: u64,
    /// Location of the mutation, from the session root.
    pub path: PathKey,
    /// What happened at the path.
    pub kind: ChangeKind,
    /// The written value; present iff `kind` is [`ChangeKind::Set`].
    pub value: Option<Value>,
}

impl ChangeRecord {
    /// Creates a `Set` record.
    pub fn set(sequence: u64, path: PathKey, value: Value) -> Self {
        Self {
            sequence,
            path,
            kind: ChangeKind::Set,
            value: Some(value),
        }
    }

    /// Creates a `Delete` record.
    pub fn delete(sequence: u64, path: PathKey) -> Self {
        Self {
            sequence,
            path,
            kind: ChangeKind::Delete,
            value: None,
        }
    }

    /// Returns true if this is a `Set` record
    pub fn is_set(&self) -> bool {
        self.kind == ChangeKind::Set
    }

    /// Returns true if this is a `Delete` record
    pub fn is_delete(&self) -> bool {
        self.kind == ChangeKind::Delete
    }
}

/// A mutation staged by an operation, before the session assigns it a log
/// position. Internal hand-off between node operations and the session log.
#[derive(Debug)]
pub(crate) struct PendingRecord {
    pub path: PathKey,
    pub kind: ChangeKind,
    pub value: Option<Value>,
}

impl PendingRecord {
    pub(crate) fn set(path: PathKey, value: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Set,
            value: Some(value),
        }
    }

    pub(crate) fn delete(path: PathKey) -> Self {
        Self {
            path,
            kind: ChangeKind::Delete,
            value: None,
        }
    }

    pub(crate) fn into_record(self, sequence: u64) -> ChangeRecord {
        ChangeRecord {
            sequence,
            path: self.path,
            kind: self.kind,
            value: self.value,
        }
    }
}
