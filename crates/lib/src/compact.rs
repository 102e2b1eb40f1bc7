//! Log compaction: reducing a mutation log to a minimal diff.
//!
//! [`compact`] folds an ordered sequence of [`ChangeRecord`]s into a
//! [`ChangeSet`]: a map from [`PathKey`] to terminal [`Op`], holding the
//! effective final state of every touched path. The result never contains
//! two entries where one path is an ancestor of the other — a broader
//! operation always subsumes the narrower ones, so a backing store can
//! apply the entries in any order.
//!
//! Subsumption rules, applied in sequence order:
//!
//! - A delete drops every pending entry at its path or below, then lands as
//!   a `Delete` entry — unless an ancestor entry already covers it (a
//!   pending ancestor replacement absorbs the deletion into its snapshot; a
//!   pending ancestor delete makes it redundant).
//! - A write drops every pending entry strictly below its path, then lands
//!   as a `Set` entry — unless an ancestor `Set` is pending, in which case
//!   the value is grafted into that snapshot instead of becoming a second,
//!   overlapping entry. A write below a pending ancestor `Delete` turns the
//!   delete into a rebuilt replacement (the subtree was dropped and then
//!   repopulated).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::path::{PathKey, Segment};
use crate::record::{ChangeKind, ChangeRecord};
use crate::value::{Map, Value};

/// The terminal operation for one path in a compacted diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Upsert this value at the path.
    Set(Value),
    /// Remove the field or subtree at the path.
    Delete,
}

impl Op {
    /// Returns the value, if this is a `Set`
    pub fn as_set(&self) -> Option<&Value> {
        match self {
            Op::Set(value) => Some(value),
            Op::Delete => None,
        }
    }

    /// Returns true if this is a `Delete`
    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete)
    }
}

/// A compacted diff: non-overlapping terminal operations keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    entries: BTreeMap<PathKey, Op>,
}

impl ChangeSet {
    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing changed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets the operation at a path
    pub fn get(&self, path: &PathKey) -> Option<&Op> {
        self.entries.get(path)
    }

    /// Gets the operation at a dotted path string
    pub fn get_path(&self, path: impl AsRef<str>) -> Option<&Op> {
        self.entries.get(&PathKey::parse(path.as_ref()))
    }

    /// Returns true if any entry exists at the path
    pub fn contains(&self, path: &PathKey) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterates entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &Op)> {
        self.entries.iter()
    }

    /// Splits into upserts and removals keyed by dotted path strings, the
    /// shape a document-database update expects.
    pub fn into_document_ops(self) -> DocumentOps {
        let mut ops = DocumentOps::default();
        for (path, op) in self.entries {
            match op {
                Op::Set(value) => {
                    ops.upserts.insert(path.to_string(), value);
                }
                Op::Delete => {
                    ops.removes.insert(path.to_string());
                }
            }
        }
        ops
    }
}

impl IntoIterator for ChangeSet {
    type Item = (PathKey, Op);
    type IntoIter = std::collections::btree_map::IntoIter<PathKey, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A compacted diff rendered for a document-database update: dotted-path
/// upserts and dotted-path removals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentOps {
    /// Field path → value to upsert.
    pub upserts: BTreeMap<String, Value>,
    /// Field paths to remove.
    pub removes: BTreeSet<String>,
}

/// Compacts a log (already in sequence order) into a minimal diff.
pub fn compact(records: &[ChangeRecord]) -> ChangeSet {
    let mut entries: BTreeMap<PathKey, Op> = BTreeMap::new();
    for record in records {
        trace!(sequence = record.sequence, path = %record.path, kind = ?record.kind, "folding record");
        match record.kind {
            ChangeKind::Delete => apply_delete(&mut entries, &record.path),
            ChangeKind::Set => {
                let value = record.value.clone().unwrap_or(Value::Null);
                apply_set(&mut entries, &record.path, value);
            }
        }
    }
    ChangeSet { entries }
}

fn apply_delete(entries: &mut BTreeMap<PathKey, Op>, path: &PathKey) {
    if let Some(ancestor) = find_ancestor(entries, path) {
        // No entry at or below `path` can exist alongside an ancestor entry.
        match entries.get_mut(&ancestor) {
            Some(Op::Set(cached)) => {
                // The pending replacement absorbs the deletion.
                if let Some(rel) = path.relative_to(&ancestor) {
                    remove_in_value(cached, rel.segments());
                }
            }
            // The broader delete already covers this one.
            Some(Op::Delete) | None => {}
        }
        return;
    }

    remove_subtree(entries, path);
    entries.insert(path.clone(), Op::Delete);
}

fn apply_set(entries: &mut BTreeMap<PathKey, Op>, path: &PathKey, value: Value) {
    if let Some(ancestor) = find_ancestor(entries, path) {
        let Some(rel) = path.relative_to(&ancestor) else {
            return;
        };
        if let Some(op) = entries.get_mut(&ancestor) {
            match op {
                Op::Set(cached) => {
                    // Honor the later descendant write by updating the
                    // pending replacement snapshot.
                    graft_in_value(cached, rel.segments(), value);
                }
                Op::Delete => {
                    // The subtree was dropped and then repopulated; rebuild
                    // the replacement from the writes underneath.
                    let mut rebuilt = Value::Map(Map::new());
                    graft_in_value(&mut rebuilt, rel.segments(), value);
                    *op = Op::Set(rebuilt);
                }
            }
        }
        return;
    }

    remove_subtree(entries, path);
    entries.insert(path.clone(), Op::Set(value));
}

/// Removes every entry at `path` or below. Descendants are a contiguous key
/// range because path ordering is lexicographic over segments.
fn remove_subtree(entries: &mut BTreeMap<PathKey, Op>, path: &PathKey) {
    let doomed: Vec<PathKey> = entries
        .range(path.clone()..)
        .take_while(|(key, _)| key.starts_with(path))
        .map(|(key, _)| key.clone())
        .collect();
    for key in doomed {
        entries.remove(&key);
    }
}

/// Finds the nearest strict ancestor of `path` with a pending entry. At most
/// one can exist, since entries never overlap.
fn find_ancestor(entries: &BTreeMap<PathKey, Op>, path: &PathKey) -> Option<PathKey> {
    let mut current = path.parent();
    while let Some(candidate) = current {
        if entries.contains_key(&candidate) {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Writes `value` at `rel` inside a cached snapshot, creating missing
/// mapping keys as empty maps. Unreachable sequence indices and kind
/// mismatches are ignored: records replay successful live mutations, so
/// these cases cannot arise from a well-formed log.
fn graft_in_value(target: &mut Value, rel: &[Segment], value: Value) {
    let Some((first, rest)) = rel.split_first() else {
        *target = value;
        return;
    };
    match (target, first) {
        (Value::Map(map), Segment::Key(key)) => {
            if rest.is_empty() {
                map.set(key.clone(), value);
            } else {
                graft_in_value(map.entry_or_insert_map(key.clone()), rest, value);
            }
        }
        (Value::List(list), Segment::Index(index)) => {
            if rest.is_empty() {
                // An index one past the end is an append: a later push can
                // land on a snapshot shortened by an earlier shifting op.
                if *index == list.len() {
                    list.push(value);
                } else {
                    let _ = list.set(*index, value);
                }
            } else if let Some(child) = list.get_mut(*index) {
                graft_in_value(child, rest, value);
            }
        }
        _ => {}
    }
}

/// Removes the value at `rel` inside a cached snapshot. Missing paths are
/// already absent; nothing to do.
fn remove_in_value(target: &mut Value, rel: &[Segment]) {
    let Some((first, rest)) = rel.split_first() else {
        return;
    };
    match (target, first) {
        (Value::Map(map), Segment::Key(key)) => {
            if rest.is_empty() {
                map.remove(key);
            } else if let Some(child) = map.get_mut(key) {
                remove_in_value(child, rest);
            }
        }
        (Value::List(list), Segment::Index(index)) => {
            if rest.is_empty() {
                let _ = list.remove(*index);
            } else if let Some(child) = list.get_mut(*index) {
                remove_in_value(child, rest);
            }
        }
        _ => {}
    }
}
