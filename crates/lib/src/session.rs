//! The tracking session: snapshot ownership and the mutation log.
//!
//! A [`TrackingSession`] owns the root mapping of named entries and an
//! append-only log of [`ChangeRecord`]s. Callers obtain path-scoped
//! [`TrackedNode`] views via [`get_data`](TrackingSession::get_data), mutate
//! through them, and finally call [`pack_cache`](TrackingSession::pack_cache)
//! to reduce the log into a minimal diff for a backing store.
//!
//! The session is a single-writer, single-threaded structure: interior
//! mutability through a `RefCell` instead of locking. Callers needing
//! concurrent access must serialize externally (one session per logical
//! transaction).

use std::cell::RefCell;

use tracing::{debug, trace};

use crate::compact::{self, ChangeSet};
use crate::errors::CacheError;
use crate::node::TrackedNode;
use crate::path::{PathKey, Segment};
use crate::record::{ChangeRecord, PendingRecord};
use crate::value::{Map, Value};
use crate::{Error, Result};

/// Session behavior options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Whether [`TrackingSession::pack_cache`] empties the log after packing.
    ///
    /// `true` (the default) gives incremental sync: each pack returns only
    /// what changed since the previous pack. `false` keeps the log, so
    /// repeated packs return the full diff since session creation.
    pub clear_after_pack: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clear_after_pack: true,
        }
    }
}

impl SessionConfig {
    /// Config that keeps the log across packs (repeated full-diff queries).
    pub fn preserve_log() -> Self {
        Self {
            clear_after_pack: false,
        }
    }
}

#[derive(Debug)]
struct Inner {
    root: Map,
    log: Vec<ChangeRecord>,
    next_sequence: u64,
    tracking: bool,
}

impl Inner {
    fn append(&mut self, pending: PendingRecord) {
        if !self.tracking {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!(sequence, path = %pending.path, kind = ?pending.kind, "recorded mutation");
        self.log.push(pending.into_record(sequence));
    }
}

/// A change-tracking session over one nested snapshot.
///
/// # Examples
///
/// ```
/// use deltacache::{Map, TrackingSession};
///
/// let session = TrackingSession::new(Map::from([("base", Map::from([("money", 100)]))]));
/// let base = session.get_data("base")?;
/// base.set("money", 200)?;
///
/// let diff = session.pack_cache();
/// assert_eq!(diff.len(), 1);
/// # Ok::<(), deltacache::Error>(())
/// ```
#[derive(Debug)]
pub struct TrackingSession {
    inner: RefCell<Inner>,
    config: SessionConfig,
}

impl TrackingSession {
    /// Creates a session owning `root`, with default configuration.
    pub fn new(root: impl Into<Map>) -> Self {
        Self::with_config(root, SessionConfig::default())
    }

    /// Creates a session owning `root` with the given configuration.
    pub fn with_config(root: impl Into<Map>, config: SessionConfig) -> Self {
        Self {
            inner: RefCell::new(Inner {
                root: root.into(),
                log: Vec::new(),
                next_sequence: 0,
                tracking: true,
            }),
            config,
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Returns a tracked view of the root entry named `key`.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if no such entry exists; `NotAContainer` if the entry is
    /// a scalar (use [`get_value`](Self::get_value) for those).
    pub fn get_data(&self, key: impl AsRef<str>) -> Result<TrackedNode<'_>> {
        let key = key.as_ref();
        let inner = self.inner.borrow();
        let value = inner.root.get(key).ok_or_else(|| CacheError::KeyNotFound {
            path: key.to_string(),
        })?;
        if !value.is_container() {
            return Err(CacheError::NotAContainer {
                path: key.to_string(),
            }
            .into());
        }
        Ok(TrackedNode::new(self, PathKey::root(key)))
    }

    /// Returns a clone of the root entry named `key` (any type, untracked).
    pub fn get_value(&self, key: impl AsRef<str>) -> Result<Value> {
        let key = key.as_ref();
        let inner = self.inner.borrow();
        inner
            .root
            .get(key)
            .cloned()
            .ok_or_else(|| {
                CacheError::KeyNotFound {
                    path: key.to_string(),
                }
                .into()
            })
    }

    /// Returns true if a root entry named `key` exists.
    pub fn contains_data(&self, key: impl AsRef<str>) -> bool {
        self.inner.borrow().root.contains_key(key)
    }

    /// Returns the names of all root entries.
    pub fn data_keys(&self) -> Vec<String> {
        self.inner.borrow().root.keys().cloned().collect()
    }

    /// Sets the root entry named `key`, recording the write. Returns the
    /// previous value, if any.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut inner = self.inner.borrow_mut();
        let previous = inner.root.set(key.clone(), value.clone());
        inner.append(PendingRecord::set(PathKey::root(key), value));
        previous
    }

    /// Removes the root entry named `key`, recording the deletion.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if no such entry exists.
    pub fn remove_data(&self, key: impl AsRef<str>) -> Result<Value> {
        let key = key.as_ref();
        let mut inner = self.inner.borrow_mut();
        let removed = inner.root.remove(key).ok_or_else(|| CacheError::KeyNotFound {
            path: key.to_string(),
        })?;
        inner.append(PendingRecord::delete(PathKey::root(key)));
        Ok(removed)
    }

    /// Sets a value at a dotted path, creating intermediate maps as needed.
    ///
    /// Missing mapping keys along the path are created as empty maps;
    /// sequence indices must already exist (holes cannot be created).
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if a scalar or wrong-kind container sits in the way,
    /// `IndexOutOfBounds` for an unreachable sequence index.
    pub fn set_path(&self, path: impl AsRef<str>, value: impl Into<Value>) -> Result<()> {
        let path = PathKey::parse(path.as_ref());
        let Some(last) = path.last().cloned() else {
            return Err(CacheError::KeyNotFound {
                path: path.to_string(),
            }
            .into());
        };
        let value = value.into();
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let parent = path.parent().unwrap_or_default();
        if parent.is_empty() {
            match &last {
                Segment::Key(key) => {
                    inner.root.set(key.clone(), value.clone());
                }
                Segment::Index(_) => {
                    return Err(CacheError::TypeMismatch {
                        path: path.to_string(),
                        expected: "key",
                        actual: "index",
                    }
                    .into());
                }
            }
        } else {
            let container = resolve_or_create(&mut inner.root, &parent, &path)?;
            match (container, &last) {
                (Value::Map(map), Segment::Key(key)) => {
                    map.set(key.clone(), value.clone());
                }
                (Value::List(list), Segment::Index(index)) => {
                    let len = list.len();
                    if list.set(*index, value.clone()).is_none() {
                        return Err(CacheError::IndexOutOfBounds {
                            path: path.to_string(),
                            index: *index,
                            len,
                        }
                        .into());
                    }
                }
                (other, _) => {
                    return Err(CacheError::TypeMismatch {
                        path: path.to_string(),
                        expected: expected_for(&last),
                        actual: other.type_name(),
                    }
                    .into());
                }
            }
        }

        inner.append(PendingRecord::set(path, value));
        Ok(())
    }

    /// Removes the value at a dotted path, recording the deletion.
    ///
    /// Removing a sequence element shifts later indices, so it records a
    /// whole-list replacement at the list's own path instead of an
    /// index-level deletion.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if the path does not exist.
    pub fn remove_path(&self, path: impl AsRef<str>) -> Result<Value> {
        let path = PathKey::parse(path.as_ref());
        let Some(last) = path.last().cloned() else {
            return Err(CacheError::KeyNotFound {
                path: path.to_string(),
            }
            .into());
        };
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let parent = path.parent().unwrap_or_default();
        if parent.is_empty() {
            let Segment::Key(key) = &last else {
                return Err(CacheError::TypeMismatch {
                    path: path.to_string(),
                    expected: "key",
                    actual: "index",
                }
                .into());
            };
            let removed = inner.root.remove(key).ok_or_else(|| CacheError::KeyNotFound {
                path: path.to_string(),
            })?;
            inner.append(PendingRecord::delete(path));
            return Ok(removed);
        }

        let container =
            resolve_mut(&mut inner.root, &parent).ok_or_else(|| CacheError::KeyNotFound {
                path: path.to_string(),
            })?;
        match (container, &last) {
            (Value::Map(map), Segment::Key(key)) => {
                let removed = map.remove(key).ok_or_else(|| CacheError::KeyNotFound {
                    path: path.to_string(),
                })?;
                inner.append(PendingRecord::delete(path));
                Ok(removed)
            }
            (Value::List(list), Segment::Index(index)) => {
                let len = list.len();
                let removed = list.remove(*index).ok_or(CacheError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                    len,
                })?;
                let snapshot = Value::List(list.clone());
                inner.append(PendingRecord::set(parent, snapshot));
                Ok(removed)
            }
            (other, _) => Err(CacheError::TypeMismatch {
                path: path.to_string(),
                expected: expected_for(&last),
                actual: other.type_name(),
            }
            .into()),
        }
    }

    /// Stops recording mutations. Snapshot writes still apply.
    pub fn pause_tracking(&self) {
        self.inner.borrow_mut().tracking = false;
    }

    /// Resumes recording mutations.
    pub fn resume_tracking(&self) {
        self.inner.borrow_mut().tracking = true;
    }

    /// Returns true if mutations are currently being recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.borrow().tracking
    }

    /// Returns the number of records currently in the log.
    pub fn log_len(&self) -> usize {
        self.inner.borrow().log.len()
    }

    /// Returns a copy of the current log, in sequence order.
    pub fn log(&self) -> Vec<ChangeRecord> {
        self.inner.borrow().log.clone()
    }

    /// Drops all pending records without packing them.
    pub fn clear_cache(&self) {
        self.inner.borrow_mut().log.clear();
    }

    /// Compacts the log into a minimal diff.
    ///
    /// The snapshot itself is untouched. The log is emptied afterwards iff
    /// [`SessionConfig::clear_after_pack`] is set (the default).
    pub fn pack_cache(&self) -> ChangeSet {
        let mut inner = self.inner.borrow_mut();
        let changes = compact::compact(&inner.log);
        debug!(
            records = inner.log.len(),
            entries = changes.len(),
            "packed change cache"
        );
        if self.config.clear_after_pack {
            inner.log.clear();
        }
        changes
    }

    /// Returns a clone of the full snapshot.
    pub fn export(&self) -> Map {
        self.inner.borrow().root.clone()
    }

    /// Converts the snapshot to a JSON string for human-readable output.
    pub fn to_json_string(&self) -> String {
        self.inner.borrow().root.to_json_string()
    }

    /// Runs a read-only closure against the value at `path`.
    pub(crate) fn read_at<R>(
        &self,
        path: &PathKey,
        f: impl FnOnce(&Value) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner.borrow();
        let value = resolve(&inner.root, path).ok_or_else(|| {
            Error::from(CacheError::KeyNotFound {
                path: path.to_string(),
            })
        })?;
        f(value)
    }

    /// Runs a mutating closure against the value at `path`, appending the
    /// record it stages (if any) to the log.
    pub(crate) fn mutate_at<R>(
        &self,
        path: &PathKey,
        f: impl FnOnce(&mut Value) -> Result<(R, Option<PendingRecord>)>,
    ) -> Result<R> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let value = resolve_mut(&mut inner.root, path).ok_or_else(|| {
            Error::from(CacheError::KeyNotFound {
                path: path.to_string(),
            })
        })?;
        let (out, record) = f(value)?;
        if let Some(record) = record {
            inner.append(record);
        }
        Ok(out)
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

fn expected_for(segment: &Segment) -> &'static str {
    match segment {
        Segment::Key(_) => "map",
        Segment::Index(_) => "list",
    }
}

/// Resolves a non-empty path to a value within the root map.
fn resolve<'v>(root: &'v Map, path: &PathKey) -> Option<&'v Value> {
    let mut segments = path.segments().iter();
    let first = segments.next()?;
    let mut current = root.get(first.as_key()?)?;
    for segment in segments {
        current = match (current, segment) {
            (Value::Map(map), Segment::Key(key)) => map.get(key)?,
            (Value::List(list), Segment::Index(index)) => list.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable variant of [`resolve`].
fn resolve_mut<'v>(root: &'v mut Map, path: &PathKey) -> Option<&'v mut Value> {
    let mut segments = path.segments().iter();
    let first = segments.next()?;
    let mut current = match first {
        Segment::Key(key) => root.get_mut(key)?,
        Segment::Index(_) => return None,
    };
    for segment in segments {
        current = match (current, segment) {
            (Value::Map(map), Segment::Key(key)) => map.get_mut(key)?,
            (Value::List(list), Segment::Index(index)) => list.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a non-empty path, creating missing mapping keys as empty maps.
/// `full` is the complete operation path, used for error context.
fn resolve_or_create<'v>(
    root: &'v mut Map,
    path: &PathKey,
    full: &PathKey,
) -> Result<&'v mut Value> {
    let mut segments = path.segments().iter();
    let Some(first) = segments.next() else {
        return Err(CacheError::KeyNotFound {
            path: full.to_string(),
        }
        .into());
    };
    let mut current = match first {
        Segment::Key(key) => root.entry_or_insert_map(key.clone()),
        Segment::Index(_) => {
            return Err(CacheError::TypeMismatch {
                path: full.to_string(),
                expected: "key",
                actual: "index",
            }
            .into());
        }
    };
    for segment in segments {
        current = match (current, segment) {
            (Value::Map(map), Segment::Key(key)) => map.entry_or_insert_map(key.clone()),
            (Value::List(list), Segment::Index(index)) => {
                let len = list.len();
                list.get_mut(*index).ok_or(CacheError::IndexOutOfBounds {
                    path: full.to_string(),
                    index: *index,
                    len,
                })?
            }
            (other, segment) => {
                return Err(CacheError::TypeMismatch {
                    path: full.to_string(),
                    expected: expected_for(segment),
                    actual: other.type_name(),
                }
                .into());
            }
        };
    }
    Ok(current)
}
