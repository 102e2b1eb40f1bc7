//! Tracked views over one subtree of the session snapshot.
//!
//! A [`TrackedNode`] is a lens: a session reference plus a [`PathKey`]. It
//! holds no data of its own — every operation re-traverses the live snapshot
//! from the root, so any number of nodes over the same path stay consistent
//! with each other. Reads that land on a nested container hand back a new
//! node one level deeper (wrap-on-read), which is what keeps deep mutations
//! tracked.
//!
//! Mutations apply to the snapshot in place and stage exactly one change
//! record with the session; the two read-like exceptions are
//! [`set_default`](TrackedNode::set_default) on a present key and
//! [`pop_or`](TrackedNode::pop_or) on an absent one.
//!
//! Sequence mutations that shift element indices (remove, pull, reset and
//! the bulk operations) record a whole-list replacement at the list's own
//! path rather than index-level records, since a recorded index stops
//! meaning anything once later elements shift.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::CacheError;
use crate::path::PathKey;
use crate::record::PendingRecord;
use crate::session::TrackingSession;
use crate::value::{Map, Value};
use crate::{Error, Result};

/// What a tracked read returns: a cloned-out scalar, or a live view over a
/// nested container.
#[derive(Debug)]
pub enum Tracked<'s> {
    /// A scalar value, cloned out of the snapshot.
    Leaf(Value),
    /// A nested map or list, wrapped for further tracked access.
    Node(TrackedNode<'s>),
}

impl<'s> Tracked<'s> {
    /// Returns true if this wraps a nested container
    pub fn is_node(&self) -> bool {
        matches!(self, Tracked::Node(_))
    }

    /// Returns the scalar value, if this is a leaf
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Tracked::Leaf(value) => Some(value),
            Tracked::Node(_) => None,
        }
    }

    /// Consumes into the scalar value, if this is a leaf
    pub fn into_leaf(self) -> Option<Value> {
        match self {
            Tracked::Leaf(value) => Some(value),
            Tracked::Node(_) => None,
        }
    }

    /// Consumes into the nested node, if this is one
    pub fn into_node(self) -> Option<TrackedNode<'s>> {
        match self {
            Tracked::Leaf(_) => None,
            Tracked::Node(node) => Some(node),
        }
    }

    /// Shortcut for `as_leaf().and_then(Value::as_int)`
    pub fn as_int(&self) -> Option<i64> {
        self.as_leaf().and_then(Value::as_int)
    }

    /// Shortcut for `as_leaf().and_then(Value::as_text)`
    pub fn as_text(&self) -> Option<&str> {
        self.as_leaf().and_then(Value::as_text)
    }

    /// Shortcut for `as_leaf().and_then(Value::as_bool)`
    pub fn as_bool(&self) -> Option<bool> {
        self.as_leaf().and_then(Value::as_bool)
    }
}

/// A live, mutation-recording view over one map or list in the snapshot.
///
/// Obtained from [`TrackingSession::get_data`] or by reading a nested
/// container through another node. See the [module docs](self) for the
/// tracking rules.
#[derive(Debug, Clone)]
pub struct TrackedNode<'s> {
    session: &'s TrackingSession,
    path: PathKey,
}

impl<'s> TrackedNode<'s> {
    pub(crate) fn new(session: &'s TrackingSession, path: PathKey) -> Self {
        Self { session, path }
    }

    /// Returns the node's path from the session root.
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    // ----- shared reads -----

    /// Returns the number of entries (map) or elements (list).
    pub fn len(&self) -> Result<usize> {
        self.session.read_at(&self.path, |value| match value {
            Value::Map(map) => Ok(map.len()),
            Value::List(list) => Ok(list.len()),
            _ => Err(CacheError::NotAContainer {
                path: self.path.to_string(),
            }
            .into()),
        })
    }

    /// Returns true if the container is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns true if the node currently wraps a map.
    pub fn is_map(&self) -> Result<bool> {
        self.session
            .read_at(&self.path, |value| Ok(value.as_map().is_some()))
    }

    /// Returns true if the node currently wraps a list.
    pub fn is_list(&self) -> Result<bool> {
        self.session
            .read_at(&self.path, |value| Ok(value.as_list().is_some()))
    }

    /// Returns a deep clone of the node's whole subtree.
    pub fn snapshot(&self) -> Result<Value> {
        self.session.read_at(&self.path, |value| Ok(value.clone()))
    }

    // ----- mapping operations -----

    /// Gets the value stored under `key`.
    ///
    /// Scalars are cloned out as [`Tracked::Leaf`]; nested containers come
    /// back as [`Tracked::Node`] so deeper mutations stay tracked.
    pub fn get(&self, key: impl AsRef<str>) -> Result<Tracked<'s>> {
        let key = key.as_ref();
        let child = self.path.child(key);
        let session = self.session;
        self.session.read_at(&self.path, |value| {
            let map = expect_map(value, &self.path)?;
            let found = map.get(key).ok_or_else(|| {
                Error::from(CacheError::KeyNotFound {
                    path: child.to_string(),
                })
            })?;
            Ok(wrap(session, child.clone(), found))
        })
    }

    /// Sets `key` to `value`, recording the write.
    ///
    /// The record stores a deep snapshot of `value` taken now; mutating the
    /// live structure later does not alter the recorded history.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let child = self.path.child(key.as_str());
        self.session.mutate_at(&self.path, move |target| {
            let map = expect_map_mut(target, &self.path)?;
            let snapshot = value.clone();
            map.set(key, value);
            Ok(((), Some(PendingRecord::set(child, snapshot))))
        })
    }

    /// Sets `key` to `default` if absent, then returns the (wrapped) value.
    ///
    /// No record is emitted when the key already exists.
    pub fn set_default(
        &self,
        key: impl Into<String>,
        default: impl Into<Value>,
    ) -> Result<Tracked<'s>> {
        let key = key.into();
        let default = default.into();
        let child = self.path.child(key.as_str());
        let session = self.session;
        self.session.mutate_at(&self.path, move |target| {
            let map = expect_map_mut(target, &self.path)?;
            let record = if map.contains_key(&key) {
                None
            } else {
                let snapshot = default.clone();
                map.set(key.as_str(), default);
                Some(PendingRecord::set(child.clone(), snapshot))
            };
            let value = map.get(&key).ok_or_else(|| {
                Error::from(CacheError::KeyNotFound {
                    path: child.to_string(),
                })
            })?;
            Ok((wrap(session, child.clone(), value), record))
        })
    }

    /// Removes `key`, recording the deletion.
    pub fn delete(&self, key: impl AsRef<str>) -> Result<()> {
        self.pop(key).map(|_| ())
    }

    /// Removes `key` and returns the removed value, recording the deletion.
    pub fn pop(&self, key: impl AsRef<str>) -> Result<Value> {
        let key = key.as_ref();
        let child = self.path.child(key);
        self.session.mutate_at(&self.path, move |target| {
            let map = expect_map_mut(target, &self.path)?;
            let removed = map.remove(key).ok_or_else(|| {
                Error::from(CacheError::KeyNotFound {
                    path: child.to_string(),
                })
            })?;
            Ok((removed, Some(PendingRecord::delete(child))))
        })
    }

    /// Removes `key` if present; returns `default` (recording nothing) when
    /// the key is absent or the node is unreachable.
    pub fn pop_or(&self, key: impl AsRef<str>, default: impl Into<Value>) -> Value {
        self.pop(key).unwrap_or_else(|_| default.into())
    }

    /// Merges `entries` into the map, recording one replacement of the whole
    /// node (the mark stays at this level, not one record per key).
    pub fn update<K, V, I>(&self, entries: I) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(String, Value)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let map = expect_map_mut(target, &self.path)?;
            for (key, value) in entries {
                map.set(key, value);
            }
            let snapshot = Value::Map(map.clone());
            Ok(((), Some(PendingRecord::set(path, snapshot))))
        })
    }

    /// Empties the map, recording one replacement of the whole node.
    pub fn clear(&self) -> Result<()> {
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let map = expect_map_mut(target, &self.path)?;
            map.clear();
            Ok(((), Some(PendingRecord::set(path, Value::Map(Map::new())))))
        })
    }

    /// Returns true if the map contains `key`.
    pub fn contains_key(&self, key: impl AsRef<str>) -> Result<bool> {
        let key = key.as_ref();
        self.session.read_at(&self.path, |value| {
            Ok(expect_map(value, &self.path)?.contains_key(key))
        })
    }

    /// Returns the map's keys in sorted order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.session.read_at(&self.path, |value| {
            Ok(expect_map(value, &self.path)?.keys().cloned().collect())
        })
    }

    /// Returns clones of the map's values, in key order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.session.read_at(&self.path, |value| {
            Ok(expect_map(value, &self.path)?.values().cloned().collect())
        })
    }

    /// Returns a clone of the raw value under `key`, without wrapping.
    /// Mutating the clone is not tracked.
    pub fn get_raw(&self, key: impl AsRef<str>) -> Result<Value> {
        let key = key.as_ref();
        let child = self.path.child(key);
        self.session.read_at(&self.path, |value| {
            expect_map(value, &self.path)?
                .get(key)
                .cloned()
                .ok_or_else(|| {
                    CacheError::KeyNotFound {
                        path: child.to_string(),
                    }
                    .into()
                })
        })
    }

    /// Serializes `value` to a [`Value`] tree and sets it under `key`.
    pub fn set_json<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let value: Value = serde_json::from_value(serde_json::to_value(value)?)?;
        self.set(key, value)
    }

    /// Deserializes the value under `key` into `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Result<T> {
        let raw = self.get_raw(key)?;
        Ok(serde_json::from_value(serde_json::to_value(&raw)?)?)
    }

    // ----- sequence operations -----

    /// Gets the element at `index`, wrapped like [`get`](Self::get).
    pub fn get_index(&self, index: usize) -> Result<Tracked<'s>> {
        let child = self.path.child(index);
        let session = self.session;
        self.session.read_at(&self.path, |value| {
            let list = expect_list(value, &self.path)?;
            let len = list.len();
            let found = list.get(index).ok_or_else(|| {
                Error::from(CacheError::IndexOutOfBounds {
                    path: self.path.to_string(),
                    index,
                    len,
                })
            })?;
            Ok(wrap(session, child.clone(), found))
        })
    }

    /// Replaces the element at `index`, recording a write at that index.
    /// Other elements keep their positions.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let child = self.path.child(index);
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            let len = list.len();
            let snapshot = value.clone();
            if list.set(index, value).is_none() {
                return Err(CacheError::IndexOutOfBounds {
                    path: self.path.to_string(),
                    index,
                    len,
                }
                .into());
            }
            Ok(((), Some(PendingRecord::set(child, snapshot))))
        })
    }

    /// Appends `value`, recording a write at the new tail index. Returns the
    /// index.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            let snapshot = value.clone();
            let index = list.push(value);
            Ok((index, Some(PendingRecord::set(path.child(index), snapshot))))
        })
    }

    /// Appends `value` only if no equal element exists yet.
    ///
    /// Returns `false` (recording nothing) when an equal element is present.
    pub fn push_unique(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            if list.contains(&value) {
                return Ok((false, None));
            }
            let snapshot = value.clone();
            let index = list.push(value);
            Ok((true, Some(PendingRecord::set(path.child(index), snapshot))))
        })
    }

    /// Removes and returns the element at `index`. Later elements shift, so
    /// this records a whole-list replacement.
    pub fn remove_index(&self, index: usize) -> Result<Value> {
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            let len = list.len();
            let removed = list.remove(index).ok_or_else(|| {
                Error::from(CacheError::IndexOutOfBounds {
                    path: self.path.to_string(),
                    index,
                    len,
                })
            })?;
            let snapshot = Value::List(list.clone());
            Ok((removed, Some(PendingRecord::set(path, snapshot))))
        })
    }

    /// Removes the first element equal to `value`. Returns `false`
    /// (recording nothing) when no equal element exists; otherwise records a
    /// whole-list replacement.
    pub fn pull(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            let Some(index) = list.position(&value) else {
                return Ok((false, None));
            };
            let _ = list.remove(index);
            let snapshot = Value::List(list.clone());
            Ok((true, Some(PendingRecord::set(path, snapshot))))
        })
    }

    /// Appends every value from `values`, recording one whole-list
    /// replacement.
    pub fn extend<V, I>(&self, values: I) -> Result<()>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            list.extend(values);
            let snapshot = Value::List(list.clone());
            Ok(((), Some(PendingRecord::set(path, snapshot))))
        })
    }

    /// Replaces the list contents wholesale, recording one whole-list
    /// replacement.
    pub fn reset<V, I>(&self, values: I) -> Result<()>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            list.clear();
            list.extend(values);
            let snapshot = Value::List(list.clone());
            Ok(((), Some(PendingRecord::set(path, snapshot))))
        })
    }

    /// Replaces the first element equal to `old` with `new`. Returns `false`
    /// (recording nothing) when no equal element exists; otherwise records a
    /// write at that element's index.
    pub fn replace(&self, old: impl Into<Value>, new: impl Into<Value>) -> Result<bool> {
        let old = old.into();
        let new = new.into();
        let path = self.path.clone();
        self.session.mutate_at(&self.path, move |target| {
            let list = expect_list_mut(target, &self.path)?;
            let Some(index) = list.position(&old) else {
                return Ok((false, None));
            };
            let snapshot = new.clone();
            list.set(index, new);
            Ok((true, Some(PendingRecord::set(path.child(index), snapshot))))
        })
    }

    /// Returns true if the list contains an element equal to `value`.
    pub fn contains(&self, value: &Value) -> Result<bool> {
        self.session.read_at(&self.path, |target| {
            Ok(expect_list(target, &self.path)?.contains(value))
        })
    }

    /// Clones the list elements into a plain vector.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.session.read_at(&self.path, |target| {
            Ok(expect_list(target, &self.path)?.to_vec())
        })
    }
}

fn wrap<'s>(session: &'s TrackingSession, path: PathKey, value: &Value) -> Tracked<'s> {
    if value.is_container() {
        Tracked::Node(TrackedNode::new(session, path))
    } else {
        Tracked::Leaf(value.clone())
    }
}

fn expect_map<'v>(value: &'v Value, path: &PathKey) -> Result<&'v Map> {
    value.as_map().ok_or_else(|| {
        CacheError::TypeMismatch {
            path: path.to_string(),
            expected: "map",
            actual: value.type_name(),
        }
        .into()
    })
}

fn expect_map_mut<'v>(value: &'v mut Value, path: &PathKey) -> Result<&'v mut Map> {
    let actual = value.type_name();
    value.as_map_mut().ok_or_else(|| {
        CacheError::TypeMismatch {
            path: path.to_string(),
            expected: "map",
            actual,
        }
        .into()
    })
}

fn expect_list<'v>(value: &'v Value, path: &PathKey) -> Result<&'v crate::value::List> {
    value.as_list().ok_or_else(|| {
        CacheError::TypeMismatch {
            path: path.to_string(),
            expected: "list",
            actual: value.type_name(),
        }
        .into()
    })
}

fn expect_list_mut<'v>(
    value: &'v mut Value,
    path: &PathKey,
) -> Result<&'v mut crate::value::List> {
    let actual = value.type_name();
    value.as_list_mut().ok_or_else(|| {
        CacheError::TypeMismatch {
            path: path.to_string(),
            expected: "list",
            actual,
        }
        .into()
    })
}
