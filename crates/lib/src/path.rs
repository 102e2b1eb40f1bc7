//! Path addressing for nested document data.
//!
//! A [`PathKey`] locates a value inside the nested structure owned by a
//! [`TrackingSession`](crate::session::TrackingSession): an ordered sequence
//! of [`Segment`]s, each either a mapping key or a sequence index, starting
//! from a root entry.
//!
//! Paths render and parse in dotted form (`base.props.weapon_2`, list
//! indices as decimal components), which maps directly onto the dotted
//! field-path update operators of document databases.
//!
//! Ordering is lexicographic over segments, so in a `BTreeMap<PathKey, _>`
//! every path sorts directly before its descendants. The compactor relies on
//! that to treat a subtree as a contiguous key range.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One step of a [`PathKey`]: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    /// A key into a mapping.
    Key(String),
    /// An index into a sequence.
    Index(usize),
}

impl Segment {
    /// Returns the mapping key, if this segment is one.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }

    /// Returns the sequence index, if this segment is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Key(_) => None,
            Segment::Index(index) => Some(*index),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// An immutable location inside the nested structure, from the root down.
///
/// Equality, hashing and ordering are structural over the segments, so a
/// `PathKey` can key hash maps and ordered maps alike.
///
/// # Examples
///
/// ```
/// use deltacache::path::PathKey;
///
/// let path = PathKey::root("base").child("props").child("weapon_2");
/// assert_eq!(path.to_string(), "base.props.weapon_2");
/// assert_eq!(path.parent().unwrap().to_string(), "base.props");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathKey {
    segments: Vec<Segment>,
}

impl PathKey {
    /// Creates an empty path (no segments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a path with a single root-entry key.
    pub fn root(key: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Key(key.into())],
        }
    }

    /// Creates a path from a segment sequence.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Parses a dotted path string, normalizing empty components away.
    ///
    /// All-digit components become [`Segment::Index`], everything else
    /// [`Segment::Key`]. Parsing is infallible; `""` and `"..."` both yield
    /// the empty path.
    pub fn parse(input: &str) -> Self {
        let segments = input
            .split('.')
            .filter(|component| !component.is_empty())
            .map(|component| {
                match component.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(component.to_string()),
                }
            })
            .collect();
        Self { segments }
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.segments.push(segment.into());
    }

    /// Returns the parent path, or `None` for the empty path.
    pub fn parent(&self) -> Option<PathKey> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the final segment, or `None` for the empty path.
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Returns the segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` if this path begins with all of `prefix`'s segments.
    ///
    /// Every path starts with the empty path, and with itself.
    pub fn starts_with(&self, prefix: &PathKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments
    }

    /// Returns `true` if this path is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &PathKey) -> bool {
        self.segments.len() < other.segments.len() && other.starts_with(self)
    }

    /// Returns `true` if this path is a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &PathKey) -> bool {
        other.is_ancestor_of(self)
    }

    /// Returns the remainder of this path below `ancestor`.
    ///
    /// Returns `None` unless `ancestor` is a strict ancestor of this path.
    pub fn relative_to(&self, ancestor: &PathKey) -> Option<PathKey> {
        if !ancestor.is_ancestor_of(self) {
            return None;
        }
        Some(Self {
            segments: self.segments[ancestor.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for PathKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for PathKey {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl FromIterator<Segment> for PathKey {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}
