//! Change-tracked nested data with log compaction.
//!
//! Deltacache wraps a nested map/list structure in a [`TrackingSession`]
//! that records every mutation made through it. At sync time the session
//! packs its log into a [`ChangeSet`]: a minimal set of non-overlapping
//! path → operation entries suitable for a partial document-database
//! update, instead of rewriting the whole document.
//!
//! # Example
//!
//! ```
//! use deltacache::{Map, TrackingSession, Value};
//!
//! # fn main() -> deltacache::Result<()> {
//! let session = TrackingSession::new(Map::from([("base", Map::new())]));
//!
//! let base = session.get_data("base")?;
//! base.set("money", 100)?;
//! base.set("level", 3)?;
//! base.set("money", 250)?;
//!
//! let diff = session.pack_cache();
//! assert_eq!(diff.len(), 2);
//! assert_eq!(
//!     diff.get_path("base.money").and_then(|op| op.as_set()),
//!     Some(&Value::Int(250))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`TrackingSession`] owns the live data and the append-only mutation
//!   log. Reads and writes go through [`TrackedNode`] handles, which
//!   address a subtree by path and re-resolve it per operation, so any
//!   number of handles can be live at once.
//! - [`compact`](compact::compact) folds the log into a [`ChangeSet`]
//!   where no entry's path contains another's.
//! - Tracking can be paused and resumed; untracked mutations apply to the
//!   data without entering the log.

pub mod compact;
pub mod errors;
pub mod node;
pub mod path;
pub mod record;
pub mod session;
pub mod value;

pub use compact::{ChangeSet, DocumentOps, Op};
pub use errors::CacheError;
pub use node::{Tracked, TrackedNode};
pub use path::{PathKey, Segment};
pub use record::{ChangeKind, ChangeRecord};
pub use session::{SessionConfig, TrackingSession};
pub use value::{List, Map, Value};

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// The unified error type for all deltacache operations.
///
/// Cache errors pass through transparently, so `matches!` on the inner
/// [`CacheError`] works directly and the display text is unchanged.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Tracked-operation errors (missing keys, bounds, container kinds)
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// JSON conversion errors from import/export
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error indicates a missing key or path
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Cache(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a container-kind or bounds violation
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Cache(err) => err.is_type_error(),
            _ => false,
        }
    }
}
