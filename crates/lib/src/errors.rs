//! Error types for cache operations.
//!
//! All failures raised by tracked operations are structured variants of
//! [`CacheError`]. Internal invalid-path conditions (a node whose subtree no
//! longer exists) surface as `KeyNotFound` rather than a distinct kind.

use thiserror::Error;

/// Structured error types for tracked cache operations.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The addressed key or path does not exist
    #[error("key not found: {path}")]
    KeyNotFound { path: String },

    /// A sequence index is out of bounds
    #[error("index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// An operation was invoked on a node of the wrong container kind
    #[error("type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A container was required but the value is a scalar
    #[error("value at {path} is not a container")]
    NotAContainer { path: String },
}

impl CacheError {
    /// Check if this error indicates a missing key or path
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound { .. })
    }

    /// Check if this error is a container-kind or bounds violation
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            CacheError::TypeMismatch { .. }
                | CacheError::NotAContainer { .. }
                | CacheError::IndexOutOfBounds { .. }
        )
    }

    /// Get the path at which the error occurred
    pub fn path(&self) -> &str {
        match self {
            CacheError::KeyNotFound { path }
            | CacheError::IndexOutOfBounds { path, .. }
            | CacheError::TypeMismatch { path, .. }
            | CacheError::NotAContainer { path } => path,
        }
    }
}
