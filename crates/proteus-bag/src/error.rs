//! Bag error types.

use thiserror::Error;

/// Result type for bag operations.
pub type BagResult<T> = Result<T, BagError>;

/// Errors that can occur while addressing or decoding a [`Bag`](crate::Bag).
#[derive(Debug, Error)]
pub enum BagError {
    /// A mutating operation was given a path with no usable segments.
    #[error("empty path")]
    EmptyPath,

    /// A path did not resolve to a value.
    #[error("invalid path: {path}")]
    InvalidPath {
        /// The path that failed to resolve.
        path: String,
    },

    /// A resolved value could not be decoded into the requested type.
    #[error("failed to decode value at {path}: {reason}")]
    Decode {
        /// The path whose value was being decoded.
        path: String,
        /// Why the decode failed.
        reason: String,
    },
}

impl BagError {
    /// Create a new invalid path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Create a new decode error.
    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
