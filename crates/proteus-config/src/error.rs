//! Configuration engine error types.

use proteus_bag::BagError;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while aggregating, mutating, or observing
/// configuration.
///
/// Read accessors never raise; an unresolvable path or wrong-typed value
/// yields the caller-supplied default. Only mutation and registration APIs
/// return these.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A path did not resolve, or was empty on a write.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] BagError),

    /// A requested source or parser id is not registered.
    #[error("unknown resource: {id}")]
    UnknownResource {
        /// The missing id.
        id: String,
    },

    /// A source or parser id is already registered.
    #[error("duplicate resource: {id}")]
    DuplicateResource {
        /// The id that was registered twice.
        id: String,
    },

    /// An observer id is already registered for a path.
    #[error("duplicate observer {id} for path {path}")]
    DuplicateObserver {
        /// The watched path.
        path: String,
        /// The id that was registered twice.
        id: String,
    },

    /// A required collaborator was not supplied.
    #[error("missing collaborator: {what}")]
    MissingCollaborator {
        /// What was missing.
        what: String,
    },

    /// A remote response carried no configuration document at the
    /// configured path.
    #[error("configuration document not found at {path}")]
    DocumentNotFound {
        /// The path that was probed.
        path: String,
    },

    /// A remote configuration document had the wrong shape.
    #[error("invalid configuration document at {path}: {reason}")]
    InvalidDocument {
        /// The path that was probed.
        path: String,
        /// Why the document was rejected.
        reason: String,
    },

    /// A remote response carried no timestamp at the configured path.
    #[error("timestamp not found at {path}")]
    TimestampNotFound {
        /// The path that was probed.
        path: String,
    },

    /// A remote timestamp was not an RFC3339 string.
    #[error("invalid timestamp at {path}: {reason}")]
    InvalidTimestamp {
        /// The path that was probed.
        path: String,
        /// Why the timestamp was rejected.
        reason: String,
    },

    /// A document failed to parse.
    #[error("failed to parse {format} document: {reason}")]
    Parse {
        /// The format being parsed.
        format: &'static str,
        /// Why parsing failed.
        reason: String,
    },

    /// A dotenv file failed to load.
    #[error("failed to load dotenv file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a new unknown resource error.
    pub fn unknown_resource(id: impl Into<String>) -> Self {
        Self::UnknownResource { id: id.into() }
    }

    /// Create a new duplicate resource error.
    pub fn duplicate_resource(id: impl Into<String>) -> Self {
        Self::DuplicateResource { id: id.into() }
    }

    /// Create a new duplicate observer error.
    pub fn duplicate_observer(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateObserver {
            path: path.into(),
            id: id.into(),
        }
    }

    /// Create a new missing collaborator error.
    pub fn missing_collaborator(what: impl Into<String>) -> Self {
        Self::MissingCollaborator { what: what.into() }
    }

    /// Create a new document not found error.
    pub fn document_not_found(path: impl Into<String>) -> Self {
        Self::DocumentNotFound { path: path.into() }
    }

    /// Create a new invalid document error.
    pub fn invalid_document(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new timestamp not found error.
    pub fn timestamp_not_found(path: impl Into<String>) -> Self {
        Self::TimestampNotFound { path: path.into() }
    }

    /// Create a new invalid timestamp error.
    pub fn invalid_timestamp(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            format,
            reason: reason.into(),
        }
    }
}
