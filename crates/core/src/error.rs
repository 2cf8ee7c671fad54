//! Error types for oc-core
//!
//! Every failure of the retrieval engine is an [`Error`]. The output layer
//! never inspects variants directly: it asks [`Error::kind`] for the
//! classified [`ErrorKind`] and prints the `Display` message.

use thiserror::Error;

/// Result type alias for oc-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message reported when a target is not a remote object path
pub const SOURCE_NOT_REMOTE: &str = "source must be a remote object";

/// Error types for oc-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Target is a local filesystem path
    #[error("source must be a remote object")]
    SourceNotRemote,

    /// Malformed remote path
    #[error("invalid target: {0}")]
    InvalidPath(String),

    /// Glob pattern could not be compiled
    #[error("invalid wildcard pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Version pin combined with a prefix or wildcard target
    #[error("version id can only be used with a single object target")]
    InvalidVersionScope,

    /// Configuration file or option error
    #[error("configuration error: {0}")]
    Config(String),

    /// Wildcard target matched zero keys
    #[error("no object found")]
    NoMatch,

    /// Object (or bucket) does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Requested version of an object does not exist
    #[error("object version not found")]
    VersionNotFound { key: String, version_id: String },

    /// Credentials rejected or operation forbidden
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network error (retryable)
    #[error("network error: {0}")]
    Network(String),

    /// A single attempt exceeded its deadline (retryable)
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Service returned fewer bytes than the range asked for (retryable)
    #[error("short read on {key}: expected {expected} bytes, got {actual}")]
    ShortRead {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Object was overwritten between the first and a later range read
    #[error("object {key} changed while it was being read")]
    ObjectChanged { key: String },

    /// Retry ceiling exceeded
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<Error>,
    },

    /// Output sink can no longer accept data
    #[error("output closed: {0}")]
    OutputClosed(std::io::Error),

    /// Non-retryable storage service failure
    #[error("{0}")]
    Service(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Broken engine invariant
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classified failure taxonomy consumed by the output layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceTypeError,
    InvalidTarget,
    InvalidPattern,
    Configuration,
    InvalidVersionScope,
    NoMatch,
    NotFound,
    VersionNotFound,
    AccessDenied,
    TransientFetchFailure,
    FatalFetchFailure,
    OutputClosed,
    Internal,
}

impl ErrorKind {
    /// Stable identifier, used in debug logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceTypeError => "source_type_error",
            Self::InvalidTarget => "invalid_target",
            Self::InvalidPattern => "invalid_pattern",
            Self::Configuration => "configuration",
            Self::InvalidVersionScope => "invalid_version_scope",
            Self::NoMatch => "no_match",
            Self::NotFound => "not_found",
            Self::VersionNotFound => "version_not_found",
            Self::AccessDenied => "access_denied",
            Self::TransientFetchFailure => "transient_fetch_failure",
            Self::FatalFetchFailure => "fatal_fetch_failure",
            Self::OutputClosed => "output_closed",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Map this error into the classified taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceNotRemote => ErrorKind::SourceTypeError,
            Error::InvalidPath(_) | Error::InvalidUrl(_) => ErrorKind::InvalidTarget,
            Error::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Error::InvalidVersionScope => ErrorKind::InvalidVersionScope,
            Error::Config(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Json(_) => ErrorKind::Configuration,
            Error::NoMatch => ErrorKind::NoMatch,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::Network(_) | Error::Timeout { .. } | Error::ShortRead { .. } => {
                ErrorKind::TransientFetchFailure
            }
            Error::RetriesExhausted { .. }
            | Error::ObjectChanged { .. }
            | Error::Service(_)
            | Error::Io(_) => ErrorKind::FatalFetchFailure,
            Error::OutputClosed(_) => ErrorKind::OutputClosed,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether another attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientFetchFailure
    }

    /// Wrap a failed write to the output sink
    pub fn output(err: std::io::Error) -> Self {
        Error::OutputClosed(err)
    }
}
