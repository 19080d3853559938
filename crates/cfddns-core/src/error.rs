//! Error types for the DDNS updater
//!
//! Every failure the reconciliation loop can observe falls into one of the
//! [`ErrorKind`] buckets. The kind decides how far a failure reaches.
//! Configuration errors stop the process and auth/not-found errors stop one
//! zone; anything else stays with the record or pass that produced it.

use std::fmt;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS updater
///
/// The enum is `Clone` so a single zone-level failure can be attached to
/// the report of every subdomain it affected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid or unreadable configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure, timeout, rate limit or server-side error
    #[error("Network error: {0}")]
    Network(String),

    /// Credential rejected by the provider
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Zone or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload rejected by the provider
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Coarse classification of an [`Error`], used in logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Network,
    Auth,
    NotFound,
    Validation,
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Parse => "ParseError",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Network(_) => ErrorKind::Network,
            Error::Auth(_) => ErrorKind::Auth,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Whether this error invalidates the rest of the zone for this pass
    ///
    /// A rejected credential or a missing zone will fail every remaining
    /// call against the same zone, so there is no point in attempting them.
    pub fn is_zone_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::NotFound(_))
    }

    /// Whether the next scheduled pass may succeed without operator action
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Parse(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
