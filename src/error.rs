//! Crate-wide error type for the generation core.

use std::fmt;

/// Errors surfaced by the generation core.
#[derive(Debug)]
pub enum Error {
    /// Caller error (empty message text). Rejected synchronously, never retried.
    InvalidArgument(String),
    /// The text cannot produce a valid chain. Recovered locally by callers:
    /// updates skip the chain, generation falls back to the default reply.
    InsufficientData,
    /// Persistence I/O failure. Always propagated; a lost update is a
    /// correctness issue.
    Store(rusqlite::Error),
    /// A persisted chain could not be decoded.
    InvalidChain(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::InsufficientData => write!(f, "not enough data to build a chain"),
            Self::Store(source) => write!(f, "corpus store error: {}", source),
            Self::InvalidChain(source) => write!(f, "cannot decode persisted chain: {}", source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(source) => Some(source),
            Self::InvalidChain(source) => Some(source),
            Self::InvalidArgument(_) | Self::InsufficientData => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(source: rusqlite::Error) -> Self {
        Self::Store(source)
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::InvalidChain(source)
    }
}
