//! Sync Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A local file or directory could not be read.
    #[display("unable to read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The object store rejected a check or put for this key.
    #[display("remote operation failed for {_0}")]
    Remote(#[error(not(source))] String),
    /// Raised before any I/O takes place.
    #[display("invalid configuration: {_0}")]
    Configuration(#[error(not(source))] String),
    #[display("unable to build digest")]
    Digest,
    #[display("unable to prepare hashed copy of {_0}")]
    Rewrite(#[error(not(source))] String),
    #[display("synchronisation cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
