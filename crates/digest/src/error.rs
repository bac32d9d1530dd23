//! Digest Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A digest error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A local file could not be read. The digest cannot be trusted without
    /// every file, so this is always fatal for the build.
    #[display("unable to read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The path does not live under the synchronisation root.
    #[display("{} is not inside the synchronisation root", _0.display())]
    OutsideRoot(#[error(not(source))] PathBuf),
    /// Object keys must be UTF-8.
    #[display("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(#[error(not(source))] PathBuf),
    /// A caller-supplied regular expression did not compile.
    #[display("invalid pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// A gzip-named asset could not be decoded or re-encoded.
    #[display("compression error")]
    Compression,
    /// A blocking rewrite task panicked or was cancelled.
    #[display("rewrite task interrupted")]
    Interrupted,
    /// The digest could not be serialised or parsed.
    #[display("invalid manifest")]
    Manifest,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Interrupted)
    }
}
