//! Gzip encoding for asset bodies.
//!
//! Assets travel either as they are or gzip-encoded and served with
//! `Content-Encoding: gzip`. Encoding is deterministic: a fixed level and a
//! header without timestamp or file name, so the same input always produces
//! the same bytes and therefore the same fingerprint.

mod codec;
pub mod error;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// How an asset body is encoded. Defaults to [`None`](Self::None).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// Decided by the final extension alone: `app.js.gz` is gzip, while
    /// `app.gz.js` and the extensionless dotfile `.gz` are not.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Self::Gzip,
            _ => Self::None,
        }
    }

    /// The `Content-Encoding` header value for bodies in this format.
    #[must_use]
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        })
    }
}
