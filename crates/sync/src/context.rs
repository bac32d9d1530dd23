use cachet_digest::{Digest, FileEntry};
use std::path::PathBuf;
use std::sync::Arc;

/// State that belongs to a single run and must not leak into the next.
#[derive(Debug, Default)]
pub(crate) struct RunContext {
    /// Gathered paths, in discovery order.
    pub files: Vec<PathBuf>,
    /// One per gathered path, carrying the fingerprint of the file on disk.
    pub entries: Vec<FileEntry>,
    /// Complete before anything is uploaded; read-only afterwards.
    pub digest: Arc<Digest>,
}

impl RunContext {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.entries.is_empty() && self.digest.is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
