use cachet_digest::Digest;
use derive_more::Display;

/// Which copy of an asset an upload was for.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    #[display("original")]
    Original,
    #[display("hashed")]
    Hashed,
    #[display("manifest")]
    Manifest,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum SkipReason {
    #[display("dry run")]
    DryRun,
    #[display("original uploads disabled")]
    OriginalsDisabled,
    #[display("hashed uploads disabled")]
    HashedDisabled,
    /// The hashed key is the original key.
    #[display("already hashed")]
    PassThrough,
    #[display("no digest entry")]
    MissingDigestEntry,
    #[display("manifest upload disabled")]
    ManifestDisabled,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[display("uploaded")]
    Uploaded,
    /// The store already held identical content.
    #[display("unchanged")]
    Unchanged,
    #[display("skipped ({_0})")]
    Skipped(SkipReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRecord {
    pub key: String,
    pub variant: Variant,
    pub outcome: Outcome,
}

impl UploadRecord {
    pub(crate) fn new(key: impl Into<String>, variant: Variant, outcome: Outcome) -> Self {
        Self { key: key.into(), variant, outcome }
    }

    pub(crate) fn skipped(key: impl Into<String>, variant: Variant, reason: SkipReason) -> Self {
        Self::new(key, variant, Outcome::Skipped(reason))
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub digest: Digest,
    /// One record per considered upload, sorted by key then variant.
    pub uploads: Vec<UploadRecord>,
}

impl SyncReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &UploadRecord> {
        self.with_outcome(Outcome::Uploaded)
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &UploadRecord> {
        self.with_outcome(Outcome::Unchanged)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &UploadRecord> {
        self.uploads.iter().filter(|record| matches!(record.outcome, Outcome::Skipped(_)))
    }

    fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &UploadRecord> {
        self.uploads.iter().filter(move |record| record.outcome == outcome)
    }
}
