use crate::error::{ErrorKind, Result};
use crate::report::SkipReason;
use cachet_digest::{DigestRules, FileEntry, PrehashedNames};
use cachet_storage::{ObjectHeaders, validate_key};
use exn::ResultExt;
use glob::Pattern;
use regex::Regex;
use std::path::PathBuf;

/// Everything that controls a sync run. Built once, validated once, and
/// never modified by the [`Syncer`](crate::Syncer).
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Directory whose contents are synchronised.
    pub base_path: PathBuf,
    /// Globs matched against root-relative, slash-separated paths. Matching
    /// directories are not descended into.
    pub ignore: Vec<Pattern>,
    /// Prefix, pre-hashed detection, aliasing and gzip-on-hash.
    pub rules: DigestRules,
    /// Key the manifest is uploaded under, as-is (no prefix, no hash).
    pub manifest_key: String,
    /// Dry run: decide everything, touch nothing remote.
    pub no_upload: bool,
    pub no_upload_manifest: bool,
    /// Only upload originals of files that are already hashed.
    pub no_upload_originals: bool,
    pub no_upload_hashed: bool,
    /// Applied to every asset upload.
    pub headers: ObjectHeaders,
    /// Applied on top of `headers` for gzip-encoded bodies.
    pub gzip_headers: ObjectHeaders,
    /// `Cache-Control` of hashed uploads.
    pub hashed_cache_control: Option<String>,
    /// Files synchronised at once.
    pub concurrency: usize,
}

impl SyncOptions {
    pub const DEFAULT_MANIFEST_KEY: &'static str = "asset-map.json";
    pub const DEFAULT_CONCURRENCY: usize = 16;
    pub const DEFAULT_HASHED_CACHE_CONTROL: &'static str = "public, max-age=31536000, immutable";

    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ignore: Vec::new(),
            rules: DigestRules::default(),
            manifest_key: Self::DEFAULT_MANIFEST_KEY.to_string(),
            no_upload: false,
            no_upload_manifest: false,
            no_upload_originals: false,
            no_upload_hashed: false,
            headers: ObjectHeaders::default(),
            gzip_headers: ObjectHeaders::default(),
            hashed_cache_control: Some(Self::DEFAULT_HASHED_CACHE_CONTROL.to_string()),
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.rules.prefix = prefix.into();
        self
    }

    pub fn with_ignore<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let compiled = Pattern::new(pattern)
                .or_raise(|| ErrorKind::Configuration(format!("invalid ignore pattern `{pattern}`")))?;
            self.ignore.push(compiled);
        }
        Ok(self)
    }

    /// Detect already-hashed file names with the default pattern.
    pub fn with_prehashed_default(mut self) -> Self {
        self.rules.prehashed = Some(PrehashedNames::default());
        self
    }

    /// Detect already-hashed file names with a custom pattern.
    pub fn with_prehashed_pattern(mut self, pattern: &str) -> Result<Self> {
        let names = PrehashedNames::new(pattern)
            .or_raise(|| ErrorKind::Configuration(format!("invalid pre-hashed pattern `{pattern}`")))?;
        self.rules.prehashed = Some(names);
        Ok(self)
    }

    pub fn with_pseudo_unhashed(mut self, enabled: bool) -> Self {
        self.rules.pseudo_unhashed = enabled;
        self
    }

    pub fn with_gzip_on_hash(mut self, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .or_raise(|| ErrorKind::Configuration(format!("invalid gzip-on-hash pattern `{pattern}`")))?;
        self.rules.gzip_on_hash = Some(compiled);
        Ok(self)
    }

    /// Check the options that cannot be enforced by their types.
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Configuration("base path is empty".to_string()));
        }
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Configuration("concurrency must be at least 1".to_string()));
        }
        validate_key(&self.manifest_key)
            .or_raise(|| ErrorKind::Configuration(format!("invalid manifest key `{}`", self.manifest_key)))?;
        let prefix = self.rules.prefix.trim_matches('/');
        if !prefix.is_empty() {
            validate_key(prefix).or_raise(|| ErrorKind::Configuration(format!("invalid prefix `{prefix}`")))?;
        }
        if self.rules.pseudo_unhashed && self.rules.prehashed.is_none() {
            exn::bail!(ErrorKind::Configuration(
                "unhashed aliases require pre-hashed file detection".to_string()
            ));
        }
        Ok(())
    }

    pub(crate) fn skip_original(&self, entry: &FileEntry) -> Option<SkipReason> {
        if self.no_upload {
            return Some(SkipReason::DryRun);
        }
        if self.no_upload_originals && !entry.prehashed {
            return Some(SkipReason::OriginalsDisabled);
        }
        None
    }

    /// `hashed` is the digest's value for the entry, if it has one.
    pub(crate) fn skip_hashed(&self, entry: &FileEntry, hashed: Option<&str>) -> Option<SkipReason> {
        let Some(hashed) = hashed else {
            return Some(SkipReason::MissingDigestEntry);
        };
        if hashed == entry.key {
            return Some(SkipReason::PassThrough);
        }
        if self.no_upload {
            return Some(SkipReason::DryRun);
        }
        if self.no_upload_hashed {
            return Some(SkipReason::HashedDisabled);
        }
        None
    }

    pub(crate) fn skip_manifest(&self) -> Option<SkipReason> {
        if self.no_upload {
            return Some(SkipReason::DryRun);
        }
        if self.no_upload_manifest {
            return Some(SkipReason::ManifestDisabled);
        }
        None
    }
}
