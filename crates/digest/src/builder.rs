use crate::consts::DEFAULT_PREHASHED_REGEX;
use crate::error::{ErrorKind, Result};
use crate::hash::{ContentHash, hash_file};
use crate::key::{destination_key, insert_hash_before_extension, relative_name};
use crate::kind::{Classification, classify};
use crate::manifest::Digest;
use exn::ResultExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Recognises file names that already carry a content hash (typically from
/// a bundler), and strips that hash back out.
///
/// If the pattern has a capture group named `hash`, stripping removes just
/// that group; otherwise it removes the whole match.
#[derive(Clone, Debug)]
pub struct PrehashedNames {
    pattern: Regex,
}

impl PrehashedNames {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// The name without its embedded hash, or `None` if it has none.
    pub fn strip(&self, name: &str) -> Option<String> {
        let captures = self.pattern.captures(name)?;
        let span = captures.name("hash").or_else(|| captures.get(0))?;
        Some(format!("{}{}", &name[..span.start()], &name[span.end()..]))
    }
}

impl Default for PrehashedNames {
    /// `name.0123abcd.js`, `name-0123abcd.min.js`, and so on: a dot or dash
    /// followed by at least eight hex digits, just before the extension.
    fn default() -> Self {
        Self { pattern: DEFAULT_PREHASHED_REGEX.clone() }
    }
}

/// How relative names turn into keys.
#[derive(Clone, Debug, Default)]
pub struct DigestRules {
    /// Remote key prefix; surrounding slashes are ignored.
    pub prefix: String,
    /// Names matching this are uploaded under their own key instead of
    /// getting a second hash.
    pub prehashed: Option<PrehashedNames>,
    /// Also map the hash-stripped name of a pre-hashed file to its key, so
    /// it can be referenced as if it were unhashed.
    pub pseudo_unhashed: bool,
    /// Hashed keys of matching files get a `.gz` suffix and a gzip-encoded
    /// body. The suffix is added even when the source is gzip-named.
    pub gzip_on_hash: Option<Regex>,
}

/// Everything the upload stage needs to know about one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub relative: String,
    /// Key of the original, unhashed upload.
    pub key: String,
    pub hashed_key: String,
    /// Hash of the file as it is on disk.
    pub hash: ContentHash,
    pub classification: Classification,
    pub prehashed: bool,
    /// The hashed key gained a `.gz` suffix from the gzip-on-hash rule.
    pub gzip_on_hash: bool,
}

impl FileEntry {
    /// The hashed key is the original key, so there is nothing extra to
    /// upload.
    pub fn is_pass_through(&self) -> bool {
        self.hashed_key == self.key
    }

    /// The hashed body has to be gzip-encoded on the way out. A gzip-named
    /// source is already encoded and never gets a second layer.
    pub fn needs_encoding(&self) -> bool {
        self.gzip_on_hash && !self.classification.is_gzip()
    }
}

/// Builds the [`Digest`] for one run, one file at a time.
///
/// Files must be added in a stable order; if two files claim the same name
/// the later one wins. Aliases of pre-hashed files never replace a real
/// file's entry.
#[derive(Debug)]
pub struct DigestBuilder {
    root: PathBuf,
    rules: DigestRules,
    digest: Digest,
    entries: Vec<FileEntry>,
}

impl DigestBuilder {
    pub fn new(root: impl Into<PathBuf>, rules: DigestRules) -> Self {
        Self { root: root.into(), rules, digest: Digest::new(), entries: Vec::new() }
    }

    /// Hash a file from disk and record it.
    pub async fn add(&mut self, path: &Path) -> Result<&FileEntry> {
        let hash = hash_file(path).await?;
        self.insert(path, hash)
    }

    /// Record a file whose hash is already known.
    #[instrument(level = "debug", skip(self), fields(path = %path.display(), %hash))]
    pub fn insert(&mut self, path: &Path, hash: ContentHash) -> Result<&FileEntry> {
        let relative = relative_name(&self.root, path)?;
        let key = destination_key(&self.rules.prefix, &relative);
        let classification = classify(path);

        let prehashed = self.rules.prehashed.as_ref().filter(|names| names.matches(&relative));
        let entry = match prehashed {
            Some(names) => {
                if self.rules.pseudo_unhashed
                    && let Some(alias) = names.strip(&relative)
                    && alias != relative
                {
                    if self.digest.insert_if_absent(alias.as_str(), key.as_str()) {
                        debug!(%alias, %key, "mapped unhashed alias");
                    } else {
                        debug!(%alias, "alias already mapped, keeping existing entry");
                    }
                }
                FileEntry {
                    path: path.to_path_buf(),
                    hashed_key: key.clone(),
                    relative,
                    key,
                    hash,
                    classification,
                    prehashed: true,
                    gzip_on_hash: false,
                }
            },
            None => {
                let mut hashed_key = insert_hash_before_extension(&key, &hash.to_hex());
                let gzip_on_hash = self.rules.gzip_on_hash.as_ref().is_some_and(|pattern| pattern.is_match(&key));
                if gzip_on_hash {
                    hashed_key.push_str(".gz");
                }
                FileEntry {
                    path: path.to_path_buf(),
                    relative,
                    key,
                    hashed_key,
                    hash,
                    classification,
                    prehashed: false,
                    gzip_on_hash,
                }
            },
        };

        debug!(relative = %entry.relative, hashed_key = %entry.hashed_key, "digested");
        self.digest.insert(entry.relative.as_str(), entry.hashed_key.as_str());
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn finish(self) -> (Digest, Vec<FileEntry>) {
        (self.digest, self.entries)
    }
}
