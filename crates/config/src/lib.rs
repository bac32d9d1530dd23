//! Configuration for `cachet`.
//!
//! Values are layered with [`figment`], later layers winning:
//!
//! 1. Built-in defaults.
//! 2. A configuration file (TOML, YAML or JSON, by extension).
//! 3. `CACHET_`-prefixed environment variables, with `__` separating nested
//!    keys (`CACHET_TARGET__BUCKET=assets`).
//!
//! [`Config::options`] turns the loaded values into validated
//! [`SyncOptions`]; [`Config::target`] says where to upload.

pub mod error;
mod headers;
mod target;

pub use crate::headers::Headers;
pub use crate::target::Target;

use crate::error::{ErrorKind, Result};
use cachet_sync::SyncOptions;
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "CACHET_";
pub const FILE_NAME: &str = "cachet.toml";

/// Whether (and how) to recognise files that already carry a content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlreadyHashed {
    /// `true` uses the built-in pattern.
    Enabled(bool),
    /// A custom pattern; a `hash` capture group marks what to strip for
    /// unhashed aliases.
    Pattern(String),
}

impl Default for AlreadyHashed {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Directory to synchronise.
    pub base_path: Option<PathBuf>,
    pub ignore: Vec<String>,
    pub prefix: String,
    pub manifest_key: String,
    pub no_upload: bool,
    pub no_upload_manifest: bool,
    pub no_upload_originals: bool,
    pub no_upload_hashed: bool,
    pub headers: Headers,
    pub gzip_headers: Headers,
    pub files_already_hashed: AlreadyHashed,
    pub pseudo_unhashed: bool,
    pub gzip_on_hash: Option<String>,
    /// An empty string disables the far-future header on hashed uploads.
    pub hashed_cache_control: String,
    pub concurrency: usize,
    pub target: Option<Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: None,
            ignore: Vec::new(),
            prefix: String::new(),
            manifest_key: SyncOptions::DEFAULT_MANIFEST_KEY.to_string(),
            no_upload: false,
            no_upload_manifest: false,
            no_upload_originals: false,
            no_upload_hashed: false,
            headers: Headers::default(),
            gzip_headers: Headers::default(),
            files_already_hashed: AlreadyHashed::default(),
            pseudo_unhashed: false,
            gzip_on_hash: None,
            hashed_cache_control: SyncOptions::DEFAULT_HASHED_CACHE_CONTROL.to_string(),
            concurrency: SyncOptions::DEFAULT_CONCURRENCY,
            target: None,
        }
    }
}

impl Config {
    /// Load defaults, then `path` (or the default file, if one exists), then
    /// the environment.
    ///
    /// # Errors
    /// An explicitly requested file must exist. Unknown extensions and
    /// values of the wrong type are errors.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_file(),
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            debug!(path = %file.display(), "loading configuration file");
            figment = merge_file(figment, &file)?;
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)
    }

    /// Validated options for a [`Syncer`](cachet_sync::Syncer).
    pub fn options(&self) -> Result<SyncOptions> {
        let base_path = self.base_path.clone().ok_or_raise(|| ErrorKind::Missing("base_path"))?;
        let invalid = || ErrorKind::Invalid("sync options".to_string());

        let mut options = SyncOptions::new(base_path)
            .with_prefix(self.prefix.clone())
            .with_ignore(&self.ignore)
            .or_raise(invalid)?
            .with_pseudo_unhashed(self.pseudo_unhashed);
        options = match &self.files_already_hashed {
            AlreadyHashed::Enabled(false) => options,
            AlreadyHashed::Enabled(true) => options.with_prehashed_default(),
            AlreadyHashed::Pattern(pattern) => options.with_prehashed_pattern(pattern).or_raise(invalid)?,
        };
        if let Some(pattern) = &self.gzip_on_hash {
            options = options.with_gzip_on_hash(pattern).or_raise(invalid)?;
        }
        options.manifest_key.clone_from(&self.manifest_key);
        options.no_upload = self.no_upload;
        options.no_upload_manifest = self.no_upload_manifest;
        options.no_upload_originals = self.no_upload_originals;
        options.no_upload_hashed = self.no_upload_hashed;
        options.headers = self.headers.clone().into();
        options.gzip_headers = self.gzip_headers.clone().into();
        options.hashed_cache_control = Some(self.hashed_cache_control.clone()).filter(|value| !value.is_empty());
        options.concurrency = self.concurrency;
        options.validate().or_raise(invalid)?;
        Ok(options)
    }

    /// Where to upload.
    pub fn target(&self) -> Result<&Target> {
        let target = self.target.as_ref().ok_or_raise(|| ErrorKind::Missing("target"))?;
        target.validate()?;
        Ok(target)
    }
}

/// `./cachet.toml`, falling back to the platform configuration directory.
fn default_file() -> Option<PathBuf> {
    let local = PathBuf::from(FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    ProjectDirs::from("", "", "cachet")
        .map(|dirs| dirs.config_dir().join(FILE_NAME))
        .filter(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}
