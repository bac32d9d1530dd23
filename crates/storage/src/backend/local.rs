//! Local directory object store.
//!
//! Mirrors a bucket onto a directory: each key becomes a file below the
//! configured root. Useful for staging a deploy, for serving the hashed tree
//! from a plain web server, and for inspecting what a sync would upload.

use crate::backend::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Body, Condition, ObjectHeaders};
use crate::validate_key;
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Local filesystem object store.
///
/// The "ETag" of a stored object is the MD5 of the file contents, computed
/// on demand, so the conditional check behaves exactly like S3's for
/// single-part uploads. Headers are not persisted.
///
/// # Examples
///
/// ```no_run
/// use cachet_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("staging", "/srv/www/static")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local directory backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or if it exists and is
    /// not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on construction
            // and it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validate the key and join it onto the root directory.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let key = validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn file_etag(path: &Path) -> std::io::Result<String> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ObjectStore for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, key: &str, etag: &str) -> Result<Condition> {
        let path = self.absolute_path(key)?;
        match Self::file_etag(&path).await {
            Ok(current) if current.eq_ignore_ascii_case(etag) => Ok(Condition::Unchanged),
            Ok(_) => Ok(Condition::Changed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Condition::Missing),
            Err(e) => Err(Self::map_io_error(e, &path).into()),
        }
    }

    async fn put(&self, key: &str, body: Body, headers: &ObjectHeaders) -> Result<()> {
        let path = self.absolute_path(key)?;
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        match body {
            Body::Bytes(bytes) => fs::write(&path, bytes).await.map_err(|e| Self::map_io_error(e, &path))?,
            Body::File(source) => {
                fs::copy(&source, &path).await.map_err(|e| Self::map_io_error(e, &source))?;
            },
        }
        tracing::debug!(
            store = %self.name,
            key,
            content_type = headers.content_type.as_deref(),
            "Stored object on local filesystem (headers are not persisted)"
        );
        Ok(())
    }
}
