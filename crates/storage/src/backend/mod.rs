//! Object store trait and implementations.
//!
//! This module defines the [`ObjectStore`] trait, the unified interface the
//! sync pipeline uses to talk to a remote bucket (S3-compatible services) or
//! a local directory standing in for one.

mod local;
#[cfg(any(test, feature = "mock"))]
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::memory::{MemoryBackend, StoredObject};
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{Body, Condition, ObjectHeaders};
use async_trait::async_trait;

/// Unified interface for object stores.
///
/// Objects are whole-value blobs addressed by forward-slash keys. Every
/// write replaces the full object, which is what makes re-running a sync
/// idempotent: uploading identical bytes under the same key twice is
/// harmless, and the conditional [`check`](Self::check) lets callers avoid
/// doing it at all.
///
/// # Key Handling
/// Keys are relative to the store root (bucket prefix or directory) and must
/// be validated with [`validate_key`](crate::validate_key) before use.
/// Implementations enforce this validation.
///
/// # Examples
///
/// ```
/// use cachet_storage::{Body, ObjectHeaders, ObjectStore, error::Result};
///
/// async fn upload_if_needed(store: &dyn ObjectStore, key: &str, data: Vec<u8>) -> Result<bool> {
///     let etag = cachet_storage::etag(&data);
///     if !store.check(key, &etag).await?.needs_upload() {
///         return Ok(false);
///     }
///     store.put(key, Body::Bytes(data), &ObjectHeaders::default()).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store (for logging only).
    fn name(&self) -> &str;

    /// Compare the object stored under `key` against a local fingerprint.
    ///
    /// `etag` is the unquoted, lowercase hex MD5 of the bytes the caller is
    /// about to send (see [`etag`](crate::etag)). Returns
    /// [`Condition::Missing`] when nothing is stored under the key and
    /// [`Condition::Unchanged`] when the stored object already matches.
    /// Anything the store cannot answer cleanly is an error.
    async fn check(&self, key: &str, etag: &str) -> Result<Condition>;

    /// Upload `body` under `key`, replacing any existing object.
    ///
    /// # Notes
    /// - Implementations should create intermediate "directories" as needed.
    /// - Backends that cannot persist some headers (e.g. ACLs on a local
    ///   directory) ignore them silently.
    async fn put(&self, key: &str, body: Body, headers: &ObjectHeaders) -> Result<()>;
}
