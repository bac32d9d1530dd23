//! Storage models.

use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of comparing a local fingerprint against the remote object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Nothing is stored under the key; safe to upload.
    Missing,
    /// The stored object already carries the fingerprint; skip the upload.
    Unchanged,
    /// An object exists under the key with a different fingerprint.
    Changed,
}
impl Condition {
    /// Whether a put is required to make the remote match.
    pub fn needs_upload(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Metadata sent alongside an object body.
///
/// Unset fields are omitted from the request, leaving the store's own
/// defaults in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub acl: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_encoding: Option<String>,
    /// User metadata (`x-amz-meta-*` on S3).
    pub metadata: BTreeMap<String, String>,
}
impl ObjectHeaders {
    /// Overlay `other` on top of `self`: every field set in `other` wins,
    /// metadata maps are merged key by key.
    pub fn merge(&mut self, other: &ObjectHeaders) {
        if other.acl.is_some() {
            self.acl.clone_from(&other.acl);
        }
        if other.content_type.is_some() {
            self.content_type.clone_from(&other.content_type);
        }
        if other.cache_control.is_some() {
            self.cache_control.clone_from(&other.cache_control);
        }
        if other.content_encoding.is_some() {
            self.content_encoding.clone_from(&other.content_encoding);
        }
        self.metadata.extend(other.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// The bytes to upload.
///
/// A `File` body is re-opened by the backend at upload time, so unmodified
/// assets are streamed from disk instead of being held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    Bytes(Vec<u8>),
    File(PathBuf),
}
impl Body {
    /// Load the full body into memory.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Body::Bytes(bytes) => Ok(bytes),
            Body::File(path) => Ok(tokio::fs::read(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
                _ => ErrorKind::Io(e),
            })?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_set_fields_only() {
        let mut base = ObjectHeaders {
            acl: Some("public-read".to_string()),
            cache_control: Some("max-age=60".to_string()),
            metadata: BTreeMap::from([("team".to_string(), "web".to_string())]),
            ..Default::default()
        };
        let overlay = ObjectHeaders {
            cache_control: Some("no-cache".to_string()),
            metadata: BTreeMap::from([("build".to_string(), "42".to_string())]),
            ..Default::default()
        };
        base.merge(&overlay);
        assert_eq!(base.acl.as_deref(), Some("public-read"));
        assert_eq!(base.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(base.metadata.len(), 2);
    }

    #[test]
    fn unchanged_never_needs_upload() {
        assert!(Condition::Missing.needs_upload());
        assert!(Condition::Changed.needs_upload());
        assert!(!Condition::Unchanged.needs_upload());
    }

    #[tokio::test]
    async fn missing_file_body_is_not_found() {
        let err = Body::File(PathBuf::from("/definitely/not/here.css")).into_bytes().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
