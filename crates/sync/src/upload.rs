use crate::error::{ErrorKind, Result};
use crate::headers;
use crate::options::SyncOptions;
use crate::report::{Outcome, SkipReason, UploadRecord, Variant};
use cachet_compress::Compression;
use cachet_digest::hash::hash_reader;
use cachet_digest::{Digest, FileEntry, Rewrite, rewrite_file};
use cachet_storage::{Body, ObjectHeaders, StoreHandle};
use exn::ResultExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Upload `body` to `key` unless the store already holds content carrying
/// `fingerprint`.
pub(crate) async fn conditional_put(
    store: &StoreHandle,
    key: &str,
    fingerprint: &str,
    body: Body,
    headers: &ObjectHeaders,
) -> Result<Outcome> {
    let condition = store.check(key, fingerprint).await.or_raise(|| ErrorKind::Remote(key.to_string()))?;
    if !condition.needs_upload() {
        debug!(key, "unchanged");
        return Ok(Outcome::Unchanged);
    }
    store.put(key, body, headers).await.or_raise(|| ErrorKind::Remote(key.to_string()))?;
    info!(key, ?condition, "uploaded");
    Ok(Outcome::Uploaded)
}

/// Uploads both variants of a file against a completed digest.
pub(crate) struct Uploader<'a> {
    pub store: &'a StoreHandle,
    pub options: &'a SyncOptions,
    pub digest: &'a Arc<Digest>,
}

impl Uploader<'_> {
    /// The two variants are independent: one failing does not stop the
    /// other, and both results are returned.
    #[instrument(skip_all, fields(relative = %entry.relative))]
    pub async fn sync_file(&self, entry: &FileEntry) -> [Result<UploadRecord>; 2] {
        let (original, hashed) = futures::join!(self.sync_original(entry), self.sync_hashed(entry));
        [original, hashed]
    }

    async fn sync_original(&self, entry: &FileEntry) -> Result<UploadRecord> {
        if let Some(reason) = self.options.skip_original(entry) {
            debug!(key = %entry.key, %reason, "skipping original");
            return Ok(UploadRecord::skipped(&entry.key, Variant::Original, reason));
        }
        let headers = headers::original(self.options, entry);
        let body = Body::File(entry.path.clone());
        let outcome = conditional_put(self.store, &entry.key, &entry.hash.to_hex(), body, &headers).await?;
        Ok(UploadRecord::new(&entry.key, Variant::Original, outcome))
    }

    async fn sync_hashed(&self, entry: &FileEntry) -> Result<UploadRecord> {
        let hashed = self.digest.get(&entry.relative);
        let key = hashed.unwrap_or(&entry.hashed_key);
        match self.options.skip_hashed(entry, hashed) {
            Some(SkipReason::MissingDigestEntry) => {
                warn!(relative = %entry.relative, "no digest entry, skipping hashed upload");
                return Ok(UploadRecord::skipped(key, Variant::Hashed, SkipReason::MissingDigestEntry));
            },
            Some(reason) => {
                debug!(key, %reason, "skipping hashed");
                return Ok(UploadRecord::skipped(key, Variant::Hashed, reason));
            },
            None => {},
        }
        let (body, fingerprint) = self.hashed_body(entry).await?;
        let headers = headers::hashed(self.options, entry);
        let outcome = conditional_put(self.store, key, &fingerprint, body, &headers).await?;
        Ok(UploadRecord::new(key, Variant::Hashed, outcome))
    }

    /// The hashed body and its fingerprint. A body that is byte-for-byte the
    /// file on disk keeps the file's own hash. Gzip-named sources come back
    /// from the rewriter already encoded and are sent as they are.
    async fn hashed_body(&self, entry: &FileEntry) -> Result<(Body, String)> {
        let rewritten = rewrite_file(&entry.path, &entry.relative, Arc::clone(self.digest))
            .await
            .or_raise(|| ErrorKind::Rewrite(entry.relative.clone()))?;
        let plain = match (rewritten, entry.needs_encoding()) {
            (Rewrite::Unchanged, false) => return Ok((Body::File(entry.path.clone()), entry.hash.to_hex())),
            (Rewrite::Changed { body, hash }, false) => return Ok((Body::Bytes(body), hash.to_hex())),
            (Rewrite::Unchanged, true) => {
                tokio::fs::read(&entry.path).await.or_raise(|| ErrorKind::Io(entry.path.clone()))?
            },
            (Rewrite::Changed { body, .. }, true) => body,
        };
        let relative = entry.relative.clone();
        let (body, hash) = tokio::task::spawn_blocking(move || -> Result<_> {
            let compressed = Compression::Gzip.compress(&plain).or_raise(|| ErrorKind::Rewrite(relative.clone()))?;
            let hash = hash_reader(compressed.as_slice()).or_raise(|| ErrorKind::Rewrite(relative))?;
            Ok((compressed, hash))
        })
        .await
        .or_raise(|| ErrorKind::Rewrite(entry.relative.clone()))??;
        Ok((Body::Bytes(body), hash.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_digest::hash::hash_bytes;
    use cachet_storage::backend::MemoryBackend;

    #[tokio::test]
    async fn conditional_put_skips_identical_content() {
        let memory = Arc::new(MemoryBackend::with_objects([("a.css", b"a{}")]));
        let store: StoreHandle = memory.clone();
        let headers = ObjectHeaders::default();

        let fingerprint = hash_bytes(b"a{}").to_hex();
        let outcome = conditional_put(&store, "a.css", &fingerprint, Body::Bytes(b"a{}".to_vec()), &headers).await;
        assert_eq!(outcome.unwrap(), Outcome::Unchanged);

        let fingerprint = hash_bytes(b"b{}").to_hex();
        let outcome = conditional_put(&store, "a.css", &fingerprint, Body::Bytes(b"b{}".to_vec()), &headers).await;
        assert_eq!(outcome.unwrap(), Outcome::Uploaded);

        assert_eq!(memory.checks().len(), 2);
        assert_eq!(memory.puts(), vec!["a.css".to_string()]);
        assert_eq!(memory.object("a.css").await.unwrap().data, b"b{}");
    }

    #[tokio::test]
    async fn conditional_put_surfaces_remote_errors() {
        let memory = Arc::new(MemoryBackend::default());
        memory.fail_on("a.css");
        let store: StoreHandle = memory.clone();
        let err = conditional_put(&store, "a.css", "00", Body::Bytes(vec![]), &ObjectHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote(key) if key == "a.css"));
        assert!(err.is_retryable());
    }
}
