use crate::context::RunContext;
use crate::error::{ErrorKind, Result};
use crate::headers;
use crate::options::SyncOptions;
use crate::report::{SyncReport, UploadRecord, Variant};
use crate::upload::{Uploader, conditional_put};
use crate::walk::list_files;
use cachet_digest::error::ErrorKind as DigestErrorKind;
use cachet_digest::hash::hash_bytes;
use cachet_digest::{Digest, DigestBuilder};
use cachet_storage::{Body, StoreHandle};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Runs the Gather, Digest, Sync and Publish phases against one store.
///
/// Runs take `&mut self`, so they never overlap; whatever a run gathers is
/// dropped when it finishes, whether it succeeded or not.
pub struct Syncer {
    store: StoreHandle,
    options: SyncOptions,
    context: RunContext,
}

impl Syncer {
    /// # Errors
    /// [`ErrorKind::Configuration`] if the options are invalid. Nothing is
    /// read or uploaded before this check.
    pub fn new(store: StoreHandle, options: SyncOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { store, options, context: RunContext::default() })
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run every phase to completion.
    pub async fn run(&mut self) -> Result<SyncReport> {
        self.run_until_cancelled(&CancellationToken::new()).await
    }

    /// Run every phase, stopping early once `token` is cancelled.
    ///
    /// Cancellation stops new files from being started; files already being
    /// uploaded are allowed to finish, then the run fails with
    /// [`ErrorKind::Cancelled`]. The manifest is never published by a
    /// cancelled run.
    ///
    /// # Errors
    /// A file that fails to upload does not stop the others; the run fails
    /// with the first error seen once every started file has finished.
    #[instrument(skip_all, fields(store = self.store.name(), base_path = %self.options.base_path.display()))]
    pub async fn run_until_cancelled(&mut self, token: &CancellationToken) -> Result<SyncReport> {
        let result = self.run_phases(token).await;
        self.context.reset();
        result
    }

    async fn run_phases(&mut self, token: &CancellationToken) -> Result<SyncReport> {
        prepare(&self.options, &mut self.context).await?;
        if token.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        let mut uploads = self.sync_files(token).await?;
        uploads.push(self.publish_manifest().await?);
        uploads.sort_by(|a, b| a.key.cmp(&b.key).then(a.variant.cmp(&b.variant)));
        Ok(SyncReport { digest: self.context.digest.as_ref().clone(), uploads })
    }

    async fn sync_files(&self, token: &CancellationToken) -> Result<Vec<UploadRecord>> {
        let uploader = Uploader { store: &self.store, options: &self.options, digest: &self.context.digest };
        let mut pending = self.context.entries.iter().map(|entry| uploader.sync_file(entry));
        let mut processing = FuturesUnordered::new();
        processing.extend(pending.by_ref().take(self.options.concurrency));

        let mut uploads = Vec::with_capacity(self.context.entries.len() * 2 + 1);
        let mut first_error = None;
        while let Some(results) = processing.next().await {
            for result in results {
                match result {
                    Ok(record) => uploads.push(record),
                    Err(err) => {
                        error!(error = ?err, "upload failed");
                        first_error.get_or_insert(err);
                    },
                }
            }
            // Pop-n-push, until cancelled.
            if !token.is_cancelled()
                && let Some(next) = pending.next()
            {
                processing.push(next);
            }
        }

        if token.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        info!(records = uploads.len(), "files synchronised");
        Ok(uploads)
    }

    async fn publish_manifest(&self) -> Result<UploadRecord> {
        let key = &self.options.manifest_key;
        if let Some(reason) = self.options.skip_manifest() {
            debug!(%key, %reason, "skipping manifest");
            return Ok(UploadRecord::skipped(key, Variant::Manifest, reason));
        }
        let body = self.context.digest.to_json().or_raise(|| ErrorKind::Digest)?;
        let fingerprint = hash_bytes(&body).to_hex();
        let headers = headers::manifest(&self.options);
        let outcome = conditional_put(&self.store, key, &fingerprint, Body::Bytes(body), &headers).await?;
        info!(%key, %outcome, "manifest published");
        Ok(UploadRecord::new(key, Variant::Manifest, outcome))
    }
}

/// Gather and digest only; nothing is checked or uploaded.
#[instrument(skip_all, fields(base_path = %options.base_path.display()))]
pub async fn build_digest(options: &SyncOptions) -> Result<Digest> {
    options.validate()?;
    let mut context = RunContext::default();
    prepare(options, &mut context).await?;
    Ok(Arc::unwrap_or_clone(context.digest))
}

async fn prepare(options: &SyncOptions, context: &mut RunContext) -> Result<()> {
    gather(options, context).await?;
    digest_files(options, context).await
}

async fn gather(options: &SyncOptions, context: &mut RunContext) -> Result<()> {
    let mut files = std::pin::pin!(list_files(&options.base_path, &options.ignore));
    while let Some(path) = files.next().await {
        context.files.push(path?);
    }
    info!(files = context.files.len(), "gathered");
    Ok(())
}

async fn digest_files(options: &SyncOptions, context: &mut RunContext) -> Result<()> {
    let mut builder = DigestBuilder::new(options.base_path.clone(), options.rules.clone());
    for path in &context.files {
        if let Err(err) = builder.add(path).await {
            // A file that vanished or cannot be read is a local I/O failure.
            let kind = match &*err {
                DigestErrorKind::Io(path) => ErrorKind::Io(path.clone()),
                _ => ErrorKind::Digest,
            };
            return Err(err.raise(kind));
        }
    }
    let (digest, entries) = builder.finish();
    info!(files = entries.len(), entries = digest.len(), "digest built");
    context.digest = Arc::new(digest);
    context.entries = entries;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Outcome, SkipReason};
    use async_trait::async_trait;
    use cachet_compress::Compression;
    use cachet_storage::backend::MemoryBackend;
    use cachet_storage::{Condition, ObjectHeaders, ObjectStore};
    use std::path::Path;
    use tempfile::TempDir;

    const APP_CSS: &str = ".logo{background:url(/img/logo.png)}\n";
    const LOGO: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

    fn write(root: &Path, relative: &str, data: impl AsRef<[u8]>) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "css/app.css", APP_CSS);
        write(dir.path(), "img/logo.png", LOGO);
        dir
    }

    fn build(options: SyncOptions) -> (Syncer, Arc<MemoryBackend>) {
        let memory = Arc::new(MemoryBackend::default());
        let syncer = Syncer::new(memory.clone(), options).unwrap();
        (syncer, memory)
    }

    /// Fires the token as soon as anything is written.
    struct CancelOnPut {
        inner: Arc<MemoryBackend>,
        token: CancellationToken,
    }

    #[async_trait]
    impl ObjectStore for CancelOnPut {
        fn name(&self) -> &str {
            "cancel-on-put"
        }

        async fn check(&self, key: &str, etag: &str) -> cachet_storage::error::Result<Condition> {
            self.inner.check(key, etag).await
        }

        async fn put(&self, key: &str, body: Body, headers: &ObjectHeaders) -> cachet_storage::error::Result<()> {
            self.token.cancel();
            self.inner.put(key, body, headers).await
        }
    }

    #[tokio::test]
    async fn end_to_end() {
        let dir = site();
        let (mut syncer, memory) = build(SyncOptions::new(dir.path()).with_prefix("assets"));
        let report = syncer.run().await.unwrap();

        let logo_hash = hash_bytes(LOGO);
        let css_hash = hash_bytes(APP_CSS.as_bytes());
        let hashed_logo = format!("assets/img/logo-{logo_hash}.png");
        let hashed_css = format!("assets/css/app-{css_hash}.css");

        assert_eq!(memory.puts().len(), 5);
        assert_eq!(
            memory.keys().await,
            vec![
                "asset-map.json".to_string(),
                hashed_css.clone(),
                "assets/css/app.css".to_string(),
                hashed_logo.clone(),
                "assets/img/logo.png".to_string(),
            ]
        );
        assert_eq!(report.uploaded().count(), 5);
        assert_eq!(report.digest.get("img/logo.png"), Some(hashed_logo.as_str()));
        assert_eq!(report.digest.get("css/app.css"), Some(hashed_css.as_str()));

        // Only the hashed stylesheet points at the hashed image.
        let original = memory.object("assets/css/app.css").await.unwrap();
        assert_eq!(original.data, APP_CSS.as_bytes());
        let hashed = memory.object(&hashed_css).await.unwrap();
        assert_eq!(String::from_utf8(hashed.data).unwrap(), format!(".logo{{background:url(/{hashed_logo})}}\n"));
        assert_eq!(hashed.headers.content_type.as_deref(), Some("text/css"));
        assert_eq!(hashed.headers.cache_control.as_deref(), Some(SyncOptions::DEFAULT_HASHED_CACHE_CONTROL));

        let manifest = memory.object("asset-map.json").await.unwrap();
        assert_eq!(Digest::from_json(&manifest.data).unwrap(), report.digest);
        assert_eq!(manifest.headers.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn second_run_uploads_nothing() {
        let dir = site();
        let (mut syncer, memory) = build(SyncOptions::new(dir.path()).with_prefix("assets"));
        syncer.run().await.unwrap();
        memory.clear_log();

        let report = syncer.run().await.unwrap();
        assert!(memory.puts().is_empty());
        assert_eq!(memory.checks().len(), 5);
        assert_eq!(report.unchanged().count(), 5);
    }

    #[tokio::test]
    async fn changed_file_uploads_new_hashed_key() {
        let dir = site();
        let (mut syncer, memory) = build(SyncOptions::new(dir.path()));
        syncer.run().await.unwrap();
        memory.clear_log();

        write(dir.path(), "img/logo.png", b"new logo");
        let report = syncer.run().await.unwrap();
        let hashed_logo = format!("img/logo-{}.png", hash_bytes(b"new logo"));
        let hashed_css = format!("css/app-{}.css", hash_bytes(APP_CSS.as_bytes()));
        let mut puts = memory.puts();
        puts.sort();
        // The stylesheet itself is unchanged but its hashed copy now refers
        // to a different image, so it is uploaded again under the same key.
        assert_eq!(
            puts,
            vec!["asset-map.json".to_string(), hashed_css.clone(), hashed_logo.clone(), "img/logo.png".to_string()]
        );
        let hashed = memory.object(&hashed_css).await.unwrap();
        assert!(String::from_utf8(hashed.data).unwrap().contains(&hashed_logo));
        assert_eq!(report.digest.get("img/logo.png"), Some(hashed_logo.as_str()));
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let dir = site();
        let options = SyncOptions { no_upload: true, ..SyncOptions::new(dir.path()) };
        let (mut syncer, memory) = build(options);
        let report = syncer.run().await.unwrap();
        assert!(memory.checks().is_empty());
        assert!(memory.puts().is_empty());
        assert_eq!(report.digest.len(), 2);
        assert!(report.uploads.iter().all(|record| record.outcome == Outcome::Skipped(SkipReason::DryRun)));
    }

    #[tokio::test]
    async fn suppression_flags() {
        let dir = site();
        let options = SyncOptions {
            no_upload_originals: true,
            no_upload_manifest: true,
            ..SyncOptions::new(dir.path())
        };
        let (mut syncer, memory) = build(options);
        let report = syncer.run().await.unwrap();
        assert_eq!(memory.puts().len(), 2);
        assert!(memory.puts().iter().all(|key| key != "css/app.css" && key != "img/logo.png"));
        assert_eq!(report.skipped().count(), 3);

        let options = SyncOptions { no_upload_hashed: true, ..SyncOptions::new(dir.path()) };
        let (mut syncer, memory) = build(options);
        syncer.run().await.unwrap();
        let mut puts = memory.puts();
        puts.sort();
        assert_eq!(puts, vec!["asset-map.json", "css/app.css", "img/logo.png"]);
    }

    #[tokio::test]
    async fn prehashed_files_pass_through() {
        let dir = site();
        write(dir.path(), "js/vendor.1a2b3c4d.js", "vendor();");
        write(dir.path(), "js/main.js", "//# sourceMappingURL=main.js.map\n");
        let options = SyncOptions::new(dir.path()).with_prehashed_default().with_pseudo_unhashed(true);
        let (mut syncer, memory) = build(options);
        let report = syncer.run().await.unwrap();

        assert_eq!(report.digest.get("js/vendor.1a2b3c4d.js"), Some("js/vendor.1a2b3c4d.js"));
        assert_eq!(report.digest.get("js/vendor.js"), Some("js/vendor.1a2b3c4d.js"));
        let vendor_puts = memory.puts().into_iter().filter(|key| key.starts_with("js/vendor")).count();
        assert_eq!(vendor_puts, 1);
        assert!(report.uploads.iter().any(|record| record.key == "js/vendor.1a2b3c4d.js"
            && record.outcome == Outcome::Skipped(SkipReason::PassThrough)));
    }

    #[tokio::test]
    async fn prehashed_originals_survive_no_upload_originals() {
        let dir = site();
        write(dir.path(), "js/vendor.1a2b3c4d.js", "vendor();");
        let options =
            SyncOptions { no_upload_originals: true, ..SyncOptions::new(dir.path()).with_prehashed_default() };
        let (mut syncer, memory) = build(options);
        syncer.run().await.unwrap();
        assert!(memory.puts().contains(&"js/vendor.1a2b3c4d.js".to_string()));
        assert!(!memory.puts().contains(&"img/logo.png".to_string()));
    }

    #[tokio::test]
    async fn gzip_on_hash_compresses_hashed_copy() {
        let dir = site();
        let options = SyncOptions::new(dir.path()).with_gzip_on_hash(r"\.css$").unwrap();
        let (mut syncer, memory) = build(options);
        let report = syncer.run().await.unwrap();

        let hashed_key = report.digest.get("css/app.css").unwrap().to_string();
        assert!(hashed_key.ends_with(".css.gz"));
        let hashed = memory.object(&hashed_key).await.unwrap();
        assert_eq!(hashed.headers.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(hashed.headers.content_type.as_deref(), Some("text/css"));
        let plain = String::from_utf8(Compression::Gzip.decompress(&hashed.data).unwrap()).unwrap();
        assert!(plain.contains(report.digest.get("img/logo.png").unwrap()));

        memory.clear_log();
        syncer.run().await.unwrap();
        assert!(memory.puts().is_empty());
    }

    #[tokio::test]
    async fn gzip_named_source_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = Compression::Gzip.compress(APP_CSS.as_bytes()).unwrap();
        write(dir.path(), "css/app.css.gz", &source);
        write(dir.path(), "img/logo.png", LOGO);
        let (mut syncer, memory) = build(SyncOptions::new(dir.path()));
        let report = syncer.run().await.unwrap();

        let hashed_key = format!("css/app-{}.css.gz", hash_bytes(&source));
        assert_eq!(report.digest.get("css/app.css.gz"), Some(hashed_key.as_str()));
        let hashed = memory.object(&hashed_key).await.unwrap();
        assert_eq!(hashed.headers.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(hashed.headers.content_type.as_deref(), Some("text/css"));
        let plain = String::from_utf8(Compression::Gzip.decompress(&hashed.data).unwrap()).unwrap();
        assert_eq!(plain, format!(".logo{{background:url(/{})}}\n", report.digest.get("img/logo.png").unwrap()));

        let original = memory.object("css/app.css.gz").await.unwrap();
        assert_eq!(original.data, source);
        assert_eq!(original.headers.content_encoding.as_deref(), Some("gzip"));

        // The recompressed body hashes the same every time.
        memory.clear_log();
        let report = syncer.run().await.unwrap();
        assert!(memory.puts().is_empty());
        assert_eq!(report.unchanged().count(), 5);
    }

    #[tokio::test]
    async fn gzip_on_hash_never_double_encodes_gzip_sources() {
        let dir = tempfile::tempdir().unwrap();
        let source = Compression::Gzip.compress(APP_CSS.as_bytes()).unwrap();
        write(dir.path(), "css/app.css.gz", &source);
        write(dir.path(), "img/logo.png", LOGO);
        let options = SyncOptions::new(dir.path()).with_gzip_on_hash(r"\.css(\.gz)?$").unwrap();
        let (mut syncer, memory) = build(options);
        let report = syncer.run().await.unwrap();

        let hashed_key = format!("css/app-{}.css.gz.gz", hash_bytes(&source));
        assert_eq!(report.digest.get("css/app.css.gz"), Some(hashed_key.as_str()));
        let hashed = memory.object(&hashed_key).await.unwrap();
        assert_eq!(hashed.headers.content_encoding.as_deref(), Some("gzip"));
        // One decode gets back to the stylesheet.
        let plain = String::from_utf8(Compression::Gzip.decompress(&hashed.data).unwrap()).unwrap();
        assert!(plain.starts_with(".logo{background:url(/img/logo-"));
    }

    #[tokio::test]
    async fn ignored_files_are_not_synced() {
        let dir = site();
        write(dir.path(), "css/app.css.map", "{}");
        write(dir.path(), ".git/HEAD", "ref");
        let options = SyncOptions::new(dir.path()).with_ignore(["*.map", ".git"]).unwrap();
        let digest = build_digest(&options).await.unwrap();
        assert_eq!(digest.iter().map(|(relative, _)| relative).collect::<Vec<_>>(), vec!["css/app.css", "img/logo.png"]);
    }

    #[tokio::test]
    async fn failure_reports_first_error_and_syncs_siblings() {
        let dir = site();
        let memory = Arc::new(MemoryBackend::default());
        memory.fail_on("img/logo.png");
        let mut syncer = Syncer::new(memory.clone(), SyncOptions::new(dir.path())).unwrap();

        let err = syncer.run().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote(key) if key == "img/logo.png"));
        assert!(memory.object("css/app.css").await.is_some());
        // A failed run never publishes the manifest.
        assert!(memory.object("asset-map.json").await.is_none());

        // The syncer is reusable once the store recovers.
        memory.recover("img/logo.png");
        memory.clear_log();
        syncer.run().await.unwrap();
        assert!(memory.puts().contains(&"img/logo.png".to_string()));
        assert!(memory.puts().contains(&"asset-map.json".to_string()));
        assert!(!memory.puts().contains(&"css/app.css".to_string()));
    }

    #[tokio::test]
    async fn context_is_reset_after_every_run() {
        let dir = site();
        let (mut syncer, _memory) = build(SyncOptions::new(dir.path()));
        syncer.run().await.unwrap();
        assert!(syncer.context.is_empty());

        std::fs::remove_dir_all(dir.path()).unwrap();
        let err = syncer.run().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(syncer.context.is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let dir = site();
        let (mut syncer, memory) = build(SyncOptions::new(dir.path()));
        let token = CancellationToken::new();
        token.cancel();
        let err = syncer.run_until_cancelled(&token).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
        assert!(memory.puts().is_empty());
        assert!(syncer.context.is_empty());
    }

    #[tokio::test]
    async fn cancelled_mid_sync_finishes_in_flight_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "first");
        write(dir.path(), "b.txt", "second");
        write(dir.path(), "c.txt", "third");
        let memory = Arc::new(MemoryBackend::default());
        let token = CancellationToken::new();
        let store = Arc::new(CancelOnPut { inner: memory.clone(), token: token.clone() });
        let options = SyncOptions { concurrency: 1, ..SyncOptions::new(dir.path()) };
        let mut syncer = Syncer::new(store, options).unwrap();

        let err = syncer.run_until_cancelled(&token).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
        // Both variants of the file in flight complete; nothing after it starts.
        let mut puts = memory.puts();
        puts.sort();
        assert_eq!(puts, vec![format!("a-{}.txt", hash_bytes(b"first")), "a.txt".to_string()]);
        assert!(memory.object("asset-map.json").await.is_none());
        assert!(syncer.context.is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_while_digesting_is_io() {
        let dir = site();
        let options = SyncOptions::new(dir.path());
        let mut context = RunContext::default();
        context.files.push(dir.path().join("css/gone.css"));
        let err = digest_files(&options, &mut context).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(path) if path.ends_with("css/gone.css")));
    }

    #[test]
    fn invalid_options_fail_before_io() {
        let memory = Arc::new(MemoryBackend::default());
        let options = SyncOptions { concurrency: 0, ..SyncOptions::new("/does/not/exist") };
        let Err(err) = Syncer::new(memory, options) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }
}
