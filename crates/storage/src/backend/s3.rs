//! S3-compatible object store.
//!
//! This module provides an [`ObjectStore`] implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file (or the
//! environment, through the configuration loader). There is no fallback to
//! the AWS credential provider chain.
//!
//! # Conditional checks
//!
//! S3 reports the hex MD5 of a single-part upload as the object's `ETag`.
//! [`check`](ObjectStore::check) sends a `HeadObject` request with
//! `If-None-Match` set to the local fingerprint: `304 Not Modified` means the
//! object is already up to date, `404 Not Found` means there is nothing there
//! yet, and a plain `200` means the object exists with different content.
//! Some S3-compatible services ignore `If-None-Match` on `HEAD` and always
//! answer `200`, so the returned `ETag` is compared as well.

use crate::backend::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Body, Condition, ObjectHeaders};
use crate::validate_key;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use exn::ResultExt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible object store.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use cachet_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "production",
///     "my-assets-bucket",
///     Some("static/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.filter(|p| !p.trim_matches('/').is_empty()).map(|p| validate_key(&p)).transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "cachet-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &str) -> Result<String> {
        Ok(join_key(self.prefix.as_deref(), &validate_key(key)?))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
        None => key.to_string(),
    }
}

/// ETags travel as quoted strings in HTTP conditional headers.
fn quote_etag(etag: &str) -> String {
    format!("\"{}\"", etag.trim_matches('"'))
}

/// Condition of an object that exists, judged by the `ETag` it reports.
fn compare_etag(remote: Option<&str>, local: &str) -> Condition {
    match remote {
        Some(remote) if remote.trim_matches('"').eq_ignore_ascii_case(local.trim_matches('"')) => Condition::Unchanged,
        _ => Condition::Changed,
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, key: &str, etag: &str) -> Result<Condition> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .if_none_match(quote_etag(etag))
            .send()
            .await;
        match response {
            Ok(head) => Ok(compare_etag(head.e_tag(), etag)),
            Err(err) => {
                let not_found = err.as_service_error().is_some_and(|e| e.is_not_found());
                match err.raw_response().map(|r| r.status().as_u16()) {
                    Some(304) => Ok(Condition::Unchanged),
                    Some(404) => Ok(Condition::Missing),
                    _ if not_found => Ok(Condition::Missing),
                    _ => exn::bail!(ErrorKind::Network(format!(
                        "HEAD s3://{}/{}: {}",
                        self.bucket,
                        full_key,
                        DisplayErrorContext(&err)
                    ))),
                }
            },
        }
    }

    async fn put(&self, key: &str, body: Body, headers: &ObjectHeaders) -> Result<()> {
        let full_key = self.full_key(key)?;
        let stream = match body {
            Body::Bytes(bytes) => ByteStream::from(bytes),
            Body::File(path) => ByteStream::from_path(&path)
                .await
                .or_raise(|| ErrorKind::BackendError(format!("unable to open {} for upload", path.display())))?,
        };
        let metadata = (!headers.metadata.is_empty())
            .then(|| headers.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        let _permit = self.acquire_permit().await;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(stream)
            .set_acl(headers.acl.as_deref().map(ObjectCannedAcl::from))
            .set_content_type(headers.content_type.clone())
            .set_cache_control(headers.cache_control.clone())
            .set_content_encoding(headers.content_encoding.clone())
            .set_metadata(metadata)
            .send()
            .await
            .map_err(|err| {
                ErrorKind::Network(format!("PUT s3://{}/{}: {}", self.bucket, full_key, DisplayErrorContext(&err)))
            })?;
        tracing::debug!(store = %self.name, bucket = %self.bucket, key = %full_key, "Uploaded object");
        Ok(())
    }
}
