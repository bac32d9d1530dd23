//! Per-upload headers.
//!
//! Caller-supplied headers are the base; the content type and encoding are
//! always derived from the asset itself and cannot be overridden.

use crate::options::SyncOptions;
use cachet_compress::Compression;
use cachet_digest::{Classification, FileEntry};
use cachet_storage::ObjectHeaders;

const MANIFEST_CONTENT_TYPE: &str = "application/json";

fn asset(options: &SyncOptions, classification: Classification, gzip: bool) -> ObjectHeaders {
    let mut headers = options.headers.clone();
    if gzip {
        headers.merge(&options.gzip_headers);
    }
    headers.content_type = Some(classification.kind.mime().to_string());
    headers.content_encoding = Compression::Gzip.content_encoding().filter(|_| gzip).map(String::from);
    headers
}

pub(crate) fn original(options: &SyncOptions, entry: &FileEntry) -> ObjectHeaders {
    asset(options, entry.classification, entry.classification.is_gzip())
}

pub(crate) fn hashed(options: &SyncOptions, entry: &FileEntry) -> ObjectHeaders {
    let gzip = entry.classification.is_gzip() || entry.gzip_on_hash;
    let mut headers = asset(options, entry.classification, gzip);
    if let Some(cache_control) = &options.hashed_cache_control {
        headers.cache_control = Some(cache_control.clone());
    }
    headers
}

pub(crate) fn manifest(options: &SyncOptions) -> ObjectHeaders {
    let mut headers = options.headers.clone();
    headers.content_type = Some(MANIFEST_CONTENT_TYPE.to_string());
    headers.content_encoding = None;
    headers
}
