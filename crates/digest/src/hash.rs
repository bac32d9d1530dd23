//! Content fingerprints.
//!
//! The fingerprint is an MD5 digest: for a single-part upload it is exactly
//! the ETag the object store reports, which is what lets the conditional
//! check recognise content it has already seen.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use md5::{Digest as _, Md5};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::io::{Read, Write};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::instrument;

const CHUNK_SIZE: usize = 64 * 1024;

/// A 128-bit content fingerprint, rendered as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.to_hex())
    }
}

impl Debug for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "ContentHash({self})")
    }
}

/// Incremental hasher; also a [`Write`] sink so encoders can stream into it.
#[derive(Clone, Default)]
pub struct Hasher(Md5);

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(self.0.finalize().into())
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finish()
}

pub fn hash_str(data: &str) -> ContentHash {
    hash_bytes(data.as_bytes())
}

/// Hash everything a reader yields.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<ContentHash> {
    let mut hasher = Hasher::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finish())
}

/// Hash a file's content without holding all of it in memory.
#[instrument(level = "debug", fields(path = %path.display()))]
pub async fn hash_file(path: &Path) -> Result<ContentHash> {
    let mut file = tokio::fs::File::open(path)
        .await
        .or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finish())
}
