//! Remote object storage for hashed assets.
//!
//! Everything the sync pipeline needs from a bucket fits in two calls: a
//! conditional check ("does the object at this key already carry this
//! fingerprint?") and a whole-object put. Backends implement
//! [`ObjectStore`]; the pipeline holds them behind a [`StoreHandle`].

pub mod backend;
pub mod error;
mod key;
mod models;

pub use crate::backend::ObjectStore;
pub use crate::key::validate as validate_key;
pub use crate::models::{Body, Condition, ObjectHeaders};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ObjectStore + Send + Sync>;

/// Compute the ETag that S3 reports for a single-part upload of `data`
/// (lowercase hex MD5, without the surrounding quotes).
pub fn etag(data: &[u8]) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_md5_hex() {
        assert_eq!(etag(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(etag(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }
}
