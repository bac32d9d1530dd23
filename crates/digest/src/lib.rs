//! The digest pipeline: everything between "a file on disk" and "the key it
//! will be uploaded under".
//!
//! - [`hash`] computes the content fingerprint of files, streams and strings.
//! - [`classify`] maps a file name onto a [`ContentKind`] and [`Compression`].
//! - [`DigestBuilder`] derives relative names, destination keys and hashed
//!   keys, producing the [`Digest`] manifest and one [`FileEntry`] per file.
//! - [`rewrite`] points stylesheet `url()` references and sourcemap comments
//!   at the hashed keys recorded in a completed [`Digest`].
//!
//! The [`Digest`] must be complete before anything is rewritten: a
//! stylesheet may reference an image that is discovered after it.

mod builder;
mod consts;
pub mod error;
pub mod hash;
mod key;
mod kind;
mod manifest;
mod mime;
pub mod rewrite;

pub use crate::builder::{DigestBuilder, DigestRules, FileEntry, PrehashedNames};
pub use crate::hash::{ContentHash, Hasher};
pub use crate::key::{basename, destination_key, insert_hash_before_extension, relative_name};
pub use crate::kind::{Classification, ContentKind, classify};
pub use crate::manifest::Digest;
pub use crate::rewrite::{Rewrite, rewrite, rewrite_file};
pub use cachet_compress::Compression;
