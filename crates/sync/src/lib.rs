//! Hashed static-asset synchronisation.
//!
//! A [`Syncer`] runs four strictly ordered phases against a local directory
//! and an [`ObjectStore`](cachet_storage::ObjectStore):
//!
//! 1. **Gather**: walk the base path, honouring ignore globs.
//! 2. **Digest**: hash every file and derive its hashed key.
//! 3. **Sync**: upload each file's original and hashed variants, rewriting
//!    references in stylesheets and scripts, skipping anything the store
//!    already holds.
//! 4. **Publish**: upload the digest as a JSON manifest.
//!
//! Per-run state is discarded after every run, successful or not, so one
//! [`Syncer`] can be run repeatedly.

mod context;
pub mod error;
mod headers;
mod options;
mod report;
mod syncer;
mod upload;
mod walk;

pub use crate::options::SyncOptions;
pub use crate::report::{Outcome, SkipReason, SyncReport, UploadRecord, Variant};
pub use crate::syncer::{Syncer, build_digest};
pub use crate::walk::list_files;
pub use tokio_util::sync::CancellationToken;
