use crate::error::{ErrorKind, Result};
use cachet_config::Target;
use cachet_storage::StoreHandle;
use cachet_storage::backend::{LocalBackend, S3Backend};
use exn::ResultExt;
use std::sync::Arc;

/// Open the store described by a validated target.
pub fn connect(target: &Target) -> Result<StoreHandle> {
    let store: StoreHandle = match target {
        Target::S3 { bucket, prefix, region, endpoint, key_id, key_secret } => Arc::new(
            S3Backend::new(
                target.name(),
                bucket,
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id.clone().unwrap_or_default(),
                key_secret.clone().unwrap_or_default(),
            )
            .or_raise(|| ErrorKind::Store)?,
        ),
        Target::Local { path } => Arc::new(LocalBackend::new(target.name(), path).or_raise(|| ErrorKind::Store)?),
    };
    Ok(store)
}
