use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// The store assets are uploaded to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Target {
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        /// Prepended to every key, including the manifest.
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        /// Custom endpoint for S3-compatible services.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        key_id: Option<String>,
        #[serde(default)]
        key_secret: Option<String>,
    },
    /// A local directory laid out like a bucket.
    Local { path: PathBuf },
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::Local { .. } => "local",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::S3 { bucket, key_id, key_secret, .. } => {
                if bucket.trim().is_empty() {
                    exn::bail!(ErrorKind::Missing("target.bucket"));
                }
                if key_id.as_deref().is_none_or(str::is_empty) {
                    exn::bail!(ErrorKind::Missing("target.key_id"));
                }
                if key_secret.as_deref().is_none_or(str::is_empty) {
                    exn::bail!(ErrorKind::Missing("target.key_secret"));
                }
            },
            Self::Local { path } => {
                if !path.is_absolute() {
                    exn::bail!(ErrorKind::Invalid(format!(
                        "local target must be an absolute path, got {}",
                        path.display()
                    )));
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn s3(bucket: &str, key_id: Option<&str>, key_secret: Option<&str>) -> Target {
        Target::S3 {
            bucket: bucket.to_string(),
            prefix: None,
            region: default_region(),
            endpoint: None,
            key_id: key_id.map(String::from),
            key_secret: key_secret.map(String::from),
        }
    }

    #[rstest]
    #[case(s3("static", Some("id"), Some("secret")), true)]
    #[case(s3("", Some("id"), Some("secret")), false)]
    #[case(s3("static", None, Some("secret")), false)]
    #[case(s3("static", Some("id"), Some("")), false)]
    #[case(Target::Local { path: PathBuf::from("/var/www/assets") }, true)]
    #[case(Target::Local { path: PathBuf::from("relative/assets") }, false)]
    fn validation(#[case] target: Target, #[case] valid: bool) {
        assert_eq!(target.validate().is_ok(), valid);
    }

    #[test]
    fn names() {
        assert_eq!(s3("static", None, None).name(), "static");
        assert_eq!(Target::Local { path: PathBuf::from("/tmp") }.name(), "local");
    }
}
