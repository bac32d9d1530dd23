use cachet_storage::ObjectHeaders;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headers as written in configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Headers {
    pub acl: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl From<Headers> for ObjectHeaders {
    fn from(headers: Headers) -> Self {
        Self {
            acl: headers.acl,
            content_type: headers.content_type,
            cache_control: headers.cache_control,
            content_encoding: headers.content_encoding,
            metadata: headers.metadata,
        }
    }
}
