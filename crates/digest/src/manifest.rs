use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Relative original name to destination key.
///
/// Ordered, so the serialised manifest is byte-for-byte stable for the same
/// set of files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(BTreeMap<String, String>);

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative: &str) -> Option<&str> {
        self.0.get(relative).map(String::as_str)
    }

    /// Record a mapping, replacing any previous value.
    pub fn insert(&mut self, relative: impl Into<String>, key: impl Into<String>) -> Option<String> {
        self.0.insert(relative.into(), key.into())
    }

    /// Record a mapping only if the name is not mapped yet. Returns whether
    /// the mapping was recorded.
    pub fn insert_if_absent(&mut self, relative: impl Into<String>, key: impl Into<String>) -> bool {
        match self.0.entry(relative.into()) {
            Entry::Vacant(entry) => {
                entry.insert(key.into());
                true
            },
            Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(relative, key)| (relative.as_str(), key.as_str()))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).or_raise(|| ErrorKind::Manifest)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).or_raise(|| ErrorKind::Manifest)
    }
}

impl FromIterator<(String, String)> for Digest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
