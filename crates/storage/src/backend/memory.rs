//! In-memory object store for testing.

use crate::backend::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Body, Condition, ObjectHeaders};
use crate::{etag, validate_key};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;

/// An object held by [`MemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub etag: String,
    pub data: Vec<u8>,
    pub headers: ObjectHeaders,
}

/// In-memory object store for testing.
///
/// Objects live in a `HashMap` behind a [`RwLock`], so all trait methods
/// operate on `&self`. Every `check` and `put` is recorded, so tests can
/// assert exactly which remote calls a sync issued, and individual keys can
/// be made to fail to exercise error propagation.
///
/// Enabled by the `mock` feature, intended for other crates' dev
/// dependencies.
pub struct MemoryBackend {
    name: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    checks: Mutex<Vec<String>>,
    puts: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryBackend {
    /// Create a backend pre-populated with objects.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl AsRef<[u8]>)>) -> Self {
        let mut map = HashMap::new();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MemoryBackend is intended to
                // be used in tests; panics are expected.
                panic!("MemoryBackend::with_objects: invalid key {key}");
            };
            let data = data.as_ref().to_vec();
            map.insert(validated, StoredObject { etag: etag(&data), data, headers: ObjectHeaders::default() });
        }
        Self {
            name: "memory".to_string(),
            objects: RwLock::new(map),
            checks: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make every `check` and `put` against `key` fail with a network error.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failing.lock().unwrap().insert(key.into());
    }

    /// Undo [`fail_on`](Self::fail_on).
    pub fn recover(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }

    /// Keys passed to `check`, in call order.
    pub fn checks(&self) -> Vec<String> {
        self.checks.lock().unwrap().clone()
    }

    /// Keys passed to `put`, in call order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    /// Forget recorded calls (stored objects are kept).
    pub fn clear_log(&self) {
        self.checks.lock().unwrap().clear();
        self.puts.lock().unwrap().clear();
    }

    /// Fetch a stored object.
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn fail_if_requested(&self, key: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            exn::bail!(ErrorKind::Network(format!("injected failure for {key}")));
        }
        Ok(())
    }
}
impl Default for MemoryBackend {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, key: &str, etag: &str) -> Result<Condition> {
        let key = validate_key(key)?;
        self.checks.lock().unwrap().push(key.clone());
        self.fail_if_requested(&key)?;
        Ok(match self.objects.read().await.get(&key) {
            None => Condition::Missing,
            Some(object) if object.etag == etag => Condition::Unchanged,
            Some(_) => Condition::Changed,
        })
    }

    async fn put(&self, key: &str, body: Body, headers: &ObjectHeaders) -> Result<()> {
        let key = validate_key(key)?;
        self.puts.lock().unwrap().push(key.clone());
        self.fail_if_requested(&key)?;
        let data = body.into_bytes().await?;
        let object = StoredObject { etag: etag(&data), data, headers: headers.clone() };
        self.objects.write().await.insert(key, object);
        Ok(())
    }
}
