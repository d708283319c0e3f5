// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory storage implementation using moka.

use memoria_storage::{BatchStorage, CacheOptions, Error, Storage, SyncStorage};
use moka::sync::Cache;

use crate::builder::MemoryStorageBuilder;

/// An in-memory storage backed by moka.
///
/// Clones share the same underlying map, so a test or a caller can keep a handle
/// for direct inspection while an engine owns another.
///
/// The storage never fails: every operation returns `Ok`.
///
/// # Examples
///
/// ```
/// use memoria_memory::MemoryStorage;
/// use memoria_storage::SyncStorage;
///
/// let storage = MemoryStorage::<bool>::new();
/// storage.set("flag", Some(false)).unwrap();
/// assert_eq!(storage.get("flag").unwrap(), Some(false));
/// ```
#[derive(Clone)]
pub struct MemoryStorage<V> {
    inner: Cache<String, V>,
}

impl<V> std::fmt::Debug for MemoryStorage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

impl<V> Default for MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory storage holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory storage.
    #[must_use]
    pub fn builder() -> MemoryStorageBuilder<V> {
        MemoryStorageBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryStorageBuilder<V>) -> Self {
        let mut moka_builder = Cache::builder();

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(ttl) = builder.time_to_live {
            moka_builder = moka_builder.time_to_live(ttl);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }

    /// Returns an approximate entry count.
    ///
    /// Moka updates its counters lazily, so the value may trail recent writes.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    fn read(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    fn write(&self, key: &str, value: Option<V>) {
        match value {
            Some(value) => self.inner.insert(key.to_string(), value),
            None => self.inner.invalidate(key),
        }
    }
}

impl<V> Storage<V> for MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        self.write(key, value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.invalidate_all();
        Ok(())
    }
}

impl<V> SyncStorage<V> for MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Result<Option<V>, Error> {
        Ok(self.read(key))
    }

    fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        self.write(key, value);
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.inner.invalidate_all();
        Ok(())
    }
}

impl<V> BatchStorage<V> for MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<V>>, Error> {
        Ok(keys.iter().map(|key| self.read(key)).collect())
    }

    async fn set_many(&self, entries: Vec<(String, Option<V>)>, _options: &CacheOptions) -> Result<(), Error> {
        for (key, value) in entries {
            self.write(&key, value);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.invalidate_all();
        Ok(())
    }
}
