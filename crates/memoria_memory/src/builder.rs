// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory storages.
//!
//! This module provides a builder API for `MemoryStorage` that abstracts
//! the underlying moka configuration, providing a stable API surface
//! without exposing moka's types.

use std::marker::PhantomData;
use std::time::Duration;

use crate::storage::MemoryStorage;

/// Builder for configuring a `MemoryStorage`.
///
/// # Examples
///
/// ```
/// use memoria_memory::MemoryStorage;
/// use std::time::Duration;
///
/// let storage = MemoryStorage::<String>::builder()
///     .max_capacity(500)
///     .time_to_live(Duration::from_secs(86_400))
///     .name("canonical-urls")
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryStorageBuilder<V> {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<V>,
}

impl<V> Default for MemoryStorageBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStorageBuilder<V> {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration creates an unbounded storage with no
    /// time-based eviction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            time_to_live: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Once the capacity is reached, entries are evicted using moka's `TinyLFU`
    /// policy (LRU eviction with LFU admission).
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets a maximum age after which entries are dropped, independent of any
    /// expiration envelope written by `memoria`.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Sets a name that may appear in moka's debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured `MemoryStorage`.
    #[must_use]
    pub fn build(self) -> MemoryStorage<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        MemoryStorage::from_builder(&self)
    }
}
