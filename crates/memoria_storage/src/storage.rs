// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Single-key storage contracts.

use std::sync::Arc;

use crate::{CacheOptions, Error};

/// Asynchronous single-key storage.
///
/// All three core methods are required: `get`, `set`, and `clear`.
/// The provided methods have default implementations:
/// - `set_with`: ignores the options and delegates to `set`
/// - `delete`: writes "no value" through `set`
///
/// Implementations are responsible for any locking they need internally; the
/// engines issue concurrent logical operations against the same storage.
pub trait Storage<V>: Send + Sync {
    /// Reads a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Writes a value. Writing `None` deletes the key.
    fn set(&self, key: &str, value: Option<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes all entries.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Writes a value together with caching options.
    ///
    /// Storages without expiry support ignore the options.
    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send {
        let _ = options;
        self.set(key, value)
    }

    /// Deletes a key. Equivalent to `set(key, None)`.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send {
        self.set(key, None)
    }
}

/// Blocking single-key storage.
///
/// The synchronous counterpart of [`Storage`], used by call paths that never suspend.
pub trait SyncStorage<V>: Send + Sync {
    /// Reads a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> Result<Option<V>, Error>;

    /// Writes a value. Writing `None` deletes the key.
    fn set(&self, key: &str, value: Option<V>) -> Result<(), Error>;

    /// Removes all entries.
    fn clear(&self) -> Result<(), Error>;

    /// Writes a value together with caching options.
    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        let _ = options;
        self.set(key, value)
    }

    /// Deletes a key. Equivalent to `set(key, None)`.
    fn delete(&self, key: &str) -> Result<(), Error> {
        self.set(key, None)
    }
}

impl<V, S> Storage<V> for Arc<S>
where
    S: Storage<V> + ?Sized,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<V>, Error>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Option<V>) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set(key, value)
    }

    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).clear()
    }

    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set_with(key, value, options)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).delete(key)
    }
}

impl<V, S> SyncStorage<V> for Arc<S>
where
    S: SyncStorage<V> + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<V>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn clear(&self) -> Result<(), Error> {
        (**self).clear()
    }

    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        (**self).set_with(key, value, options)
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        (**self).delete(key)
    }
}
