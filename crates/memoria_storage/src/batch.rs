// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Batch storage contract used by multi-tier cascades.

use std::sync::Arc;

use crate::{CacheOptions, Error, Storage};

/// Asynchronous batch storage.
///
/// Each tier of a multi-tier cascade is a `BatchStorage`. `get_many` returns one
/// slot per requested key, in request order, so callers can line results up with
/// the keys they asked for.
#[dynosaur::dynosaur(pub(crate) DynBatchStorage = dyn(box) BatchStorage, bridge(none))]
pub trait BatchStorage<V>: Send + Sync {
    /// Reads several keys at once. The result has exactly `keys.len()` slots.
    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<Option<V>>, Error>> + Send;

    /// Writes several entries at once. A `None` value deletes its key.
    fn set_many(&self, entries: Vec<(String, Option<V>)>, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes all entries.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Adapts a single-key [`Storage`] into a [`BatchStorage`].
///
/// Batch operations are issued as sequential single-key calls, and the first
/// failing call aborts the batch.
///
/// # Examples
///
/// ```
/// use memoria_storage::{BatchStorage, Batched, CacheOptions, Error, Storage};
/// # use std::collections::HashMap;
/// # use std::sync::Mutex;
/// # #[derive(Default)]
/// # struct Simple(Mutex<HashMap<String, i32>>);
/// # impl Storage<i32> for Simple {
/// #     async fn get(&self, key: &str) -> Result<Option<i32>, Error> { Ok(self.0.lock().unwrap().get(key).copied()) }
/// #     async fn set(&self, key: &str, value: Option<i32>) -> Result<(), Error> {
/// #         let mut map = self.0.lock().unwrap();
/// #         match value { Some(v) => { map.insert(key.to_string(), v); } None => { map.remove(key); } }
/// #         Ok(())
/// #     }
/// #     async fn clear(&self) -> Result<(), Error> { self.0.lock().unwrap().clear(); Ok(()) }
/// # }
/// # futures::executor::block_on(async {
/// let tier = Batched::new(Simple::default());
/// tier.set_many(vec![("a".to_string(), Some(1))], &CacheOptions::default()).await?;
///
/// let found = tier.get_many(&["a".to_string(), "b".to_string()]).await?;
/// assert_eq!(found, vec![Some(1), None]);
/// # Ok::<(), Error>(())
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct Batched<S>(S);

impl<S> Batched<S> {
    /// Wraps a single-key storage.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self(storage)
    }

    /// Returns a reference to the wrapped storage.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.0
    }

    /// Consumes the adapter and returns the wrapped storage.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.0
    }
}

impl<V, S> BatchStorage<V> for Batched<S>
where
    V: Send,
    S: Storage<V>,
{
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<V>>, Error> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.0.get(key).await?);
        }
        Ok(values)
    }

    async fn set_many(&self, entries: Vec<(String, Option<V>)>, options: &CacheOptions) -> Result<(), Error> {
        for (key, value) in entries {
            self.0.set_with(&key, value, options).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }
}

impl<V, S> BatchStorage<V> for Arc<S>
where
    S: BatchStorage<V> + ?Sized,
{
    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<Option<V>>, Error>> + Send {
        (**self).get_many(keys)
    }

    fn set_many(&self, entries: Vec<(String, Option<V>)>, options: &CacheOptions) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set_many(entries, options)
    }

    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).clear()
    }
}
