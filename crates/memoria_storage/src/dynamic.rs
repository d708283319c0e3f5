// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-erased batch storage for heterogeneous tier lists.

use std::{fmt::Debug, sync::Arc};

use crate::{BatchStorage, CacheOptions, Error, batch::DynBatchStorage};

/// Extension trait for converting any `BatchStorage` into a `DynamicStorage`.
///
/// This trait is automatically implemented for all types that implement `BatchStorage`.
///
/// # Examples
///
/// ```
/// use memoria_storage::{BatchStorage, DynamicStorage, DynamicStorageExt};
///
/// fn erase<T>(tier: T) -> DynamicStorage<i32>
/// where
///     T: BatchStorage<i32> + 'static,
/// {
///     tier.into_dynamic()
/// }
/// ```
pub trait DynamicStorageExt<V>: Sized {
    /// Converts this storage into a `DynamicStorage`.
    fn into_dynamic(self) -> DynamicStorage<V>;
}

impl<V, T> DynamicStorageExt<V> for T
where
    T: BatchStorage<V> + 'static,
{
    fn into_dynamic(self) -> DynamicStorage<V> {
        DynamicStorage::new(self)
    }
}

/// A clonable batch storage with type erasure.
///
/// `DynamicStorage` wraps a trait object in an `Arc` so that tiers backed by
/// different storage types can live in one ordered list. Cloning shares the
/// same underlying storage.
pub struct DynamicStorage<V>(Arc<DynBatchStorage<'static, V>>);

impl<V> DynamicStorage<V> {
    /// Creates a new dynamic storage from any `BatchStorage` implementation.
    pub(crate) fn new<T>(storage: T) -> Self
    where
        T: BatchStorage<V> + Send + Sync + 'static,
    {
        Self(DynBatchStorage::new_arc(storage))
    }
}

impl<V> Debug for DynamicStorage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicStorage").finish()
    }
}

impl<V> Clone for DynamicStorage<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> BatchStorage<V> for DynamicStorage<V>
where
    V: Send,
{
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<V>>, Error> {
        self.0.get_many(keys).await
    }

    async fn set_many(&self, entries: Vec<(String, Option<V>)>, options: &CacheOptions) -> Result<(), Error> {
        self.0.set_many(entries, options).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStorage;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn dynamic_storage_forwards_to_inner() {
        block_on(async {
            let mock = MockStorage::<i32>::new();
            let dynamic: DynamicStorage<i32> = mock.clone().into_dynamic();

            dynamic
                .set_many(vec![("k".to_string(), Some(7))], &CacheOptions::default())
                .await
                .expect("set_many failed");

            assert!(mock.contains_key("k"));
            let found = dynamic.get_many(&["k".to_string()]).await.expect("get_many failed");
            assert_eq!(found, vec![Some(7)]);
        });
    }

    #[test]
    fn dynamic_storage_clones_share_state() {
        block_on(async {
            let dynamic: DynamicStorage<i32> = MockStorage::<i32>::new().into_dynamic();
            let clone = dynamic.clone();

            dynamic
                .set_many(vec![("k".to_string(), Some(1))], &CacheOptions::default())
                .await
                .expect("set_many failed");
            let found = clone.get_many(&["k".to_string()]).await.expect("get_many failed");
            assert_eq!(found, vec![Some(1)]);

            BatchStorage::clear(&clone).await.expect("clear failed");
            let found = dynamic.get_many(&["k".to_string()]).await.expect("get_many failed");
            assert_eq!(found, vec![None]);
        });
    }

    #[test]
    fn dynamic_storage_debug() {
        let dynamic: DynamicStorage<i32> = MockStorage::<i32>::new().into_dynamic();
        assert_eq!(format!("{dynamic:?}"), "DynamicStorage");
    }
}
