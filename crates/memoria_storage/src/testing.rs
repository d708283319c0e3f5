// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock storage implementation for testing.
//!
//! This module provides `MockStorage`, a configurable in-memory storage that
//! records all operations and supports failure injection for testing error paths.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{BatchStorage, CacheOptions, Error, Storage, SyncStorage};

/// Recorded storage operation with full context.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOp<V> {
    /// A single-key read of the given key.
    Get(String),
    /// A single-key write. `value` is `None` for deletions.
    Set {
        /// The key that was written.
        key: String,
        /// The value that was written.
        value: Option<V>,
        /// Options passed with the write, if any.
        options: Option<CacheOptions>,
    },
    /// A batch read of the given keys.
    GetMany(Vec<String>),
    /// A batch write of the given entries.
    SetMany(Vec<(String, Option<V>)>),
    /// A clear operation.
    Clear,
}

type FailPredicate<V> = Box<dyn Fn(&StorageOp<V>) -> bool + Send + Sync>;

/// A configurable mock storage for testing.
///
/// This storage keeps values in memory and can be configured to fail
/// operations on demand, making it useful for testing error handling paths.
/// All operations are recorded for later verification. Clones share state.
///
/// `MockStorage` implements [`Storage`], [`BatchStorage`], and [`SyncStorage`].
///
/// # Examples
///
/// ```ignore
/// use memoria_storage::{Storage, testing::{MockStorage, StorageOp}};
///
/// # futures::executor::block_on(async {
/// let storage = MockStorage::<i32>::new();
///
/// storage.set("key", Some(42)).await.unwrap();
/// assert_eq!(storage.get("key").await.unwrap(), Some(42));
///
/// // Fail every read from now on
/// storage.fail_when(|op| matches!(op, StorageOp::Get(_)));
/// assert!(storage.get("key").await.is_err());
/// # });
/// ```
pub struct MockStorage<V> {
    data: Arc<Mutex<HashMap<String, V>>>,
    operations: Arc<Mutex<Vec<StorageOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
}

impl<V> std::fmt::Debug for MockStorage<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStorage")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<V> Clone for MockStorage<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> Default for MockStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockStorage<V> {
    /// Creates a new empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(HashMap::new())
    }

    /// Creates a mock storage with pre-populated data.
    #[must_use]
    pub fn with_data(data: HashMap<String, V>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of entries held.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the storage holds the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should fail.
    /// Failed operations are still recorded but leave the data untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StorageOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn should_fail(&self, op: &StorageOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    /// Records the operation, returning an error if it was configured to fail.
    fn admit(&self, op: StorageOp<V>, what: &'static str) -> Result<(), Error> {
        let fail = self.should_fail(&op);
        self.operations.lock().push(op);
        if fail {
            return Err(Error::from_message(format!("mock: {what} failed")));
        }
        Ok(())
    }
}

impl<V> MockStorage<V>
where
    V: Clone,
{
    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp<V>> {
        self.operations.lock().clone()
    }

    /// Returns a clone of the value stored under `key`, bypassing recording and failure injection.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        self.data.lock().get(key).cloned()
    }

    fn read(&self, key: &str) -> Result<Option<V>, Error> {
        self.admit(StorageOp::Get(key.to_string()), "get")?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: Option<V>, options: Option<CacheOptions>) -> Result<(), Error> {
        self.admit(
            StorageOp::Set {
                key: key.to_string(),
                value: value.clone(),
                options,
            },
            "set",
        )?;
        let mut data = self.data.lock();
        match value {
            Some(value) => {
                data.insert(key.to_string(), value);
            }
            None => {
                data.remove(key);
            }
        }
        Ok(())
    }

    fn wipe(&self) -> Result<(), Error> {
        self.admit(StorageOp::Clear, "clear")?;
        self.data.lock().clear();
        Ok(())
    }
}

impl<V> Storage<V> for MockStorage<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        self.write(key, value, None)
    }

    async fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        self.write(key, value, Some(*options))
    }

    async fn clear(&self) -> Result<(), Error> {
        self.wipe()
    }
}

impl<V> SyncStorage<V> for MockStorage<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, Error> {
        self.read(key)
    }

    fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        self.write(key, value, None)
    }

    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        self.write(key, value, Some(*options))
    }

    fn clear(&self) -> Result<(), Error> {
        self.wipe()
    }
}

impl<V> BatchStorage<V> for MockStorage<V>
where
    V: Clone + Send + Sync,
{
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<V>>, Error> {
        self.admit(StorageOp::GetMany(keys.to_vec()), "get_many")?;
        let data = self.data.lock();
        Ok(keys.iter().map(|key| data.get(key).cloned()).collect())
    }

    async fn set_many(&self, entries: Vec<(String, Option<V>)>, _options: &CacheOptions) -> Result<(), Error> {
        self.admit(StorageOp::SetMany(entries.clone()), "set_many")?;
        let mut data = self.data.lock();
        for (key, value) in entries {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.wipe()
    }
}
