// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the storage contracts' provided methods and the `Batched` adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{Value, json};

use memoria_storage::{BatchStorage, Batched, CacheOptions, DynamicStorage, DynamicStorageExt, Error, Storage, SyncStorage};

/// Minimal implementation that only provides required methods
struct MinimalStorage<V> {
    data: Mutex<HashMap<String, V>>,
}

impl<V> Default for MinimalStorage<V> {
    fn default() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> Storage<V> for MinimalStorage<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        Ok(self.data.lock().expect("lock poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        let mut data = self.data.lock().expect("lock poisoned");
        match value {
            Some(value) => data.insert(key.to_string(), value),
            None => data.remove(key),
        };
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").clear();
        Ok(())
    }
}

/// Storage whose every operation fails
struct BrokenStorage;

impl Storage<i32> for BrokenStorage {
    async fn get(&self, _key: &str) -> Result<Option<i32>, Error> {
        Err(Error::from_message("get refused"))
    }

    async fn set(&self, _key: &str, _value: Option<i32>) -> Result<(), Error> {
        Err(Error::from_message("set refused"))
    }

    async fn clear(&self) -> Result<(), Error> {
        Err(Error::from_message("clear refused"))
    }
}

#[derive(Default)]
struct MinimalSyncStorage {
    data: Mutex<HashMap<String, bool>>,
}

impl SyncStorage<bool> for MinimalSyncStorage {
    fn get(&self, key: &str) -> Result<Option<bool>, Error> {
        Ok(self.data.lock().expect("lock poisoned").get(key).copied())
    }

    fn set(&self, key: &str, value: Option<bool>) -> Result<(), Error> {
        let mut data = self.data.lock().expect("lock poisoned");
        match value {
            Some(value) => data.insert(key.to_string(), value),
            None => data.remove(key),
        };
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").clear();
        Ok(())
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn falsy_values_round_trip() {
    let storage = MinimalStorage::<Value>::default();

    for (key, value) in [
        ("false", json!(false)),
        ("zero", json!(0)),
        ("empty", json!("")),
        ("null", Value::Null),
        ("empty_list", json!([])),
    ] {
        storage.set(key, Some(value.clone())).await.expect("set failed");
        assert_eq!(storage.get(key).await.expect("get failed"), Some(value));
    }
}

#[tokio::test]
async fn default_delete_removes_key() {
    let storage = MinimalStorage::<i32>::default();
    storage.set("key", Some(42)).await.expect("set failed");

    storage.delete("key").await.expect("delete failed");

    assert_eq!(storage.get("key").await.expect("get failed"), None);
}

#[tokio::test]
async fn setting_no_value_deletes_key() {
    let storage = MinimalStorage::<i32>::default();
    storage.set("key", Some(42)).await.expect("set failed");

    storage.set("key", None).await.expect("set failed");

    assert_eq!(storage.get("key").await.expect("get failed"), None);
}

#[tokio::test]
async fn default_set_with_ignores_options() {
    let storage = MinimalStorage::<i32>::default();

    storage
        .set_with("key", Some(7), &CacheOptions::new().ttl(-1.0).eager())
        .await
        .expect("set_with failed");

    assert_eq!(storage.get("key").await.expect("get failed"), Some(7));
}

#[tokio::test]
async fn batched_get_many_aligns_with_request() {
    let tier = Batched::new(MinimalStorage::<i32>::default());
    tier.inner().set("b", Some(2)).await.expect("set failed");

    let found = tier.get_many(&keys(&["a", "b", "c", "b"])).await.expect("get_many failed");

    assert_eq!(found, vec![None, Some(2), None, Some(2)]);
}

#[tokio::test]
async fn batched_set_many_writes_and_deletes() {
    let tier = Batched::new(MinimalStorage::<i32>::default());
    tier.inner().set("stale", Some(0)).await.expect("set failed");

    tier.set_many(
        vec![("fresh".to_string(), Some(1)), ("stale".to_string(), None)],
        &CacheOptions::default(),
    )
    .await
    .expect("set_many failed");

    let storage = tier.into_inner();
    assert_eq!(storage.get("fresh").await.expect("get failed"), Some(1));
    assert_eq!(storage.get("stale").await.expect("get failed"), None);
}

#[tokio::test]
async fn batched_clear_delegates() {
    let tier = Batched::new(MinimalStorage::<i32>::default());
    tier.inner().set("key", Some(1)).await.expect("set failed");

    BatchStorage::clear(&tier).await.expect("clear failed");

    assert_eq!(tier.inner().get("key").await.expect("get failed"), None);
}

#[tokio::test]
async fn batched_propagates_first_failure() {
    let tier = Batched::new(BrokenStorage);

    let err = tier.get_many(&keys(&["a"])).await.expect_err("get_many should fail");
    assert!(err.to_string().contains("get refused"));

    let err = tier
        .set_many(vec![("a".to_string(), Some(1))], &CacheOptions::default())
        .await
        .expect_err("set_many should fail");
    assert!(err.to_string().contains("set refused"));
}

#[tokio::test]
async fn batched_tier_can_be_erased() {
    let dynamic: DynamicStorage<i32> = Batched::new(MinimalStorage::<i32>::default()).into_dynamic();

    dynamic
        .set_many(vec![("key".to_string(), Some(5))], &CacheOptions::default())
        .await
        .expect("set_many failed");

    assert_eq!(dynamic.get_many(&keys(&["key"])).await.expect("get_many failed"), vec![Some(5)]);
}

#[test]
fn sync_storage_provided_methods() {
    let storage = MinimalSyncStorage::default();

    storage.set_with("flag", Some(false), &CacheOptions::default()).expect("set_with failed");
    assert_eq!(storage.get("flag").expect("get failed"), Some(false));

    storage.delete("flag").expect("delete failed");
    assert_eq!(storage.get("flag").expect("get failed"), None);
}
