// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `MemoryStorage` through the storage ports.

use std::time::Duration;

use memoria_memory::MemoryStorage;
use memoria_storage::{BatchStorage, CacheOptions, Storage};

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn stored_falsy_values_are_hits() {
    let storage = MemoryStorage::<Option<i32>>::new();

    Storage::set(&storage, "null", Some(None)).await.expect("set failed");
    Storage::set(&storage, "zero", Some(Some(0))).await.expect("set failed");

    assert_eq!(Storage::get(&storage, "null").await.expect("get failed"), Some(None));
    assert_eq!(Storage::get(&storage, "zero").await.expect("get failed"), Some(Some(0)));
    assert_eq!(Storage::get(&storage, "missing").await.expect("get failed"), None);
}

#[tokio::test]
async fn empty_string_round_trips() {
    let storage = MemoryStorage::<String>::new();

    Storage::set(&storage, "empty", Some(String::new())).await.expect("set failed");

    assert_eq!(Storage::get(&storage, "empty").await.expect("get failed"), Some(String::new()));
}

#[tokio::test]
async fn setting_no_value_deletes() {
    let storage = MemoryStorage::<i32>::new();
    Storage::set(&storage, "key", Some(1)).await.expect("set failed");

    Storage::set(&storage, "key", None).await.expect("set failed");

    assert_eq!(Storage::get(&storage, "key").await.expect("get failed"), None);
}

#[tokio::test]
async fn clear_removes_everything() {
    let storage = MemoryStorage::<i32>::new();
    Storage::set(&storage, "a", Some(1)).await.expect("set failed");
    Storage::set(&storage, "b", Some(2)).await.expect("set failed");

    Storage::clear(&storage).await.expect("clear failed");

    let found = storage.get_many(&keys(&["a", "b"])).await.expect("get_many failed");
    assert_eq!(found, vec![None, None]);
}

#[tokio::test]
async fn get_many_preserves_request_order() {
    let storage = MemoryStorage::<&'static str>::new();
    storage
        .set_many(
            vec![("x".to_string(), Some("ex")), ("z".to_string(), Some("zed"))],
            &CacheOptions::default(),
        )
        .await
        .expect("set_many failed");

    let found = storage.get_many(&keys(&["z", "y", "x"])).await.expect("get_many failed");

    assert_eq!(found, vec![Some("zed"), None, Some("ex")]);
}

#[tokio::test]
async fn set_many_with_no_value_deletes() {
    let storage = MemoryStorage::<i32>::new();
    Storage::set(&storage, "gone", Some(3)).await.expect("set failed");

    storage
        .set_many(vec![("gone".to_string(), None)], &CacheOptions::default())
        .await
        .expect("set_many failed");

    assert_eq!(Storage::get(&storage, "gone").await.expect("get failed"), None);
}

#[tokio::test]
async fn max_age_drops_old_entries() {
    let storage = MemoryStorage::<i32>::builder().time_to_live(Duration::from_millis(20)).build();
    Storage::set(&storage, "key", Some(1)).await.expect("set failed");

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(Storage::get(&storage, "key").await.expect("get failed"), None);
}
