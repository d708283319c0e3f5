// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for TTL envelopes.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memoria::{CacheOptions, CacheSwitch, Envelope, Expiring, MemoryStorage, Memoized, Storage, SyncStorage};

fn expiring() -> (Expiring<MemoryStorage<Envelope<String>>, String>, MemoryStorage<Envelope<String>>) {
    let inner = MemoryStorage::new();
    (Expiring::new(inner.clone()), inner)
}

async fn raw(inner: &MemoryStorage<Envelope<String>>, key: &str) -> Option<Envelope<String>> {
    Storage::get(inner, key).await.expect("get failed")
}

#[tokio::test]
async fn lazy_entries_read_as_missing_after_ttl() {
    let (storage, inner) = expiring();
    let options = CacheOptions::new().ttl(0.001);

    Storage::set_with(&storage, "k", Some("v".to_string()), &options).await.expect("set failed");
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Still physically present until someone reads it.
    assert!(raw(&inner, "k").await.is_some());
    assert_eq!(Storage::get(&storage, "k").await.expect("get failed"), None);
    assert!(raw(&inner, "k").await.is_none());
}

#[tokio::test]
async fn zero_ttl_entries_are_missing_on_the_next_read() {
    let (storage, inner) = expiring();

    for attempt in 0..50 {
        let key = format!("k{attempt}");
        Storage::set_with(&storage, &key, Some("v".to_string()), &CacheOptions::new().ttl(0.0))
            .await
            .expect("set failed");

        assert_eq!(Storage::get(&storage, &key).await.expect("get failed"), None);
        assert!(raw(&inner, &key).await.is_none());
    }
}

#[tokio::test]
async fn negative_ttl_entries_are_missing_on_the_next_read() {
    let (storage, _inner) = expiring();

    Storage::set_with(&storage, "k", Some("v".to_string()), &CacheOptions::new().ttl(-1.0))
        .await
        .expect("set failed");

    assert_eq!(Storage::get(&storage, "k").await.expect("get failed"), None);
}

#[test]
fn zero_ttl_blocking_reads_are_missing() {
    let storage = Expiring::new(MemoryStorage::<Envelope<u8>>::new());

    SyncStorage::set_with(&storage, "k", Some(1), &CacheOptions::new().ttl(0.0)).expect("set failed");

    assert_eq!(SyncStorage::get(&storage, "k").expect("get failed"), None);
}

#[tokio::test]
async fn fresh_entries_are_returned() {
    let (storage, inner) = expiring();

    Storage::set_with(&storage, "k", Some("v".to_string()), &CacheOptions::new().ttl(60.0))
        .await
        .expect("set failed");

    assert_eq!(Storage::get(&storage, "k").await.expect("get failed").as_deref(), Some("v"));
    let envelope = raw(&inner, "k").await.expect("envelope missing");
    assert_eq!(envelope.meta().map(|meta| meta.ttl_millis()), Some(60_000));
}

#[tokio::test]
async fn eager_entries_are_removed_underneath() {
    let (storage, inner) = expiring();
    let options = CacheOptions::new().ttl(0.001).eager();

    Storage::set_with(&storage, "k", Some("v".to_string()), &options).await.expect("set failed");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(raw(&inner, "k").await.is_none());
}

#[tokio::test]
async fn forever_entries_survive() {
    let (storage, inner) = expiring();
    let options = CacheOptions::new().ttl(0.001).eager().forever();

    Storage::set_with(&storage, "k", Some("v".to_string()), &options).await.expect("set failed");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(Storage::get(&storage, "k").await.expect("get failed").as_deref(), Some("v"));
    assert!(raw(&inner, "k").await.expect("envelope missing").meta().is_none());
}

#[tokio::test]
async fn plain_set_uses_default_ttl() {
    let (storage, inner) = expiring();

    Storage::set(&storage, "k", Some("v".to_string())).await.expect("set failed");

    let envelope = raw(&inner, "k").await.expect("envelope missing");
    assert_eq!(envelope.meta().map(|meta| meta.ttl_millis()), Some(60_000));
}

#[tokio::test]
async fn setting_no_value_deletes_the_envelope() {
    let (storage, inner) = expiring();
    Storage::set(&storage, "k", Some("v".to_string())).await.expect("set failed");

    Storage::set(&storage, "k", None).await.expect("set failed");

    assert!(raw(&inner, "k").await.is_none());
}

#[test]
fn blocking_access_checks_expiry_too() {
    let inner = MemoryStorage::<Envelope<u8>>::new();
    let storage = Expiring::new(inner.clone());

    SyncStorage::set_with(&storage, "k", Some(1), &CacheOptions::new().ttl(0.001)).expect("set failed");
    std::thread::sleep(Duration::from_millis(10));

    assert_eq!(SyncStorage::get(&storage, "k").expect("get failed"), None);
    assert_eq!(SyncStorage::get(&inner, "k").expect("get failed"), None);
}

#[tokio::test]
async fn memoized_results_are_recomputed_after_expiry() {
    let runs = Arc::new(AtomicUsize::new(0));
    let clock = {
        let runs = Arc::clone(&runs);
        Memoized::builder(Expiring::new(MemoryStorage::<Envelope<usize>>::new()))
            .switch(CacheSwitch::Enabled)
            .options(CacheOptions::new().ttl(0.05))
            .build(move |(): ()| {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(Some(run)) }
            })
    };

    assert_eq!(clock.call(()).await, Ok(Some(0)));
    assert_eq!(clock.call(()).await, Ok(Some(0)));

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(clock.call(()).await, Ok(Some(1)));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
