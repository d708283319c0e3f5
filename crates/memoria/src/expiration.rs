// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! TTL envelopes layered over any storage.
//!
//! [`Expiring`] stores each value inside an [`Envelope`] that records when it was
//! written and for how long it stays valid. Reads check the envelope and treat a
//! stale entry as absent, deleting it on the way out. Writes made with an eager
//! [`CacheOptions`] also schedule a timer that deletes the entry once the TTL has
//! elapsed, which keeps storage that is never read again from filling up.

use std::{
    marker::PhantomData,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use memoria_storage::{CacheOptions, Error, Storage, SyncStorage};
use serde::{Deserialize, Serialize};

/// Creation time and lifetime of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    created_at: i64,
    #[serde(rename = "ttl")]
    ttl_millis: i64,
}

impl Meta {
    /// Creates metadata for a value written at `created_at` (milliseconds since
    /// the Unix epoch) that lives for `ttl_millis`.
    #[must_use]
    pub fn new(created_at: i64, ttl_millis: i64) -> Self {
        Self { created_at, ttl_millis }
    }

    /// Milliseconds since the Unix epoch at which the value was written.
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Lifetime in milliseconds.
    #[must_use]
    pub fn ttl_millis(&self) -> i64 {
        self.ttl_millis
    }

    /// Returns `true` if the value is stale at `now` (milliseconds since the Unix epoch).
    ///
    /// A zero or negative lifetime is stale at any time.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.ttl_millis <= 0 || now > self.created_at.saturating_add(self.ttl_millis)
    }
}

/// A stored value plus its optional expiry metadata.
///
/// An envelope without metadata never expires.
///
/// # Examples
///
/// ```
/// use memoria::{Envelope, Meta};
///
/// let forever = Envelope::forever("a");
/// assert!(!forever.is_expired_at(i64::MAX));
///
/// let short = Envelope::new("b", Meta::new(1_000, 50));
/// assert!(!short.is_expired_at(1_050));
/// assert!(short.is_expired_at(1_051));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<V> {
    content: V,
    meta: Option<Meta>,
}

impl<V> Envelope<V> {
    /// Wraps `content` with expiry metadata.
    pub fn new(content: V, meta: Meta) -> Self {
        Self { content, meta: Some(meta) }
    }

    /// Wraps `content` without expiry.
    pub fn forever(content: V) -> Self {
        Self { content, meta: None }
    }

    /// Returns the wrapped value.
    pub fn content(&self) -> &V {
        &self.content
    }

    /// Unwraps the value.
    pub fn into_content(self) -> V {
        self.content
    }

    /// Returns the expiry metadata, or `None` for values that never expire.
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Returns `true` if the value is stale at `now` (milliseconds since the Unix epoch).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.meta.is_some_and(|meta| meta.is_expired_at(now))
    }
}

/// A storage adapter that enforces per-entry TTLs.
///
/// `Expiring` implements [`Storage`] for `V` over an inner storage of
/// `Envelope<V>`, and [`SyncStorage`] likewise. Plain `set` calls use
/// [`CacheOptions::default`].
///
/// Eager deletion timers run on the ambient Tokio runtime. Without one, writes
/// fall back to lazy expiry.
///
/// # Examples
///
/// ```
/// use memoria::{CacheOptions, Envelope, Expiring, MemoryStorage, Storage};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = Expiring::new(MemoryStorage::<Envelope<i32>>::new());
///
/// storage.set_with("answer", Some(42), &CacheOptions::new().forever()).await.unwrap();
/// assert_eq!(storage.get("answer").await.unwrap(), Some(42));
/// # }
/// ```
pub struct Expiring<S, V> {
    inner: Arc<S>,
    _phantom: PhantomData<fn() -> V>,
}

impl<S, V> Expiring<S, V> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            _phantom: PhantomData,
        }
    }

    /// Returns the wrapped storage, for direct inspection of envelopes.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn envelope(value: V, options: &CacheOptions) -> Envelope<V> {
        if options.is_cached_forever() {
            Envelope::forever(value)
        } else {
            Envelope::new(value, Meta::new(now_millis(), options.ttl_millis()))
        }
    }
}

impl<S, V> Clone for Expiring<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _phantom: PhantomData,
        }
    }
}

impl<S, V> std::fmt::Debug for Expiring<S, V>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expiring").field("inner", &self.inner).finish()
    }
}

impl<S, V> Storage<V> for Expiring<S, V>
where
    S: Storage<Envelope<V>> + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        let Some(envelope) = Storage::get(&*self.inner, key).await? else {
            return Ok(None);
        };

        if envelope.is_expired_at(now_millis()) {
            tracing::debug!(cache.key = key, "entry expired, deleting");
            Storage::set(&*self.inner, key, None).await?;
            return Ok(None);
        }

        Ok(Some(envelope.into_content()))
    }

    async fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        Storage::set_with(self, key, value, &CacheOptions::default()).await
    }

    async fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        let Some(value) = value else {
            return Storage::set(&*self.inner, key, None).await;
        };

        Storage::set(&*self.inner, key, Some(Self::envelope(value, options))).await?;

        if !options.is_lazy() && !options.is_cached_forever() {
            let inner = Arc::clone(&self.inner);
            schedule_eviction(key, options.ttl_millis(), move |key| async move {
                Storage::set(&*inner, &key, None).await
            });
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        Storage::clear(&*self.inner).await
    }
}

impl<S, V> SyncStorage<V> for Expiring<S, V>
where
    S: SyncStorage<Envelope<V>> + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Result<Option<V>, Error> {
        let Some(envelope) = SyncStorage::get(&*self.inner, key)? else {
            return Ok(None);
        };

        if envelope.is_expired_at(now_millis()) {
            tracing::debug!(cache.key = key, "entry expired, deleting");
            SyncStorage::set(&*self.inner, key, None)?;
            return Ok(None);
        }

        Ok(Some(envelope.into_content()))
    }

    fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
        SyncStorage::set_with(self, key, value, &CacheOptions::default())
    }

    fn set_with(&self, key: &str, value: Option<V>, options: &CacheOptions) -> Result<(), Error> {
        let Some(value) = value else {
            return SyncStorage::set(&*self.inner, key, None);
        };

        SyncStorage::set(&*self.inner, key, Some(Self::envelope(value, options)))?;

        if !options.is_lazy() && !options.is_cached_forever() {
            let inner = Arc::clone(&self.inner);
            schedule_eviction(key, options.ttl_millis(), move |key| async move {
                SyncStorage::set(&*inner, &key, None)
            });
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        SyncStorage::clear(&*self.inner)
    }
}

/// Deletes `key` after `ttl_millis` using `delete`, on the current Tokio runtime.
fn schedule_eviction<D, Fut>(key: &str, ttl_millis: i64, delete: D)
where
    D: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::debug!(cache.key = key, "no runtime for eager expiry, entry expires lazily");
        return;
    };

    let key = key.to_string();
    let delay = Duration::from_millis(u64::try_from(ttl_millis).unwrap_or_default());
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(error) = delete(key.clone()).await {
            tracing::warn!(cache.key = %key, error = %error, "eager expiry failed to delete entry");
        }
    });
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_expiry_boundary_is_exclusive() {
        let meta = Meta::new(100, 10);
        assert!(!meta.is_expired_at(110));
        assert!(meta.is_expired_at(111));
    }

    #[test]
    fn non_positive_ttl_is_always_expired() {
        assert!(Meta::new(100, 0).is_expired_at(100));
        assert!(Meta::new(100, -1_000).is_expired_at(0));
    }

    #[test]
    fn meta_serializes_with_short_field_names() {
        let json = serde_json::to_string(&Envelope::new(1, Meta::new(5, 6))).expect("serialize failed");
        assert_eq!(json, r#"{"content":1,"meta":{"createdAt":5,"ttl":6}}"#);

        let forever = serde_json::to_string(&Envelope::forever(1)).expect("serialize failed");
        assert_eq!(forever, r#"{"content":1,"meta":null}"#);
    }

    #[test]
    fn envelopes_deserialize() {
        let envelope: Envelope<String> =
            serde_json::from_str(r#"{"content":"x","meta":{"createdAt":1,"ttl":2}}"#).expect("deserialize failed");
        assert_eq!(envelope.content(), "x");
        assert_eq!(envelope.meta(), Some(&Meta::new(1, 2)));
    }

    #[test]
    fn now_is_after_epoch() {
        assert!(now_millis() > 0);
    }
}
