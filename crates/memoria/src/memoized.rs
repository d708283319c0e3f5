// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The single-call engine.

use std::{borrow::Cow, sync::Arc};

use memoria_storage::{CacheOptions, Storage};

use crate::{
    CacheSwitch,
    key::{CacheKey, CallSite, JsonKeyStrategy, KeyStrategy},
    pending::PendingCalls,
};

/// An async operation memoized through a [`Storage`].
///
/// Each call derives a key from its arguments, returns the stored value when
/// there is one and otherwise runs the operation and stores what it produced.
/// Concurrent calls with the same key while the storage is cold share a single
/// execution of the operation.
///
/// The operation returns `Ok(None)` for "no value". Such results are returned
/// to the caller but never stored. Every `Ok(Some(_))` is stored, including
/// falsy values like `0`, `false` or `""`. Errors propagate to every caller of
/// the flight and are never stored. Joined callers receive clones, so values
/// and errors must be `Clone`.
///
/// Storage failures never fail a call: a failed read counts as a miss and a
/// failed write is logged and the computed result is returned anyway.
///
/// Inside a Tokio runtime the read, the operation and the write run as a
/// detached task. A caller that stops waiting does not cancel them: the result
/// is still stored, and callers arriving in the meantime join the same task.
/// Without a runtime the work is driven by the waiting callers instead.
///
/// # Examples
///
/// ```
/// use memoria::{CacheOptions, MemoryStorage, Memoized};
/// use std::convert::Infallible;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let prices = Memoized::builder(MemoryStorage::<u32>::new())
///     .owner("Catalog")
///     .operation("price")
///     .options(CacheOptions::new().ttl(300.0))
///     .build(|(sku,): (u32,)| async move { Ok::<_, Infallible>(Some(sku * 100)) });
///
/// assert_eq!(prices.call((7,)).await.unwrap(), Some(700));
/// # }
/// ```
pub struct Memoized<V, E, S, F, KS = JsonKeyStrategy> {
    core: Arc<Core<S, F>>,
    key_strategy: KS,
    switch: CacheSwitch,
    pending: PendingCalls<CacheKey, Result<Option<V>, E>>,
}

/// The part of an engine that in-flight tasks keep alive.
struct Core<S, F> {
    call_site: CallSite,
    storage: S,
    options: CacheOptions,
    operation: F,
}

impl Memoized<(), (), (), ()> {
    /// Starts building an engine over `storage`.
    pub fn builder<S>(storage: S) -> MemoizedBuilder<S> {
        MemoizedBuilder::new(storage)
    }
}

impl<V, E, S, F, KS> std::fmt::Debug for Memoized<V, E, S, F, KS>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("call_site", &self.core.call_site)
            .field("storage", &self.core.storage)
            .field("options", &self.core.options)
            .field("switch", &self.switch)
            .finish_non_exhaustive()
    }
}

impl<V, E, S, F, KS> Memoized<V, E, S, F, KS> {
    /// Returns the identity used for key derivation and logging.
    pub fn call_site(&self) -> &CallSite {
        &self.core.call_site
    }

    /// Returns the storage this engine reads from and writes to.
    pub fn storage(&self) -> &S {
        &self.core.storage
    }

    /// Returns the options passed with every write.
    pub fn options(&self) -> &CacheOptions {
        &self.core.options
    }
}

impl<V, E, S, F, KS> Memoized<V, E, S, F, KS>
where
    S: Storage<V> + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Runs the memoized operation for `args`.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged when it had to run and failed.
    pub async fn call<A, Fut>(&self, args: A) -> Result<Option<V>, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
        A: Send + 'static,
        KS: KeyStrategy<A>,
    {
        let call_site = &self.core.call_site;
        if self.switch.is_disabled() {
            tracing::debug!(
                cache.owner = call_site.owner(),
                cache.operation = call_site.operation(),
                "caching disabled, calling through"
            );
            return (self.core.operation)(args).await;
        }

        let Some(key) = self.key_strategy.derive_key(call_site, &args).await else {
            tracing::debug!(
                cache.owner = call_site.owner(),
                cache.operation = call_site.operation(),
                "no cache key, calling through"
            );
            return (self.core.operation)(args).await;
        };

        let core = Arc::clone(&self.core);
        let flight_key = key.clone();
        let (outcome, joined) = self
            .pending
            .work(key.clone(), move || async move { core.load(&flight_key, args).await })
            .await;
        if joined {
            tracing::debug!(
                cache.owner = call_site.owner(),
                cache.operation = call_site.operation(),
                cache.key = %key,
                "joined in-flight call"
            );
        }
        outcome
    }
}

impl<S, F> Core<S, F> {
    async fn load<A, Fut, V, E>(&self, key: &str, args: A) -> Result<Option<V>, E>
    where
        S: Storage<V>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        V: Clone,
    {
        match self.storage.get(key).await {
            Ok(Some(value)) => {
                tracing::debug!(
                    cache.owner = self.call_site.owner(),
                    cache.operation = self.call_site.operation(),
                    cache.key = key,
                    "cache hit"
                );
                return Ok(Some(value));
            }
            Ok(None) => tracing::debug!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.key = key,
                "cache miss"
            ),
            Err(error) => tracing::warn!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.key = key,
                error = %error,
                "reading from cache failed, treating as miss"
            ),
        }

        let result = (self.operation)(args).await?;

        if let Some(value) = &result
            && let Err(error) = self.storage.set_with(key, Some(value.clone()), &self.options).await
        {
            tracing::warn!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.key = key,
                error = %error,
                "writing result to cache failed"
            );
        }

        Ok(result)
    }
}

/// Builder for [`Memoized`].
///
/// Created by [`Memoized::builder`].
#[derive(Debug)]
pub struct MemoizedBuilder<S, KS = JsonKeyStrategy> {
    call_site: CallSite,
    storage: S,
    key_strategy: KS,
    options: CacheOptions,
    switch: CacheSwitch,
}

impl<S> MemoizedBuilder<S> {
    /// Creates a builder with the default key strategy, options and switch.
    pub fn new(storage: S) -> Self {
        Self {
            call_site: CallSite::default(),
            storage,
            key_strategy: JsonKeyStrategy,
            options: CacheOptions::default(),
            switch: CacheSwitch::default(),
        }
    }
}

impl<S, KS> MemoizedBuilder<S, KS> {
    /// Sets the owner identity used in keys and logs.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<Cow<'static, str>>) -> Self {
        self.call_site.set_owner(owner.into());
        self
    }

    /// Sets the operation identity used in keys and logs.
    #[must_use]
    pub fn operation(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.call_site.set_operation(operation.into());
        self
    }

    /// Sets the options passed with every write.
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the on/off switch.
    #[must_use]
    pub fn switch(mut self, switch: CacheSwitch) -> Self {
        self.switch = switch;
        self
    }

    /// Replaces the key strategy.
    pub fn key_strategy<K>(self, key_strategy: K) -> MemoizedBuilder<S, K> {
        MemoizedBuilder {
            call_site: self.call_site,
            storage: self.storage,
            key_strategy,
            options: self.options,
            switch: self.switch,
        }
    }

    /// Wraps `operation`.
    pub fn build<A, Fut, V, E, F>(self, operation: F) -> Memoized<V, E, S, F, KS>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        Memoized {
            core: Arc::new(Core {
                call_site: self.call_site,
                storage: self.storage,
                options: self.options,
                operation,
            }),
            key_strategy: self.key_strategy,
            switch: self.switch,
            pending: PendingCalls::default(),
        }
    }
}
