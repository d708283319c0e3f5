// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The multi-tier engine.
//!
//! A batch operation takes a list of items (plus shared arguments) and returns
//! one result per item. [`MultiMemoized`] looks every item up in an ordered
//! list of tiers, fastest first, and only passes the items no tier had to the
//! operation.
//!
//! For each tier in order, the keys still unresolved are read with one
//! `get_many`. Hits found below the first tier are copied back into every
//! faster tier before moving on. After the last tier, leftover items (plus
//! any item without a read key) go to the operation in their original order,
//! and its results are written to every tier, slowest first.
//!
//! The returned list holds the cached values in the order they were found,
//! followed by the freshly computed ones. It is only in input order when every
//! hit precedes every miss.

use std::{borrow::Cow, sync::Arc};

use memoria_storage::{BatchStorage, CacheOptions, DynamicStorage, DynamicStorageExt, Error};

use crate::{
    CacheSwitch, MultiError,
    key::{CacheKey, CallSite, ItemKeyStrategy, JsonItemKeyStrategy, KeyPhase},
};

/// Receives tier write failures that happen away from the caller.
pub type WriteErrorListener = Arc<dyn Fn(&Error) + Send + Sync>;

/// A batch operation memoized through an ordered list of tiers.
///
/// # Examples
///
/// ```
/// use memoria::{Batched, MemoryStorage, MultiMemoized};
/// use std::convert::Infallible;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fast = MemoryStorage::<String>::new();
/// let slow = Batched::new(MemoryStorage::<String>::new());
///
/// let upper = MultiMemoized::builder()
///     .owner("Text")
///     .operation("upper")
///     .tier(fast)
///     .tier(slow)
///     .build(|words: Vec<String>, (): ()| async move {
///         Ok::<_, Infallible>(words.iter().map(|w| w.to_uppercase()).collect())
///     });
///
/// let words = vec!["a".to_string(), "b".to_string()];
/// assert_eq!(upper.call(words, ()).await.unwrap(), ["A", "B"]);
/// # }
/// ```
pub struct MultiMemoized<V, F, KS = JsonItemKeyStrategy> {
    call_site: CallSite,
    tiers: Vec<DynamicStorage<V>>,
    key_strategy: KS,
    options: CacheOptions,
    switch: CacheSwitch,
    on_write_error: Option<WriteErrorListener>,
    operation: F,
}

impl MultiMemoized<(), ()> {
    /// Starts building an engine with no tiers.
    pub fn builder<V>() -> MultiMemoizedBuilder<V> {
        MultiMemoizedBuilder::new()
    }
}

impl<V, F, KS> std::fmt::Debug for MultiMemoized<V, F, KS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiMemoized")
            .field("call_site", &self.call_site)
            .field("tiers", &self.tiers.len())
            .field("options", &self.options)
            .field("switch", &self.switch)
            .field("on_write_error", &self.on_write_error.is_some())
            .finish_non_exhaustive()
    }
}

impl<V, F, KS> MultiMemoized<V, F, KS> {
    /// Returns the identity used for key derivation and logging.
    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    /// Returns the tiers, fastest first.
    pub fn tiers(&self) -> &[DynamicStorage<V>] {
        &self.tiers
    }
}

impl<V, F, KS> MultiMemoized<V, F, KS>
where
    V: Clone + Send + Sync + 'static,
{
    /// Resolves `items` through the tiers and the operation.
    ///
    /// # Errors
    ///
    /// Returns [`MultiError::Operation`] when the operation fails,
    /// [`MultiError::LengthMismatch`] when it returns the wrong number of
    /// results, and [`MultiError::Storage`] when a tier write fails and no
    /// write-error listener is set. Tier read failures are logged and count as
    /// misses.
    pub async fn call<I, A, Fut, E>(&self, items: Vec<I>, args: A) -> Result<Vec<V>, MultiError<E>>
    where
        F: Fn(Vec<I>, A) -> Fut,
        Fut: Future<Output = Result<Vec<V>, E>>,
        KS: ItemKeyStrategy<I, A>,
    {
        if self.switch.is_disabled() {
            tracing::debug!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                "caching disabled, calling through"
            );
            return self.compute(items, args).await;
        }

        let mut uncached = vec![false; items.len()];
        let mut unresolved = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.key_strategy.key(&self.call_site, item, &args, KeyPhase::Read) {
                Some(key) => unresolved.push((index, key)),
                None => uncached[index] = true,
            }
        }

        let mut found = Vec::with_capacity(items.len());
        for (depth, tier) in self.tiers.iter().enumerate() {
            if unresolved.is_empty() {
                break;
            }

            let hits = self.lookup(depth, tier, &mut unresolved).await;
            if hits.is_empty() {
                continue;
            }

            if depth > 0 {
                self.backfill(depth, &hits).await.map_err(MultiError::<E>::Storage)?;
            }
            found.extend(hits.into_iter().map(|(_, value)| value));
        }

        for (index, _) in unresolved {
            uncached[index] = true;
        }

        if !uncached.contains(&true) {
            return Ok(found);
        }

        let missing: Vec<I> = items
            .into_iter()
            .zip(uncached)
            .filter_map(|(item, uncached)| uncached.then_some(item))
            .collect();

        let write_keys: Vec<Option<CacheKey>> = missing
            .iter()
            .map(|item| self.key_strategy.key(&self.call_site, item, &args, KeyPhase::Write))
            .collect();

        let computed = self.compute(missing, args).await?;

        let entries: Vec<(CacheKey, Option<V>)> = write_keys
            .into_iter()
            .zip(&computed)
            .filter_map(|(key, value)| key.map(|key| (key, Some(value.clone()))))
            .collect();
        if !entries.is_empty() {
            self.write_back(entries).await.map_err(MultiError::<E>::Storage)?;
        }

        found.extend(computed);
        Ok(found)
    }

    async fn compute<I, A, Fut, E>(&self, items: Vec<I>, args: A) -> Result<Vec<V>, MultiError<E>>
    where
        F: Fn(Vec<I>, A) -> Fut,
        Fut: Future<Output = Result<Vec<V>, E>>,
    {
        let expected = items.len();
        let computed = (self.operation)(items, args).await.map_err(MultiError::Operation)?;
        if computed.len() != expected {
            return Err(MultiError::LengthMismatch {
                expected,
                actual: computed.len(),
            });
        }
        Ok(computed)
    }

    /// Reads the unresolved keys from `tier`, removes the hits from
    /// `unresolved` and returns them in request order.
    async fn lookup(&self, depth: usize, tier: &DynamicStorage<V>, unresolved: &mut Vec<(usize, CacheKey)>) -> Vec<(CacheKey, V)> {
        let keys: Vec<CacheKey> = unresolved.iter().map(|(_, key)| key.clone()).collect();
        let slots = match tier.get_many(&keys).await {
            Ok(slots) => slots,
            Err(error) => {
                tracing::warn!(
                    cache.owner = self.call_site.owner(),
                    cache.operation = self.call_site.operation(),
                    cache.tier = depth,
                    error = %error,
                    "reading from tier failed, treating as misses"
                );
                return Vec::new();
            }
        };

        let mut hits = Vec::new();
        let mut slots = slots.into_iter();
        unresolved.retain(|(_, key)| match slots.next().flatten() {
            Some(value) => {
                hits.push((key.clone(), value));
                false
            }
            None => true,
        });

        tracing::debug!(
            cache.owner = self.call_site.owner(),
            cache.operation = self.call_site.operation(),
            cache.tier = depth,
            hits = hits.len(),
            misses = unresolved.len(),
            "tier lookup"
        );
        hits
    }

    /// Copies hits found at `depth` into every faster tier, nearest first.
    async fn backfill(&self, depth: usize, hits: &[(CacheKey, V)]) -> Result<(), Error> {
        let entries: Vec<(CacheKey, Option<V>)> = hits.iter().map(|(key, value)| (key.clone(), Some(value.clone()))).collect();

        for faster in (0..depth).rev() {
            tracing::debug!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.tier = faster,
                entries = entries.len(),
                "back-filling tier"
            );
            if let Err(error) = self.tiers[faster].set_many(entries.clone(), &self.options).await {
                self.write_failed(faster, error)?;
            }
        }
        Ok(())
    }

    /// Writes freshly computed entries to every tier, slowest first.
    ///
    /// With a write-error listener the writes run on a detached Tokio task and
    /// the caller does not wait for them.
    async fn write_back(&self, entries: Vec<(CacheKey, Option<V>)>) -> Result<(), Error> {
        if let Some(listener) = &self.on_write_error
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            let tiers = self.tiers.clone();
            let options = self.options;
            let listener = Arc::clone(listener);
            let call_site = self.call_site.clone();
            runtime.spawn(async move {
                for (depth, tier) in tiers.iter().enumerate().rev() {
                    if let Err(error) = tier.set_many(entries.clone(), &options).await {
                        tracing::debug!(
                            cache.owner = call_site.owner(),
                            cache.operation = call_site.operation(),
                            cache.tier = depth,
                            error = %error,
                            "writing to tier failed, reporting to listener"
                        );
                        listener(&error);
                    }
                }
            });
            return Ok(());
        }

        for (depth, tier) in self.tiers.iter().enumerate().rev() {
            if let Err(error) = tier.set_many(entries.clone(), &self.options).await {
                self.write_failed(depth, error)?;
            }
        }
        Ok(())
    }

    /// Hands `error` to the listener, or returns it when there is none.
    fn write_failed(&self, depth: usize, error: Error) -> Result<(), Error> {
        match &self.on_write_error {
            Some(listener) => {
                tracing::debug!(
                    cache.owner = self.call_site.owner(),
                    cache.operation = self.call_site.operation(),
                    cache.tier = depth,
                    error = %error,
                    "writing to tier failed, reporting to listener"
                );
                listener(&error);
                Ok(())
            }
            None => {
                tracing::warn!(
                    cache.owner = self.call_site.owner(),
                    cache.operation = self.call_site.operation(),
                    cache.tier = depth,
                    error = %error,
                    "writing to tier failed"
                );
                Err(error)
            }
        }
    }
}

/// Builder for [`MultiMemoized`].
pub struct MultiMemoizedBuilder<V, KS = JsonItemKeyStrategy> {
    call_site: CallSite,
    tiers: Vec<DynamicStorage<V>>,
    key_strategy: KS,
    options: CacheOptions,
    switch: CacheSwitch,
    on_write_error: Option<WriteErrorListener>,
}

impl<V, KS> std::fmt::Debug for MultiMemoizedBuilder<V, KS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiMemoizedBuilder")
            .field("call_site", &self.call_site)
            .field("tiers", &self.tiers.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for MultiMemoizedBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MultiMemoizedBuilder<V> {
    /// Creates a builder with no tiers and the default key strategy, options
    /// and switch.
    pub fn new() -> Self {
        Self {
            call_site: CallSite::default(),
            tiers: Vec::new(),
            key_strategy: JsonItemKeyStrategy,
            options: CacheOptions::default(),
            switch: CacheSwitch::default(),
            on_write_error: None,
        }
    }
}

impl<V, KS> MultiMemoizedBuilder<V, KS> {
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

    /// Appends a tier. Tiers are consulted in the order they were added, so add
    /// the fastest first.
    #[must_use]
    pub fn tier<T>(mut self, tier: T) -> Self
    where
        T: BatchStorage<V> + 'static,
        V: Send,
    {
        self.tiers.push(tier.into_dynamic());
        self
    }

    /// Sets the options passed with every tier write.
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

    /// Routes tier write failures to `listener` instead of failing the call.
    ///
    /// Back-fill failures are reported and the cascade continues. Writes of
    /// freshly computed results move to a detached task so the caller gets its
    /// results without waiting for them.
    #[must_use]
    pub fn on_write_error(mut self, listener: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_write_error = Some(Arc::new(listener));
        self
    }

    /// Replaces the per-item key strategy.
    pub fn item_key_strategy<K>(self, key_strategy: K) -> MultiMemoizedBuilder<V, K> {
        MultiMemoizedBuilder {
            call_site: self.call_site,
            tiers: self.tiers,
            key_strategy,
            options: self.options,
            switch: self.switch,
            on_write_error: self.on_write_error,
        }
    }

    /// Wraps `operation`.
    pub fn build<F>(self, operation: F) -> MultiMemoized<V, F, KS> {
        MultiMemoized {
            call_site: self.call_site,
            tiers: self.tiers,
            key_strategy: self.key_strategy,
            options: self.options,
            switch: self.switch,
            on_write_error: self.on_write_error,
            operation,
        }
    }
}
