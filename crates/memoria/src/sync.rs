// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The blocking single-call engine.

use std::borrow::Cow;

use memoria_storage::{CacheOptions, SyncStorage};

use crate::{
    CacheSwitch,
    key::{CallSite, JsonKeyStrategy, SyncKeyStrategy},
};

/// A blocking operation memoized through a [`SyncStorage`].
///
/// Same read, compute and write rules as [`Memoized`](crate::Memoized) but
/// without coalescing: concurrent callers on a cold key each run the operation.
///
/// # Examples
///
/// ```
/// use memoria::{MemoryStorage, SyncMemoized};
/// use std::convert::Infallible;
///
/// let lengths = SyncMemoized::builder(MemoryStorage::<usize>::new())
///     .owner("Text")
///     .operation("len")
///     .build(|(text,): (String,)| Ok::<_, Infallible>(Some(text.len())));
///
/// assert_eq!(lengths.call(("four".to_string(),)), Ok(Some(4)));
/// ```
pub struct SyncMemoized<S, F, KS = JsonKeyStrategy> {
    call_site: CallSite,
    storage: S,
    key_strategy: KS,
    options: CacheOptions,
    switch: CacheSwitch,
    operation: F,
}

impl SyncMemoized<(), ()> {
    /// Starts building an engine over `storage`.
    pub fn builder<S>(storage: S) -> SyncMemoizedBuilder<S> {
        SyncMemoizedBuilder::new(storage)
    }
}

impl<S, F, KS> std::fmt::Debug for SyncMemoized<S, F, KS>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMemoized")
            .field("call_site", &self.call_site)
            .field("storage", &self.storage)
            .field("options", &self.options)
            .field("switch", &self.switch)
            .finish_non_exhaustive()
    }
}

impl<S, F, KS> SyncMemoized<S, F, KS> {
    /// Returns the identity used for key derivation and logging.
    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    /// Returns the storage this engine reads from and writes to.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs the memoized operation for `args`.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged when it had to run and failed.
    pub fn call<A, V, E>(&self, args: A) -> Result<Option<V>, E>
    where
        F: Fn(A) -> Result<Option<V>, E>,
        S: SyncStorage<V>,
        V: Clone,
        KS: SyncKeyStrategy<A>,
    {
        if self.switch.is_disabled() {
            tracing::debug!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                "caching disabled, calling through"
            );
            return (self.operation)(args);
        }

        let Some(key) = self.key_strategy.key(&self.call_site, &args) else {
            tracing::debug!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                "no cache key, calling through"
            );
            return (self.operation)(args);
        };

        match self.storage.get(&key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(error) => tracing::warn!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.key = %key,
                error = %error,
                "reading from cache failed, treating as miss"
            ),
        }

        let result = (self.operation)(args)?;

        if let Some(value) = &result
            && let Err(error) = self.storage.set_with(&key, Some(value.clone()), &self.options)
        {
            tracing::warn!(
                cache.owner = self.call_site.owner(),
                cache.operation = self.call_site.operation(),
                cache.key = %key,
                error = %error,
                "writing result to cache failed"
            );
        }

        Ok(result)
    }
}

/// Builder for [`SyncMemoized`].
#[derive(Debug)]
pub struct SyncMemoizedBuilder<S, KS = JsonKeyStrategy> {
    call_site: CallSite,
    storage: S,
    key_strategy: KS,
    options: CacheOptions,
    switch: CacheSwitch,
}

impl<S> SyncMemoizedBuilder<S> {
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

impl<S, KS> SyncMemoizedBuilder<S, KS> {
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
    pub fn key_strategy<K>(self, key_strategy: K) -> SyncMemoizedBuilder<S, K> {
        SyncMemoizedBuilder {
            call_site: self.call_site,
            storage: self.storage,
            key_strategy,
            options: self.options,
            switch: self.switch,
        }
    }

    /// Wraps `operation`.
    pub fn build<F>(self, operation: F) -> SyncMemoized<S, F, KS> {
        SyncMemoized {
            call_site: self.call_site,
            storage: self.storage,
            key_strategy: self.key_strategy,
            options: self.options,
            switch: self.switch,
            operation,
        }
    }
}
