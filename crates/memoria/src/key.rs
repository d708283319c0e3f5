// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache key derivation.
//!
//! A key strategy maps a call's identity (owner, operation, arguments) to a
//! [`CacheKey`], or to `None` to opt that particular call out of caching.
//! Engines treat `None` as "always execute, never read or write the cache".

use std::{borrow::Cow, marker::PhantomData};

use serde::Serialize;

/// An opaque key, unique within one storage's namespace.
pub type CacheKey = String;

/// Identity of a wrapped operation: who owns it and what it is called.
///
/// # Examples
///
/// ```
/// use memoria::CallSite;
///
/// let site = CallSite::new("UserRepository", "find_by_id");
/// assert_eq!(site.owner(), "UserRepository");
/// assert_eq!(site.operation(), "find_by_id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    owner: Cow<'static, str>,
    operation: Cow<'static, str>,
}

impl CallSite {
    /// Creates a call site from an owner and an operation name.
    pub fn new(owner: impl Into<Cow<'static, str>>, operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            owner: owner.into(),
            operation: operation.into(),
        }
    }

    /// Returns the owner identity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the operation identity.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub(crate) fn set_owner(&mut self, owner: Cow<'static, str>) {
        self.owner = owner;
    }

    pub(crate) fn set_operation(&mut self, operation: Cow<'static, str>) {
        self.operation = operation;
    }
}

impl Default for CallSite {
    fn default() -> Self {
        Self::new("anonymous", "anonymous")
    }
}

/// Derives a cache key for a call, possibly by suspending (for example to look
/// something up first).
///
/// Every [`SyncKeyStrategy`] is also a `KeyStrategy`.
pub trait KeyStrategy<A: ?Sized>: Send + Sync {
    /// Returns the key for this call, or `None` to bypass caching.
    fn derive_key(&self, call: &CallSite, args: &A) -> impl Future<Output = Option<CacheKey>> + Send;
}

/// Derives a cache key for a call without suspending.
pub trait SyncKeyStrategy<A: ?Sized>: Send + Sync {
    /// Returns the key for this call, or `None` to bypass caching.
    fn key(&self, call: &CallSite, args: &A) -> Option<CacheKey>;
}

impl<A, T> KeyStrategy<A> for T
where
    A: ?Sized,
    T: SyncKeyStrategy<A>,
{
    fn derive_key(&self, call: &CallSite, args: &A) -> impl Future<Output = Option<CacheKey>> + Send {
        std::future::ready(self.key(call, args))
    }
}

/// The default strategy: `owner:operation:<arguments as JSON>`.
///
/// Structurally equal arguments produce identical keys, and different owners or
/// operations produce different keys. Arguments that fail to serialize opt the
/// call out of caching.
///
/// Positional arguments are usually passed as a tuple, which serializes as a
/// JSON array.
///
/// # Examples
///
/// ```
/// use memoria::{CallSite, JsonKeyStrategy, SyncKeyStrategy};
///
/// let site = CallSite::new("Catalog", "price");
/// let key = JsonKeyStrategy.key(&site, &(1, "a"));
/// assert_eq!(key.as_deref(), Some(r#"Catalog:price:[1,"a"]"#));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonKeyStrategy;

impl<A> SyncKeyStrategy<A> for JsonKeyStrategy
where
    A: Serialize + ?Sized,
{
    fn key(&self, call: &CallSite, args: &A) -> Option<CacheKey> {
        let args = to_json(call, args)?;
        Some(format!("{}:{}:{args}", call.owner(), call.operation()))
    }
}

/// A synchronous key strategy built from a closure.
///
/// Created with [`key_fn`].
pub struct KeyFn<F, A: ?Sized> {
    func: F,
    _phantom: PhantomData<fn(&A)>,
}

impl<F, A: ?Sized> std::fmt::Debug for KeyFn<F, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFn").finish_non_exhaustive()
    }
}

/// Wraps a closure as a [`SyncKeyStrategy`].
///
/// # Examples
///
/// ```
/// use memoria::{CallSite, SyncKeyStrategy, key_fn};
///
/// // Skip caching for the "admin" user.
/// let strategy = key_fn(|site: &CallSite, (user,): &(&str,)| {
///     (*user != "admin").then(|| format!("{}:{user}", site.operation()))
/// });
///
/// let site = CallSite::new("Profiles", "load");
/// assert_eq!(strategy.key(&site, &("bob",)).as_deref(), Some("load:bob"));
/// assert_eq!(strategy.key(&site, &("admin",)), None);
/// ```
pub fn key_fn<A, F>(func: F) -> KeyFn<F, A>
where
    A: ?Sized,
    F: Fn(&CallSite, &A) -> Option<CacheKey> + Send + Sync,
{
    KeyFn {
        func,
        _phantom: PhantomData,
    }
}

impl<F, A> SyncKeyStrategy<A> for KeyFn<F, A>
where
    A: ?Sized,
    F: Fn(&CallSite, &A) -> Option<CacheKey> + Send + Sync,
{
    fn key(&self, call: &CallSite, args: &A) -> Option<CacheKey> {
        (self.func)(call, args)
    }
}

/// Which half of a multi-tier call a per-item key is derived for.
///
/// A strategy may use different keys, or skip caching, depending on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    /// Looking the item up in the tiers.
    Read,
    /// Writing a freshly computed result for the item into the tiers.
    Write,
}

/// Derives one key per item of a batch call.
pub trait ItemKeyStrategy<I, A>: Send + Sync {
    /// Returns the key for `item`, or `None` to keep that item out of the cache.
    fn key(&self, call: &CallSite, item: &I, args: &A, phase: KeyPhase) -> Option<CacheKey>;
}

/// The default per-item strategy: `owner:operation:<item as JSON>:<other arguments as JSON>`.
///
/// Both phases use the same key.
///
/// # Examples
///
/// ```
/// use memoria::{CallSite, ItemKeyStrategy, JsonItemKeyStrategy, KeyPhase};
///
/// let site = CallSite::new("Urls", "canonical");
/// let key = JsonItemKeyStrategy.key(&site, &"home", &("at",), KeyPhase::Read);
/// assert_eq!(key.as_deref(), Some(r#"Urls:canonical:"home":["at"]"#));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonItemKeyStrategy;

impl<I, A> ItemKeyStrategy<I, A> for JsonItemKeyStrategy
where
    I: Serialize,
    A: Serialize,
{
    fn key(&self, call: &CallSite, item: &I, args: &A, _phase: KeyPhase) -> Option<CacheKey> {
        let item = to_json(call, item)?;
        let args = to_json(call, args)?;
        Some(format!("{}:{}:{item}:{args}", call.owner(), call.operation()))
    }
}

/// A per-item key strategy built from a closure.
///
/// Created with [`item_key_fn`].
pub struct ItemKeyFn<F, I, A> {
    func: F,
    _phantom: PhantomData<fn(&I, &A)>,
}

impl<F, I, A> std::fmt::Debug for ItemKeyFn<F, I, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemKeyFn").finish_non_exhaustive()
    }
}

/// Wraps a closure as an [`ItemKeyStrategy`].
pub fn item_key_fn<I, A, F>(func: F) -> ItemKeyFn<F, I, A>
where
    F: Fn(&CallSite, &I, &A, KeyPhase) -> Option<CacheKey> + Send + Sync,
{
    ItemKeyFn {
        func,
        _phantom: PhantomData,
    }
}

impl<F, I, A> ItemKeyStrategy<I, A> for ItemKeyFn<F, I, A>
where
    F: Fn(&CallSite, &I, &A, KeyPhase) -> Option<CacheKey> + Send + Sync,
{
    fn key(&self, call: &CallSite, item: &I, args: &A, phase: KeyPhase) -> Option<CacheKey> {
        (self.func)(call, item, args, phase)
    }
}

fn to_json<T: Serialize + ?Sized>(call: &CallSite, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(error) => {
            tracing::warn!(
                cache.owner = call.owner(),
                cache.operation = call.operation(),
                error = %error,
                "arguments could not be serialized, skipping cache"
            );
            None
        }
    }
}
