// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache-aware memoization for async and blocking operations.
//!
//! This crate wraps an operation so that its results are served from a
//! storage whenever possible:
//!
//! - [`Memoized`] memoizes a single async operation through one [`Storage`].
//!   Concurrent calls that miss on the same key share one execution.
//! - [`SyncMemoized`] does the same for blocking operations over a [`SyncStorage`].
//! - [`MultiMemoized`] memoizes a batch operation through an ordered list of
//!   [`BatchStorage`] tiers. Hits in slower tiers are copied into faster ones,
//!   and only the items no tier had reach the operation.
//! - [`Expiring`] adds per-entry TTLs to any storage by wrapping values in an
//!   [`Envelope`], with lazy expiry on read and optional eager deletion timers.
//!
//! Keys come from a [`KeyStrategy`] (or [`ItemKeyStrategy`] for batches). The
//! default strategies serialize the arguments to JSON and prefix them with the
//! owner and operation names. Returning `None` from a strategy opts a call out
//! of caching.
//!
//! Every engine can be switched off with a [`CacheSwitch`]. The default reads
//! [`DISABLE_CACHE_ENV`] on every call, and any non-empty value turns caching off.
//!
//! # Examples
//!
//! ## Single call with expiry
//!
//! ```
//! use memoria::{CacheOptions, Envelope, Expiring, MemoryStorage, Memoized};
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let users = Memoized::builder(Expiring::new(MemoryStorage::<Envelope<String>>::new()))
//!     .owner("Users")
//!     .operation("name")
//!     .options(CacheOptions::new().ttl(30.0).eager())
//!     .build(|(id,): (u64,)| async move { Ok::<_, Infallible>(Some(format!("user-{id}"))) });
//!
//! assert_eq!(users.call((1,)).await.unwrap().as_deref(), Some("user-1"));
//! # }
//! ```
//!
//! ## Multi-tier batch
//!
//! ```
//! use memoria::{Batched, MemoryStorage, MultiMemoized};
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let squares = MultiMemoized::builder()
//!     .owner("Math")
//!     .operation("square")
//!     .tier(MemoryStorage::<u64>::new())
//!     .tier(Batched::new(MemoryStorage::<u64>::new()))
//!     .on_write_error(|error| eprintln!("tier write failed: {error}"))
//!     .build(|items: Vec<u64>, (): ()| async move {
//!         Ok::<_, Infallible>(items.iter().map(|n| n * n).collect())
//!     });
//!
//! assert_eq!(squares.call(vec![2, 3], ()).await.unwrap(), vec![4, 9]);
//! # }
//! ```
//!
//! # Logging
//!
//! Engines emit `tracing` events with `cache.owner`, `cache.operation` and, where
//! known, `cache.key` or `cache.tier` fields. Storage failures that the engines
//! absorb are logged at `WARN`; hits, misses, bypasses, expiry and back-fills at
//! `DEBUG`.

mod error;
mod expiration;
mod key;
mod memoized;
mod multi;
mod pending;
mod switch;
mod sync;
#[cfg(test)]
mod log_capture;

#[doc(inline)]
pub use error::MultiError;
#[doc(inline)]
pub use expiration::{Envelope, Expiring, Meta};
#[doc(inline)]
pub use key::{
    CacheKey, CallSite, ItemKeyFn, ItemKeyStrategy, JsonItemKeyStrategy, JsonKeyStrategy, KeyFn, KeyPhase, KeyStrategy, SyncKeyStrategy,
    item_key_fn, key_fn,
};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use memoria_memory::{MemoryStorage, MemoryStorageBuilder};
#[cfg(feature = "test-util")]
#[doc(inline)]
pub use memoria_storage::testing;
#[doc(inline)]
pub use memoria_storage::{BatchStorage, Batched, CacheOptions, DEFAULT_TTL_SECS, DynamicStorage, DynamicStorageExt, Error, Storage, SyncStorage};
#[doc(inline)]
pub use memoized::{Memoized, MemoizedBuilder};
#[doc(inline)]
pub use multi::{MultiMemoized, MultiMemoizedBuilder, WriteErrorListener};
#[doc(inline)]
pub use switch::{CacheSwitch, DISABLE_CACHE_ENV};
#[doc(inline)]
pub use sync::{SyncMemoized, SyncMemoizedBuilder};
