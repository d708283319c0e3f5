// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Storage port contracts consumed by the `memoria` memoization engines.
//!
//! A storage is anything that can hold values under string keys. The engines never
//! own or recreate a storage's resources; they only call the operations defined here.
//!
//! Three flavours exist:
//!
//! - [`Storage`]: asynchronous single-key access (`get`, `set`, `clear`).
//! - [`BatchStorage`]: asynchronous batch access (`get_many`, `set_many`, `clear`),
//!   used for the tiers of a multi-tier cascade.
//! - [`SyncStorage`]: blocking single-key access for synchronous call paths.
//!
//! In every flavour, "no value" is `None`. Setting a key to `None` deletes it, and a
//! stored falsy value (`false`, `0`, an empty string, `Value::Null`) is a hit.
//!
//! # Implementing a Storage
//!
//! ```
//! use memoria_storage::{Error, Storage};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleStorage<V>(RwLock<HashMap<String, V>>);
//!
//! impl<V> Storage<V> for SimpleStorage<V>
//! where
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &str) -> Result<Option<V>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Option<V>) -> Result<(), Error> {
//!         let mut map = self.0.write().unwrap();
//!         match value {
//!             Some(value) => map.insert(key.to_string(), value),
//!             None => map.remove(key),
//!         };
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.0.write().unwrap().clear();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Heterogeneous Tiers
//!
//! [`DynamicStorage`] erases the concrete type of a [`BatchStorage`] so that
//! different backends can sit in the same ordered tier list. Any single-key
//! [`Storage`] can be turned into a tier with [`Batched`].

mod batch;
mod dynamic;
pub mod error;
mod options;
mod storage;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use batch::{BatchStorage, Batched};
#[doc(inline)]
pub use dynamic::{DynamicStorage, DynamicStorageExt};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use options::{CacheOptions, DEFAULT_TTL_SECS};
#[doc(inline)]
pub use storage::{Storage, SyncStorage};
