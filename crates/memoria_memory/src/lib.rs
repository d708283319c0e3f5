// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process storage backed by moka.
//!
//! This crate provides [`MemoryStorage`], a concurrent in-memory storage that
//! implements every `memoria_storage` port: [`Storage`](memoria_storage::Storage),
//! [`BatchStorage`](memoria_storage::BatchStorage) and
//! [`SyncStorage`](memoria_storage::SyncStorage). Use [`MemoryStorageBuilder`]
//! to bound it by entry count or maximum age without exposing moka types.
//!
//! Values are stored as-is and handed back as clones, so storing an `Arc<T>`
//! gives callers the same allocation on every hit.
//!
//! # Quick Start
//!
//! ```
//! use memoria_memory::MemoryStorage;
//! use memoria_storage::Storage;
//! use std::time::Duration;
//!
//! # futures::executor::block_on(async {
//! let storage = MemoryStorage::<i32>::builder()
//!     .max_capacity(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build();
//!
//! storage.set("key", Some(42)).await.unwrap();
//! assert_eq!(storage.get("key").await.unwrap(), Some(42));
//! # });
//! ```

pub mod builder;
pub mod storage;

#[doc(inline)]
pub use builder::MemoryStorageBuilder;
#[doc(inline)]
pub use storage::MemoryStorage;
