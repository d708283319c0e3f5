// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-engine table of in-flight computations.
//!
//! The first caller for a key starts a flight; callers that arrive while it is
//! in flight join it and get a clone of its outcome. Failures are shared with
//! every joined caller but never outlive the flight.
//!
//! Inside a Tokio runtime the flight runs as a detached task, so callers that
//! stop waiting do not cancel it: the work (including its cache write) runs to
//! completion and later callers for the same key still join it. Without a
//! runtime the flight is driven by its callers and is dropped once the last of
//! them gives up.
//!
//! The entry for a key is removed when its flight settles, whether it completed
//! or was dropped, so a call arriving afterwards starts fresh.

use std::{
    any::Any,
    collections::HashMap,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

type Flight<T> = Shared<BoxFuture<'static, T>>;

type Slots<K, T> = Arc<Mutex<HashMap<K, Slot<T>>>>;

struct Slot<T> {
    id: u64,
    held: Held<T>,
}

enum Held<T> {
    /// Detached flights keep running without callers, so the table holds them.
    Strong(Flight<T>),
    /// Caller-driven flights live only as long as someone awaits them.
    Weak(WeakShared<BoxFuture<'static, T>>),
}

impl<T: Clone> Slot<T> {
    fn flight(&self) -> Option<Flight<T>> {
        match &self.held {
            Held::Strong(flight) => Some(flight.clone()),
            Held::Weak(flight) => flight.upgrade(),
        }
    }
}

pub(crate) struct PendingCalls<K, T> {
    slots: Slots<K, T>,
    next_id: AtomicU64,
}

impl<K, T> Default for PendingCalls<K, T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, T> std::fmt::Debug for PendingCalls<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCalls").field("in_flight", &self.slots.lock().len()).finish()
    }
}

impl<K, T> PendingCalls<K, T>
where
    K: Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Starts a flight from `init` unless one for `key` is already in flight,
    /// in which case waits for that one instead. The returned flag is `true`
    /// for callers that joined an existing flight.
    ///
    /// `init` is only invoked if this caller starts the flight.
    pub(crate) async fn work<Fut>(&self, key: K, init: impl FnOnce() -> Fut) -> (T, bool)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let (flight, joined) = self.flight(key, init);
        (flight.await, joined)
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }

    fn flight<Fut>(&self, key: K, init: impl FnOnce() -> Fut) -> (Flight<T>, bool)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slots = self.slots.lock();
        if let Some(flight) = slots.get(&key).and_then(Slot::flight) {
            return (flight, true);
        }

        let work = init();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let settle = Settle {
            slots: Arc::clone(&self.slots),
            key: key.clone(),
            id,
        };

        let (flight, held) = match tokio::runtime::Handle::try_current() {
            // Spawned on first poll so the task never starts while the table is locked.
            Ok(runtime) => {
                let flight = async move {
                    join(runtime.spawn(async move {
                        let _settle = settle;
                        work.await
                    }))
                    .await
                }
                .boxed()
                .shared();
                (flight.clone(), Held::Strong(flight))
            }
            Err(_) => {
                let flight = async move {
                    let _settle = settle;
                    work.await
                }
                .boxed()
                .shared();
                let held = flight.downgrade().map_or_else(|| Held::Strong(flight.clone()), Held::Weak);
                (flight, held)
            }
        };

        slots.insert(key, Slot { id, held });
        (flight, false)
    }
}

/// Removes the entry of flight `id` when dropped.
struct Settle<K: Hash + Eq, T> {
    slots: Slots<K, T>,
    key: K,
    id: u64,
}

impl<K: Hash + Eq, T> Drop for Settle<K, T> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if slots.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            slots.remove(&self.key);
        }
    }
}

async fn join<T>(task: JoinHandle<T>) -> T {
    match task.await {
        Ok(outcome) => outcome,
        // Re-raise the flight's panic on every caller.
        Err(error) => std::panic::resume_unwind(
            error
                .try_into_panic()
                .unwrap_or_else(|error| Box::new(error.to_string()) as Box<dyn Any + Send>),
        ),
    }
}
