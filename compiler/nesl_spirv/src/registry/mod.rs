//! Interning registries with at-most-once construction.
//!
//! Each key owns a [`Slot`] that is either building (owned by one thread) or
//! settled. The first caller for a key installs the slot and runs the factory
//! with no map lock held, so factories may recurse into this or any other
//! registry. Later callers block on the slot's condition variable.
//!
//! Blocking goes through the run's [`ConstructionTracker`], which records
//! which thread waits on which in-flight construction. A wait that would
//! close a chain back to the waiting thread is a cycle and fails with
//! [`CompileError::CyclicConstruction`] instead of deadlocking. Factories
//! must not call back into rayon: a worker blocked inside a factory must
//! not pick up unrelated work that waits on its own slot.

use crate::{CompileError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Identity of one in-flight construction, shared with the tracker.
struct InFlight {
    owner: ThreadId,
    label: String,
    finished: AtomicBool,
}

enum SlotState<V> {
    Building,
    Ready(V),
    Failed,
}

struct Slot<V> {
    state: Mutex<SlotState<V>>,
    settled: Condvar,
    in_flight: Arc<InFlight>,
}

impl<V: Clone> Slot<V> {
    fn new(owner: ThreadId, label: String) -> Self {
        Self {
            state: Mutex::new(SlotState::Building),
            settled: Condvar::new(),
            in_flight: Arc::new(InFlight {
                owner,
                label,
                finished: AtomicBool::new(false),
            }),
        }
    }

    fn settle(&self, value: Option<V>) {
        self.in_flight.finished.store(true, Ordering::Release);
        let mut state = self.state.lock();
        *state = match value {
            Some(value) => SlotState::Ready(value),
            None => SlotState::Failed,
        };
        self.settled.notify_all();
    }

    fn settled_value(&self, state: &SlotState<V>) -> Option<Result<V>> {
        match state {
            SlotState::Building => None,
            SlotState::Ready(value) => Some(Ok(value.clone())),
            SlotState::Failed => Some(Err(CompileError::ConstructionFailed {
                key: self.in_flight.label.clone(),
            })),
        }
    }

    fn wait(&self, tracker: &ConstructionTracker) -> Result<V> {
        if let Some(result) = self.settled_value(&self.state.lock()) {
            return result;
        }

        let me = thread::current().id();
        tracker.begin_wait(me, &self.in_flight)?;

        let mut state = self.state.lock();
        while matches!(*state, SlotState::Building) {
            self.settled.wait(&mut state);
        }
        let result = self.settled_value(&state);
        drop(state);

        tracker.end_wait(me);
        result.unwrap_or_else(|| {
            Err(CompileError::ConstructionFailed {
                key: self.in_flight.label.clone(),
            })
        })
    }
}

/// Marks a slot failed if its factory unwinds, so waiters are released.
struct SettleOnUnwind<'s, V: Clone> {
    slot: &'s Slot<V>,
}

impl<V: Clone> SettleOnUnwind<'_, V> {
    fn settle(self, value: Option<V>) {
        self.slot.settle(value);
        std::mem::forget(self);
    }
}

impl<V: Clone> Drop for SettleOnUnwind<'_, V> {
    fn drop(&mut self) {
        self.slot.settle(None);
    }
}

/// Per-run record of threads blocked on in-flight constructions.
#[derive(Default)]
pub(crate) struct ConstructionTracker {
    waiting: Mutex<FxHashMap<ThreadId, Arc<InFlight>>>,
}

impl ConstructionTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn begin_wait(&self, me: ThreadId, target: &Arc<InFlight>) -> Result<()> {
        let mut waiting = self.waiting.lock();
        if target.finished.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut owner = target.owner;
        loop {
            if owner == me {
                return Err(CompileError::CyclicConstruction {
                    key: target.label.clone(),
                });
            }
            match waiting.get(&owner) {
                Some(next) if !next.finished.load(Ordering::Acquire) => owner = next.owner,
                _ => break,
            }
        }

        waiting.insert(me, Arc::clone(target));
        Ok(())
    }

    fn end_wait(&self, me: ThreadId) {
        self.waiting.lock().remove(&me);
    }
}

/// Memoized map from a structural key to a constructed entity.
pub(crate) struct Registry<K, V> {
    name: &'static str,
    slots: DashMap<K, Arc<Slot<V>>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: DashMap::new(),
        }
    }

    /// Return the entity for `key`, running `factory` if no thread has
    /// requested it yet. The factory runs at most once per key.
    pub(crate) fn get_or_try_insert_with<F>(
        &self,
        key: &K,
        tracker: &ConstructionTracker,
        factory: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let me = thread::current().id();
        let (slot, is_owner) = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(Slot::new(me, format!("{} {key:?}", self.name)));
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        };

        if !is_owner {
            return slot.wait(tracker);
        }

        let guard = SettleOnUnwind { slot: &slot };
        let result = factory();
        guard.settle(result.as_ref().ok().cloned());
        result
    }

    /// The settled entity for `key`, without constructing it.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.get(key).map(|entry| Arc::clone(entry.value()))?;
        let state = slot.state.lock();
        match &*state {
            SlotState::Ready(value) => Some(value.clone()),
            SlotState::Building | SlotState::Failed => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
