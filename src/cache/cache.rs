//! Object cache arena

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use crate::core::error::Error;
use crate::core::types::Result;
use super::object::{CacheEntry, CacheId, CacheObject, Handle, Observers};
use super::observer::CacheObserver;
use super::policy::{CachePolicy, EvictionCandidate};
use super::statistics::CacheStatistics;

/// Result of an eviction pass that got the cache lock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Cache empty or the policy's gate stayed closed
    NotActivated,
    /// Policy activated but nothing was eligible for eviction
    Empty,
    /// Policy ran and unloaded `evicted` objects
    Activated { evicted: usize },
}

/// Thread-safe cache of [`CacheObject`]s keyed by [`CacheId`]
///
/// Holds at most one object per id. Lookups take the table's read lock;
/// inserts take the write lock; each object's load/unload is serialized by
/// its own lock so unrelated objects never contend.
pub struct Cache<T: CacheObject> {
    objects: RwLock<HashMap<CacheId, Arc<CacheEntry<T>>>>,
    observers: Arc<Observers>,
    statistics: Arc<CacheStatistics>,
    eviction: Mutex<()>,
}

impl<T: CacheObject> Cache<T> {
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `name` - Label used in statistics output
    /// * `max_bytes` - Budget reported by the statistics
    pub fn new(name: impl Into<String>, max_bytes: usize) -> Self {
        let statistics = Arc::new(CacheStatistics::new(name, max_bytes));
        let observers = Arc::new(Observers::default());
        observers.add(statistics.clone());

        Self {
            objects: RwLock::new(HashMap::new()),
            observers,
            statistics,
            eviction: Mutex::new(()),
        }
    }

    /// Attach another observer
    pub fn add_observer(&self, observer: Arc<dyn CacheObserver>) {
        self.observers.add(observer);
    }

    /// Live counters of this cache
    pub fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }

    /// Handle to a loaded object, without creating or loading anything
    ///
    /// Counts a hit when the object is loaded and a miss otherwise. The
    /// returned handle always refers to a loaded object.
    pub fn get(&self, id: CacheId) -> Option<Handle<T>> {
        let Some(entry) = self.entry(id) else {
            self.observers.notify(|o| o.on_miss(id));
            return None;
        };

        // Reference before checking so a concurrent eviction pass skips it
        let handle = Handle::new(entry.clone(), self.observers.clone());
        if entry.touch_if_loaded() {
            self.observers.notify(|o| o.on_hit(id));
            Some(handle)
        } else {
            drop(handle);
            self.observers.notify(|o| o.on_miss(id));
            None
        }
    }

    /// Whether `id` is present and loaded; does not count as a lookup
    pub fn is_loaded(&self, id: CacheId) -> bool {
        self.entry(id).is_some_and(|entry| entry.is_loaded())
    }

    /// Whether the table holds an entry for `id`, loaded or not
    pub fn contains(&self, id: CacheId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or create the object for `id` and make sure it is loaded
    ///
    /// `make` is only called if the table has no entry for `id`. The
    /// returned handle keeps the object resident until dropped.
    ///
    /// # Errors
    /// Returns the object's load error; the object stays in the table,
    /// unloaded, and is not retried until the next call.
    pub fn load(&self, id: CacheId, make: impl FnOnce() -> T) -> Result<Handle<T>> {
        let entry = match self.entry(id) {
            Some(entry) => entry,
            None => {
                let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
                objects
                    .entry(id)
                    .or_insert_with(|| Arc::new(CacheEntry::new(id, make())))
                    .clone()
            }
        };

        // Reference before loading so a concurrent eviction pass skips it
        let handle = Handle::new(entry.clone(), self.observers.clone());
        entry.load(&self.observers).map_err(|e| {
            log::debug!("Load of {} failed: {}", id, e);
            match e {
                Error::LoadFailure(_) => e,
                other => Error::LoadFailure(format!("{id}: {other}")),
            }
        })?;
        Ok(handle)
    }

    /// Unload `id` if nothing references it
    ///
    /// Ignores the pinning of level-0 objects. Returns true if storage was
    /// released.
    pub fn unload(&self, id: CacheId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        entry.try_unload(&self.observers)
    }

    /// Run one eviction pass
    ///
    /// Eligible objects are loaded, unreferenced, unloadable and not in
    /// `protect`. They are unloaded one at a time in the policy's order
    /// until the policy is satisfied. Entries left unloaded and
    /// unreferenced are dropped from the table afterwards.
    ///
    /// # Errors
    /// [`Error::CacheBusy`] if another pass is running.
    pub fn apply_policy(
        &self,
        policy: &dyn CachePolicy,
        protect: &HashSet<CacheId>,
    ) -> Result<PolicyOutcome> {
        let _pass = match self.eviction.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::CacheBusy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let outcome = self.evict(policy, protect);
        self.purge_unloaded();
        Ok(outcome)
    }

    fn evict(&self, policy: &dyn CachePolicy, protect: &HashSet<CacheId>) -> PolicyOutcome {
        let snapshot: Vec<Arc<CacheEntry<T>>> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        if snapshot.is_empty() || !policy.will_activate(&self.statistics) {
            return PolicyOutcome::NotActivated;
        }

        let by_id: HashMap<CacheId, &Arc<CacheEntry<T>>> =
            snapshot.iter().map(|entry| (entry.id(), entry)).collect();

        let mut candidates: Vec<EvictionCandidate> = snapshot
            .iter()
            .filter(|entry| entry.is_unloadable() && entry.ref_count() == 0 && !protect.contains(&entry.id()))
            .filter_map(|entry| {
                let state = entry.state();
                state.object.is_loaded().then(|| EvictionCandidate {
                    id: entry.id(),
                    size: state.object.size(),
                    last_used: state.last_used,
                })
            })
            .collect();

        if candidates.is_empty() {
            return PolicyOutcome::Empty;
        }

        policy.order(&mut candidates);

        let mut evicted = 0;
        for candidate in &candidates {
            if policy.is_satisfied(&self.statistics) {
                break;
            }
            if let Some(entry) = by_id.get(&candidate.id) {
                if entry.try_unload(&self.observers) {
                    evicted += 1;
                }
            }
        }

        log::debug!(
            "Evicted {} of {} candidates: {}",
            evicted,
            candidates.len(),
            self.statistics
        );
        PolicyOutcome::Activated { evicted }
    }

    /// Drop entries that hold no storage and no handles
    fn purge_unloaded(&self) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        // Strong count 1 means only the table refers to the entry
        objects.retain(|_, entry| Arc::strong_count(entry) > 1 || entry.is_loaded());
    }

    fn entry(&self, id: CacheId) -> Option<Arc<CacheEntry<T>>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}
