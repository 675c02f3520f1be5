//! Cache objects, their bookkeeping and counted handles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::core::types::Result;
use crate::volume::NodeId;
use super::observer::CacheObserver;

/// Identity of a cache object; the node id of the brick it holds
pub type CacheId = NodeId;

/// Payload stored in a [`Cache`](super::Cache)
///
/// `load` must be idempotent and leave the object unloaded on failure.
pub trait CacheObject: Send + 'static {
    /// Bytes held while loaded
    fn size(&self) -> usize;

    fn is_loaded(&self) -> bool;

    fn load(&mut self) -> Result<()>;

    /// Release storage
    fn unload(&mut self);
}

/// Observer list shared by a cache and its handles
#[derive(Default)]
pub(crate) struct Observers {
    list: RwLock<Vec<Arc<dyn CacheObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn CacheObserver>) {
        self.list.write().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    pub(crate) fn notify(&self, f: impl Fn(&dyn CacheObserver)) {
        for observer in self.list.read().unwrap_or_else(PoisonError::into_inner).iter() {
            f(observer.as_ref());
        }
    }
}

/// Mutable part of an entry, guarded by the entry's own lock
pub(crate) struct EntryState<T> {
    pub(crate) object: T,
    pub(crate) last_used: Instant,
    pub(crate) load_time: Duration,
}

/// One slot of the cache arena
pub(crate) struct CacheEntry<T> {
    id: CacheId,
    unloadable: bool,
    ref_count: AtomicUsize,
    state: Mutex<EntryState<T>>,
}

impl<T: CacheObject> CacheEntry<T> {
    pub(crate) fn new(id: CacheId, object: T) -> Self {
        Self {
            id,
            // Coarsest level stays resident as the fallback of last resort
            unloadable: id.level() != 0,
            ref_count: AtomicUsize::new(0),
            state: Mutex::new(EntryState {
                object,
                last_used: Instant::now(),
                load_time: Duration::ZERO,
            }),
        }
    }

    pub(crate) fn id(&self) -> CacheId {
        self.id
    }

    pub(crate) fn is_unloadable(&self) -> bool {
        self.unloadable
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, EntryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.state().object.is_loaded()
    }

    /// Mark as used now if loaded; returns whether it was
    pub(crate) fn touch_if_loaded(&self) -> bool {
        let mut state = self.state();
        if !state.object.is_loaded() {
            return false;
        }
        state.last_used = Instant::now();
        true
    }

    /// Load under the entry lock; reports hit or miss
    pub(crate) fn load(&self, observers: &Observers) -> Result<()> {
        let mut state = self.state();
        state.last_used = Instant::now();

        if state.object.is_loaded() {
            observers.notify(|o| o.on_hit(self.id));
            return Ok(());
        }

        observers.notify(|o| o.on_miss(self.id));
        let start = Instant::now();
        state.object.load()?;
        state.load_time = start.elapsed();

        let size = state.object.size();
        observers.notify(|o| o.on_loaded(self.id, size));
        Ok(())
    }

    /// Unload if nobody references the object; returns true if storage was released
    pub(crate) fn try_unload(&self, observers: &Observers) -> bool {
        let mut state = self.state();
        if self.ref_count() > 0 || !state.object.is_loaded() {
            return false;
        }

        let size = state.object.size();
        state.object.unload();
        observers.notify(|o| o.on_unloaded(self.id, size));
        true
    }
}

/// Counted reference to a cache object
///
/// While any handle exists the object cannot be evicted. Cloning and
/// dropping handles fire `on_referenced` and `on_unreferenced`.
pub struct Handle<T: CacheObject> {
    entry: Arc<CacheEntry<T>>,
    observers: Arc<Observers>,
}

impl<T: CacheObject> Handle<T> {
    pub(crate) fn new(entry: Arc<CacheEntry<T>>, observers: Arc<Observers>) -> Self {
        entry.ref_count.fetch_add(1, Ordering::AcqRel);
        observers.notify(|o| o.on_referenced(entry.id));
        Self { entry, observers }
    }

    /// Id of the referenced object
    pub fn id(&self) -> CacheId {
        self.entry.id
    }

    /// Whether the object currently holds its payload
    pub fn is_loaded(&self) -> bool {
        self.entry.is_loaded()
    }

    /// False for pinned (level 0) objects
    pub fn is_unloadable(&self) -> bool {
        self.entry.unloadable
    }

    /// Number of live handles to this object
    pub fn ref_count(&self) -> usize {
        self.entry.ref_count()
    }

    /// Payload size in bytes, as reported by the object
    pub fn size(&self) -> usize {
        self.entry.state().object.size()
    }

    /// Time the last load took
    pub fn load_time(&self) -> Duration {
        self.entry.state().load_time
    }

    /// Run `f` with the payload while holding the object's lock
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.entry.state().object)
    }
}

impl<T: CacheObject> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self::new(self.entry.clone(), self.observers.clone())
    }
}

impl<T: CacheObject> Drop for Handle<T> {
    fn drop(&mut self) {
        self.entry.ref_count.fetch_sub(1, Ordering::AcqRel);
        self.observers.notify(|o| o.on_unreferenced(self.entry.id));
    }
}

impl<T: CacheObject> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.entry.id)
            .field("ref_count", &self.entry.ref_count())
            .finish()
    }
}
