//! Cache state observers

use super::object::CacheId;

/// Receives cache object state transitions
///
/// All methods default to no-ops. Called from whichever thread caused the
/// transition, possibly while the object's own lock is held, so
/// implementations must not call back into the cache.
pub trait CacheObserver: Send + Sync {
    /// Object finished loading and now holds `size` bytes
    fn on_loaded(&self, _id: CacheId, _size: usize) {}

    /// Object released `size` bytes
    fn on_unloaded(&self, _id: CacheId, _size: usize) {}

    /// A handle to the object was created
    fn on_referenced(&self, _id: CacheId) {}

    /// A handle to the object was dropped
    fn on_unreferenced(&self, _id: CacheId) {}

    /// Lookup found a loaded object
    fn on_hit(&self, _id: CacheId) {}

    /// Lookup found nothing usable
    fn on_miss(&self, _id: CacheId) {}
}
