//! Cache usage accounting

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::object::CacheId;
use super::observer::CacheObserver;

/// Usage counters of one cache
///
/// Attached to every cache as its first observer. Memory and object
/// counts follow load/unload events; hits and misses follow lookups.
pub struct CacheStatistics {
    name: String,
    max_bytes: usize,
    used_bytes: AtomicUsize,
    object_count: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStatistics {
    /// Zeroed counters
    ///
    /// # Arguments
    /// * `name` - Label printed by the report
    /// * `max_bytes` - Budget printed next to the usage
    pub fn new(name: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            name: name.into(),
            max_bytes,
            used_bytes: AtomicUsize::new(0),
            object_count: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Label of the observed cache
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured budget, used for reporting only
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Bytes held by loaded objects
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Acquire)
    }

    /// Number of loaded objects
    pub fn object_count(&self) -> usize {
        self.object_count.load(Ordering::Acquire)
    }

    /// Lookups that found a loaded object
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to load or found nothing
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that found a loaded object (0.0 when unused)
    pub fn hit_rate(&self) -> f32 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        hits as f32 / total as f32
    }

    /// Clear hit/miss counters; memory accounting is kept
    pub fn reset_lookups(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl CacheObserver for CacheStatistics {
    fn on_loaded(&self, _id: CacheId, size: usize) {
        self.used_bytes.fetch_add(size, Ordering::AcqRel);
        self.object_count.fetch_add(1, Ordering::AcqRel);
    }

    fn on_unloaded(&self, _id: CacheId, size: usize) {
        let _ = self.used_bytes.fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
            Some(used.saturating_sub(size))
        });
        let _ = self.object_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            Some(count.saturating_sub(1))
        });
    }

    fn on_hit(&self, _id: CacheId) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_miss(&self, _id: CacheId) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MB: f64 = 1024.0 * 1024.0;
        write!(
            f,
            "{} used: {:.1}/{:.1} MB, blocks: {}, hit: {:.1}%",
            self.name,
            self.used_bytes() as f64 / MB,
            self.max_bytes as f64 / MB,
            self.object_count(),
            self.hit_rate() * 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting() {
        let stats = CacheStatistics::new("data", 4096);
        let id = CacheId::INVALID;

        stats.on_loaded(id, 1000);
        stats.on_loaded(id, 500);
        assert_eq!(stats.used_bytes(), 1500);
        assert_eq!(stats.object_count(), 2);

        stats.on_unloaded(id, 1000);
        assert_eq!(stats.used_bytes(), 500);
        assert_eq!(stats.object_count(), 1);

        // Never underflows
        stats.on_unloaded(id, 9999);
        stats.on_unloaded(id, 1);
        assert_eq!(stats.used_bytes(), 0);
        assert_eq!(stats.object_count(), 0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStatistics::new("data", 0);
        assert_eq!(stats.hit_rate(), 0.0);

        stats.on_hit(CacheId::INVALID);
        stats.on_hit(CacheId::INVALID);
        stats.on_hit(CacheId::INVALID);
        stats.on_miss(CacheId::INVALID);
        assert_eq!(stats.hit_rate(), 0.75);

        stats.reset_lookups();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
    }

    #[test]
    fn test_display() {
        let stats = CacheStatistics::new("Data cache", 2 * 1024 * 1024);
        stats.on_loaded(CacheId::INVALID, 1024 * 1024);
        stats.on_hit(CacheId::INVALID);
        stats.on_miss(CacheId::INVALID);
        assert_eq!(stats.to_string(), "Data cache used: 1.0/2.0 MB, blocks: 1, hit: 50.0%");
    }
}
