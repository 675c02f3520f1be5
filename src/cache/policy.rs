//! Eviction policies

use std::time::Instant;

use super::object::CacheId;
use super::statistics::CacheStatistics;

/// Loaded, unreferenced object offered to a policy for eviction
#[derive(Clone, Copy, Debug)]
pub struct EvictionCandidate {
    pub id: CacheId,
    pub size: usize,
    pub last_used: Instant,
}

/// Decides when to evict and in which order
pub trait CachePolicy: Send + Sync {
    /// Whether an eviction pass should run at all
    fn will_activate(&self, stats: &CacheStatistics) -> bool;

    /// Whether enough has been evicted; checked after every unload
    fn is_satisfied(&self, stats: &CacheStatistics) -> bool;

    /// Sort candidates, first evicted first
    fn order(&self, candidates: &mut [EvictionCandidate]);
}

/// Least recently used eviction under a byte budget
///
/// Activates once used memory reaches `max_bytes` and evicts until usage
/// falls below `(1 - cleanup_ratio) * max_bytes`. A ratio of 1.0 evicts
/// every eligible object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LruPolicy {
    max_bytes: usize,
    cleanup_ratio: f32,
}

impl LruPolicy {
    /// # Arguments
    /// * `max_bytes` - Memory budget
    /// * `cleanup_ratio` - Fraction of the budget to free per pass (clamped to 0.0-1.0)
    pub fn new(max_bytes: usize, cleanup_ratio: f32) -> Self {
        Self {
            max_bytes,
            cleanup_ratio: cleanup_ratio.clamp(0.0, 1.0),
        }
    }

    /// Budget that activates the policy
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Fraction of the budget freed per pass
    pub fn cleanup_ratio(&self) -> f32 {
        self.cleanup_ratio
    }

    /// Usage the policy evicts down to
    pub fn target_bytes(&self) -> usize {
        ((1.0 - self.cleanup_ratio as f64) * self.max_bytes as f64) as usize
    }
}

impl CachePolicy for LruPolicy {
    fn will_activate(&self, stats: &CacheStatistics) -> bool {
        stats.used_bytes() >= self.max_bytes
    }

    fn is_satisfied(&self, stats: &CacheStatistics) -> bool {
        stats.used_bytes() < self.target_bytes()
    }

    fn order(&self, candidates: &mut [EvictionCandidate]) {
        candidates.sort_by_key(|c| c.last_used);
    }
}
