//! Reference-counted object cache with pluggable eviction
//!
//! [`Cache`] owns every object in an arena keyed by [`CacheId`] and hands
//! out counted [`Handle`]s. State transitions are reported to
//! [`CacheObserver`]s; [`CacheStatistics`] is always attached. Eviction is
//! driven from outside through [`Cache::apply_policy`].

pub mod object;
pub mod observer;
pub mod statistics;
pub mod policy;
pub mod cache;
pub mod data_object;

pub use object::{CacheId, CacheObject, Handle};
pub use observer::CacheObserver;
pub use statistics::CacheStatistics;
pub use policy::{CachePolicy, EvictionCandidate, LruPolicy};
pub use cache::{Cache, PolicyOutcome};
pub use data_object::{DataCache, DataObject};
