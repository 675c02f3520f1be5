//! View-dependent level-of-detail selection
//!
//! [`SelectVisibles`] walks the octree and picks the nodes whose detail
//! matches the screen-space error at their distance. [`AvailableSetGenerator`]
//! then maps that wish list onto what the cache actually holds.

pub mod evaluator;
pub mod visibles;
pub mod available;

pub use evaluator::ScreenSpaceLodEvaluator;
pub use visibles::SelectVisibles;
pub use available::{AvailableSet, AvailableSetGenerator};
