//! Mapping visible nodes onto resident ones

use std::collections::HashSet;

use crate::cache::{Cache, CacheObject};
use crate::volume::NodeId;

/// Nodes that can be rendered this frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvailableSet {
    /// Loaded nodes to render; no entry is an ancestor of another
    pub render_nodes: Vec<NodeId>,
    /// Visible nodes that had to fall back to an ancestor or had no data at all
    pub not_available: Vec<NodeId>,
}

impl AvailableSet {
    /// Whether every visible node is rendered at its own level
    pub fn is_complete(&self) -> bool {
        self.not_available.is_empty()
    }
}

/// Builds the [`AvailableSet`] for a list of visible nodes
pub struct AvailableSetGenerator;

impl AvailableSetGenerator {
    /// Resolve each visible node to its nearest loaded ancestor (itself included)
    ///
    /// The fallbacks are reduced to an antichain: an entry is dropped when
    /// any of its ancestors is also selected, so no volume region is drawn twice.
    pub fn generate(visibles: &[NodeId], is_loaded: impl Fn(NodeId) -> bool) -> AvailableSet {
        let mut selected: Vec<NodeId> = Vec::with_capacity(visibles.len());
        let mut seen = HashSet::with_capacity(visibles.len());
        let mut not_available = Vec::new();

        for &id in visibles {
            let found = std::iter::once(id)
                .chain(id.parents())
                .find(|candidate| is_loaded(*candidate));

            match found {
                Some(found) => {
                    if found != id {
                        not_available.push(id);
                    }
                    if seen.insert(found) {
                        selected.push(found);
                    }
                }
                None => not_available.push(id),
            }
        }

        // Removing an entry never removes an ancestor, so one pass reaches the fixed point
        let render_nodes: Vec<NodeId> = selected
            .iter()
            .copied()
            .filter(|id| !id.parents().iter().any(|parent| seen.contains(parent)))
            .collect();

        if !not_available.is_empty() {
            log::debug!(
                "{} of {} visible nodes not available, rendering {} nodes",
                not_available.len(),
                visibles.len(),
                render_nodes.len()
            );
        }

        AvailableSet { render_nodes, not_available }
    }

    /// [`generate`](Self::generate) against the residency of `cache`
    pub fn from_cache<T: CacheObject>(visibles: &[NodeId], cache: &Cache<T>) -> AvailableSet {
        Self::generate(visibles, |id| cache.is_loaded(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UVec3;

    fn id(level: u32, x: u32, y: u32, z: u32) -> NodeId {
        NodeId::new(level, UVec3::new(x, y, z), 0)
    }

    fn assert_antichain(nodes: &[NodeId]) {
        for a in nodes {
            for b in nodes {
                assert!(!a.is_parent_of(*b), "{a} is an ancestor of {b}");
            }
        }
    }

    #[test]
    fn test_all_loaded() {
        let visibles = id(1, 0, 0, 0).children();
        let set = AvailableSetGenerator::generate(&visibles, |_| true);

        assert_eq!(set.render_nodes, visibles);
        assert!(set.is_complete());
    }

    #[test]
    fn test_falls_back_to_ancestor() {
        let parent = id(1, 0, 0, 0);
        let visibles = parent.children();
        let loaded: HashSet<NodeId> = [parent, visibles[3]].into_iter().collect();

        let set = AvailableSetGenerator::generate(&visibles, |n| loaded.contains(&n));

        // The loaded child is covered by its rendered parent
        assert_eq!(set.render_nodes, vec![parent]);
        assert_eq!(set.not_available.len(), 7);
        assert!(!set.not_available.contains(&visibles[3]));
    }

    #[test]
    fn test_nothing_loaded() {
        let visibles = vec![id(2, 1, 1, 1), id(2, 2, 1, 1)];
        let set = AvailableSetGenerator::generate(&visibles, |_| false);

        assert!(set.render_nodes.is_empty());
        assert_eq!(set.not_available, visibles);
    }

    #[test]
    fn test_result_is_antichain() {
        let root = id(0, 0, 0, 0);
        let mut visibles = id(2, 0, 0, 0).children();
        visibles.extend(id(2, 3, 3, 3).children());
        visibles.push(id(1, 1, 0, 0));

        // Root plus a sprinkle of deeper nodes
        let loaded: HashSet<NodeId> = [root, visibles[0], visibles[9], id(2, 3, 3, 3)].into_iter().collect();
        let set = AvailableSetGenerator::generate(&visibles, |n| loaded.contains(&n));

        assert_antichain(&set.render_nodes);
        assert_eq!(set.render_nodes, vec![root]);
    }

    #[test]
    fn test_mixed_levels() {
        let a = id(2, 0, 0, 0);
        let b = id(2, 3, 3, 3);
        let visibles: Vec<NodeId> = a.children().into_iter().chain(b.children()).collect();
        let loaded: HashSet<NodeId> = a.children().into_iter().chain([b]).collect();

        let set = AvailableSetGenerator::generate(&visibles, |n| loaded.contains(&n));

        assert_antichain(&set.render_nodes);
        assert_eq!(set.render_nodes.len(), 9);
        assert!(set.render_nodes.contains(&b));
        assert_eq!(set.not_available, b.children());
    }
}
