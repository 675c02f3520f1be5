//! Octree traversal selecting the nodes to render

use crate::data::DataSource;
use crate::math::Frustum;
use crate::volume::{LodNode, NodeId};
use super::evaluator::ScreenSpaceLodEvaluator;

/// Depth-first visibility selection
///
/// Descent stops at nodes outside the frustum and at nodes that are
/// detailed enough for their distance. A node counts as visible when
///
/// * its level is at least the evaluated level and at least `min_lod`, or
/// * its level is `max_lod`, or
/// * it sits at the deepest level of the tree.
///
/// The visible list keeps traversal order; `range` then keeps the slice
/// `[range[0] * n, range[1] * n)` of it for sort-last decomposition.
pub struct SelectVisibles {
    frustum: Frustum,
    evaluator: ScreenSpaceLodEvaluator,
    min_lod: u32,
    max_lod: u32,
    range: [f64; 2],
}

impl SelectVisibles {
    pub fn new(
        frustum: Frustum,
        evaluator: ScreenSpaceLodEvaluator,
        min_lod: u32,
        max_lod: u32,
        range: [f64; 2],
    ) -> Self {
        Self { frustum, evaluator, min_lod, max_lod, range }
    }

    /// Visible nodes of `frame`
    pub fn select(&self, source: &DataSource, frame: u32) -> Vec<NodeId> {
        let info = source.volume_info();
        let depth = info.depth();

        let mut visibles = Vec::new();
        let mut stack: Vec<NodeId> = info.root_node.roots(frame);
        stack.reverse();

        while let Some(id) = stack.pop() {
            let node = source.node(id);
            if !node.is_valid() {
                continue;
            }

            if self.is_visible(&node, depth) {
                visibles.push(id);
                continue;
            }

            if self.frustum.intersects_aabb(&node.world_box()) {
                // Reverse so the first child is visited first
                stack.extend(id.children().into_iter().rev());
            }
        }

        log::trace!("Selected {} visible nodes for frame {}", visibles.len(), frame);
        self.restrict_to_range(visibles)
    }

    /// Visibility of an in-frustum node; false for nodes outside the frustum
    fn is_visible(&self, node: &LodNode, depth: u32) -> bool {
        let world_box = node.world_box();
        if !self.frustum.intersects_aabb(&world_box) {
            return false;
        }

        let near = self.frustum.near_plane();
        // Boxes cut by the near plane are judged where the view axis meets it
        let point = if world_box.straddles(near) {
            self.frustum.near_center()
        } else {
            world_box.nearest_corner(near)
        };

        let level = node.ref_level();
        let lod_ok = self.evaluator.lod_for_point(&self.frustum, depth, point) <= level;

        (lod_ok && level >= self.min_lod) || level == self.max_lod || level + 1 == depth
    }

    fn restrict_to_range(&self, visibles: Vec<NodeId>) -> Vec<NodeId> {
        if self.range == [0.0, 1.0] {
            return visibles;
        }
        let count = visibles.len() as f64;
        let start = (self.range[0] * count) as usize;
        let end = (self.range[1] * count) as usize;
        visibles
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i >= start && *i < end)
            .map(|(_, id)| id)
            .collect()
    }
}
