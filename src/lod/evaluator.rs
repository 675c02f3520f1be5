//! Screen-space error LOD evaluator

use crate::core::types::Vec3;
use crate::math::Frustum;

/// Smallest argument handed to `log2`
const MIN_VOXELS_PER_PIXEL: f32 = f32::MIN_POSITIVE;

/// Picks the coarsest level whose voxels stay below a pixel budget
///
/// Level 0 is the coarsest. The finest voxel size is measured in pixels
/// of the near plane, scaled by the permitted error, then carried out to
/// the point's distance from the near plane. Every doubling of that ratio
/// coarsens the result by one level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenSpaceLodEvaluator {
    window_height: u32,
    screen_space_error: f32,
    world_space_per_voxel: f32,
    min_lod: u32,
    max_lod: u32,
}

impl ScreenSpaceLodEvaluator {
    /// # Arguments
    /// * `window_height` - Viewport height in pixels
    /// * `screen_space_error` - Permitted on-screen voxel size in pixels
    /// * `world_space_per_voxel` - Voxel size at the finest level
    /// * `min_lod`, `max_lod` - Bounds of the returned level
    pub fn new(
        window_height: u32,
        screen_space_error: f32,
        world_space_per_voxel: f32,
        min_lod: u32,
        max_lod: u32,
    ) -> Self {
        Self {
            window_height: window_height.max(1),
            screen_space_error,
            world_space_per_voxel,
            min_lod,
            max_lod,
        }
    }

    /// Level required at `point` for a tree of `depth` levels
    pub fn lod_for_point(&self, frustum: &Frustum, depth: u32, point: Vec3) -> u32 {
        if depth == 0 {
            return 0;
        }

        let world_space_per_pixel = (frustum.top() - frustum.bottom()) / self.window_height as f32;
        let voxels_per_pixel =
            self.world_space_per_voxel / world_space_per_pixel * self.screen_space_error;

        let distance = frustum.near_plane().distance_to_point(point).abs();
        let at_distance = (voxels_per_pixel * distance / frustum.near()).max(MIN_VOXELS_PER_PIXEL);

        let coarsening = at_distance.log2().clamp(0.0, (depth - 1) as f32) as u32;
        let lod = depth - coarsening - 1;

        let lo = self.min_lod.min(depth - 1);
        let hi = self.max_lod.min(depth - 1).max(lo);
        lod.clamp(lo, hi)
    }
}
