//! Geometry of one octree node

use std::fmt;

use crate::core::types::{UVec3, Vec3};
use crate::math::Aabb;
use super::node_id::NodeId;
use super::volume_info::VolumeInformation;

/// Half-open voxel box `[min, max)` in the voxel grid of a level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoxelBox {
    pub min: UVec3,
    pub max: UVec3,
}

impl VoxelBox {
    pub fn size(&self) -> UVec3 {
        self.max - self.min
    }

    pub fn voxel_count(&self) -> usize {
        let s = self.size();
        s.x as usize * s.y as usize * s.z as usize
    }
}

/// Node geometry derived from a [`NodeId`] and the volume layout
///
/// Immutable; compute it with [`LodNode::new`] or fetch a memoised copy
/// from a data source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodNode {
    node_id: NodeId,
    block_size: UVec3,
    voxel_box: VoxelBox,
    world_box: Aabb,
}

impl LodNode {
    /// Node for an id that is outside the volume
    pub fn invalid() -> Self {
        Self {
            node_id: NodeId::INVALID,
            block_size: UVec3::ZERO,
            voxel_box: VoxelBox::default(),
            world_box: Aabb::default(),
        }
    }

    /// Compute node geometry
    ///
    /// Returns [`LodNode::invalid`] when the id does not address a block of
    /// the volume's octree or lies outside its frame range.
    pub fn new(node_id: NodeId, info: &VolumeInformation) -> Self {
        let (first_frame, end_frame) = info.frame_range;
        if !info.root_node.contains(node_id)
            || node_id.frame() < first_frame
            || node_id.frame() >= end_frame
        {
            return Self::invalid();
        }

        let block_size = info.block_size();
        let position = node_id.position();
        let voxel_box = VoxelBox {
            min: position * block_size,
            max: (position + UVec3::ONE) * block_size,
        };

        // Voxel boxes of coarser levels cover proportionally more world space
        let world_per_voxel = info.world_space_per_voxel_at(node_id.level());
        let offset = info.world_size * 0.5;
        let world_box = Aabb::new(
            voxel_box.min.as_vec3() * world_per_voxel - offset,
            voxel_box.max.as_vec3() * world_per_voxel - offset,
        );

        Self { node_id, block_size, voxel_box, world_box }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn is_valid(&self) -> bool {
        self.node_id.is_valid()
    }

    /// Octree level of the node
    pub fn ref_level(&self) -> u32 {
        self.node_id.level()
    }

    /// Block size without halo
    pub fn block_size(&self) -> UVec3 {
        self.block_size
    }

    /// Voxel box in the grid of the node's level
    pub fn voxel_box(&self) -> VoxelBox {
        self.voxel_box
    }

    /// Voxels in the block, halo excluded
    pub fn voxel_count(&self) -> usize {
        self.voxel_box.voxel_count()
    }

    /// Payload bytes of the brick, halo included
    pub fn data_size(&self, info: &VolumeInformation) -> usize {
        if !self.is_valid() {
            return 0;
        }
        let padded = self.block_size + info.overlap * 2;
        padded.x as usize * padded.y as usize * padded.z as usize * info.bytes_per_voxel()
    }

    /// Axis-aligned box in world space (volume centred on the origin)
    pub fn world_box(&self) -> Aabb {
        self.world_box
    }

    /// World units per voxel of this node, smallest axis
    pub fn world_space_per_voxel(&self) -> f32 {
        let size: Vec3 = self.world_box.size() / self.voxel_box.size().max(UVec3::ONE).as_vec3();
        size.min_element()
    }
}

impl fmt::Display for LodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} world {:?}..{:?} voxels {:?}..{:?}",
            self.node_id,
            self.world_box.min,
            self.world_box.max,
            self.voxel_box.min,
            self.voxel_box.max,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::volume_info::DataType;

    fn elongated() -> VolumeInformation {
        VolumeInformation::regular(
            UVec3::new(1024, 1024, 512),
            UVec3::splat(32),
            UVec3::splat(4),
            DataType::U8,
        )
    }

    #[test]
    fn test_first_root_child() {
        let info = elongated();
        let root = info.root_node.roots(0)[0];
        let child = root.children()[0];
        let node = LodNode::new(child, &info);

        assert!(node.is_valid());
        assert_eq!(node.ref_level(), 1);
        assert_eq!(node.voxel_box().size(), UVec3::splat(32));
        assert_eq!(node.voxel_count(), 32 * 32 * 32);
        assert_eq!(node.data_size(&info), 40 * 40 * 40);
        assert_eq!(node.data_size(&info), info.brick_bytes());
    }

    #[test]
    fn test_root_world_boxes_tile_volume() {
        let info = elongated();
        let roots = info.root_node.roots(0);
        assert_eq!(roots.len(), 4);

        let first = LodNode::new(roots[0], &info).world_box();
        assert_eq!(first.min, Vec3::new(-0.5, -0.5, -0.25));
        assert_eq!(first.max, Vec3::new(0.0, 0.0, 0.25));

        let last = LodNode::new(*roots.last().unwrap(), &info).world_box();
        assert_eq!(last.max, Vec3::new(0.5, 0.5, 0.25));
    }

    #[test]
    fn test_finest_level_voxel_size() {
        let info = elongated();
        let id = NodeId::new(4, UVec3::new(31, 31, 15), 0);
        let node = LodNode::new(id, &info);
        assert!(node.is_valid());
        assert!((node.world_space_per_voxel() - 1.0 / 1024.0).abs() < 1e-7);
        assert_eq!(node.world_box().max, Vec3::new(0.5, 0.5, 0.25));
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        let info = elongated();
        assert!(!LodNode::new(NodeId::new(4, UVec3::new(0, 0, 16), 0), &info).is_valid());
        assert!(!LodNode::new(NodeId::new(5, UVec3::ZERO, 0), &info).is_valid());
        assert!(!LodNode::new(NodeId::new(0, UVec3::ZERO, 3), &info).is_valid());
        assert!(!LodNode::new(NodeId::INVALID, &info).is_valid());
        assert_eq!(LodNode::invalid().data_size(&info), 0);
    }
}
