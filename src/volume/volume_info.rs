//! Volume description and octree layout

use std::fmt;

use crate::core::types::{UVec3, Vec3};
use super::node_id::NodeId;

/// Scalar type of one voxel component
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    #[default]
    Undefined,
}

impl DataType {
    /// Size of one component in bytes (0 for `Undefined`)
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::Undefined => 0,
        }
    }

    /// Parse the type names used in data URIs
    ///
    /// Accepts both C spellings (`unsigned short`) and sized names (`uint16`).
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.trim() {
            "char" | "int8" | "i8" => DataType::I8,
            "unsigned char" | "uint8" | "u8" => DataType::U8,
            "short" | "int16" | "i16" => DataType::I16,
            "unsigned short" | "uint16" | "u16" => DataType::U16,
            "int" | "int32" | "i32" => DataType::I32,
            "unsigned int" | "uint32" | "u32" => DataType::U32,
            "float" | "float32" | "f32" => DataType::F32,
            "double" | "float64" | "f64" => DataType::F64,
            _ => return None,
        };
        Some(ty)
    }
}

/// Shape of the octree: number of levels and block grid at level 0
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootNode {
    depth: u32,
    blocks: UVec3,
}

impl Default for RootNode {
    fn default() -> Self {
        Self { depth: 1, blocks: UVec3::ONE }
    }
}

impl RootNode {
    pub fn new(depth: u32, blocks: UVec3) -> Self {
        Self { depth, blocks }
    }

    /// Number of levels in the tree
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Block grid at level 0
    pub fn blocks(&self) -> UVec3 {
        self.blocks
    }

    /// Block grid at `level`; doubles per level
    pub fn block_count(&self, level: u32) -> UVec3 {
        self.blocks << level
    }

    /// Level-0 nodes of a frame
    pub fn roots(&self, frame: u32) -> Vec<NodeId> {
        let mut roots = Vec::with_capacity(self.blocks.element_product() as usize);
        for x in 0..self.blocks.x {
            for y in 0..self.blocks.y {
                for z in 0..self.blocks.z {
                    roots.push(NodeId::new(0, UVec3::new(x, y, z), frame));
                }
            }
        }
        roots
    }

    /// True if `id` addresses a block of this tree
    pub fn contains(&self, id: NodeId) -> bool {
        id.is_valid()
            && id.level() < self.depth
            && id.position().cmplt(self.block_count(id.level())).all()
    }
}

/// Static description of a volume dataset
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeInformation {
    pub big_endian: bool,
    /// Components per voxel
    pub component_count: u32,
    pub data_type: DataType,
    /// Halo voxels on each side of a block
    pub overlap: UVec3,
    /// Block size including the halo on both sides
    pub maximum_block_size: UVec3,
    /// Voxel dimensions at the finest level
    pub voxels: UVec3,
    /// Extent in world units; the largest axis is 1
    pub world_size: Vec3,
    /// World units per voxel at the finest level
    pub world_space_per_voxel: f32,
    pub root_node: RootNode,
    /// Frames available as `[start, end)`
    pub frame_range: (u32, u32),
}

impl Default for VolumeInformation {
    fn default() -> Self {
        Self {
            big_endian: false,
            component_count: 1,
            data_type: DataType::U8,
            overlap: UVec3::ZERO,
            maximum_block_size: UVec3::splat(32),
            voxels: UVec3::splat(32),
            world_size: Vec3::ONE,
            world_space_per_voxel: 1.0 / 32.0,
            root_node: RootNode::default(),
            frame_range: (0, 1),
        }
    }
}

impl VolumeInformation {
    /// Describe a regular volume and derive its octree
    ///
    /// # Arguments
    /// * `voxels` - Voxel dimensions at the finest level
    /// * `block_size` - Block size without halo
    /// * `overlap` - Halo voxels per side
    pub fn regular(voxels: UVec3, block_size: UVec3, overlap: UVec3, data_type: DataType) -> Self {
        let mut info = Self {
            data_type,
            overlap,
            maximum_block_size: block_size + overlap * 2,
            voxels,
            ..Default::default()
        };
        info.fill_regular();
        info
    }

    /// Bytes per voxel over all components
    pub fn bytes_per_voxel(&self) -> usize {
        self.data_type.size_in_bytes() * self.component_count as usize
    }

    /// Block size without the halo
    pub fn block_size(&self) -> UVec3 {
        self.maximum_block_size.saturating_sub(self.overlap * 2)
    }

    /// Payload size of one brick, halo included
    pub fn brick_bytes(&self) -> usize {
        let m = self.maximum_block_size;
        m.x as usize * m.y as usize * m.z as usize * self.bytes_per_voxel()
    }

    /// Number of octree levels
    pub fn depth(&self) -> u32 {
        self.root_node.depth()
    }

    /// World units per voxel of a block at `level`
    pub fn world_space_per_voxel_at(&self, level: u32) -> f32 {
        let coarsening = self.depth().saturating_sub(level + 1);
        self.world_space_per_voxel * (1u64 << coarsening) as f32
    }

    /// Derive world size and octree shape from voxels and block size
    ///
    /// The number of subdivisions is the smallest over the three axes of
    /// `ceil(log2(ceil(voxels / block)))`, which keeps blocks roughly cubic on
    /// elongated volumes. Level 0 then holds
    /// `ceil((voxels >> subdivisions) / block)` blocks per axis.
    pub fn fill_regular(&mut self) {
        let max_voxels = self.voxels.max_element().max(1) as f32;
        self.world_space_per_voxel = 1.0 / max_voxels;
        self.world_size = self.voxels.as_vec3() * self.world_space_per_voxel;

        let block = self.block_size().max(UVec3::ONE);
        let block_counts = div_ceil(self.voxels, block);
        let subdivisions = block_counts.to_array().into_iter().map(ceil_log2).min().unwrap_or(0);

        let root_blocks = div_ceil(self.voxels >> subdivisions, block).max(UVec3::ONE);
        self.root_node = RootNode::new(subdivisions + 1, root_blocks);
    }
}

impl fmt::Display for VolumeInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.voxels;
        let b = self.block_size();
        let r = self.root_node.blocks();
        write!(
            f,
            "{}x{}x{} voxels, {:?}x{}, block {}x{}x{} overlap {}, depth {}, root blocks {}x{}x{}",
            v.x, v.y, v.z,
            self.data_type, self.component_count,
            b.x, b.y, b.z, self.overlap.max_element(),
            self.depth(),
            r.x, r.y, r.z,
        )
    }
}

fn div_ceil(a: UVec3, b: UVec3) -> UVec3 {
    UVec3::new(a.x.div_ceil(b.x), a.y.div_ceil(b.y), a.z.div_ceil(b.z))
}

/// Smallest `n` with `2^n >= value`
fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        u32::BITS - (value - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_2048(voxels: UVec3) -> VolumeInformation {
        VolumeInformation::regular(voxels, UVec3::splat(64), UVec3::ZERO, DataType::U8)
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(32), 5);
        assert_eq!(ceil_log2(33), 6);
    }

    #[test]
    fn test_regular_cube() {
        let info = cube_2048(UVec3::splat(2048));
        assert_eq!(info.depth(), 6);
        assert_eq!(info.root_node.blocks(), UVec3::ONE);
        assert_eq!(info.world_size, Vec3::ONE);
        assert_eq!(info.world_space_per_voxel, 1.0 / 2048.0);
    }

    #[test]
    fn test_non_power_of_two_axis() {
        let info = cube_2048(UVec3::new(2048, 2099, 2048));
        assert_eq!(info.depth(), 6);
        assert_eq!(info.root_node.blocks(), UVec3::new(1, 2, 1));
        assert_eq!(info.world_space_per_voxel, 1.0 / 2099.0);

        let info = cube_2048(UVec3::new(2048, 2037, 2048));
        assert_eq!(info.depth(), 6);
        assert_eq!(info.root_node.blocks(), UVec3::ONE);

        let info = cube_2048(UVec3::new(2048, 2049, 2048));
        assert_eq!(info.depth(), 6);
        assert_eq!(info.root_node.blocks(), UVec3::ONE);
    }

    #[test]
    fn test_depth_from_shortest_axis() {
        let info = VolumeInformation::regular(
            UVec3::new(1024, 1024, 512),
            UVec3::splat(32),
            UVec3::splat(4),
            DataType::U8,
        );
        assert_eq!(info.maximum_block_size, UVec3::splat(40));
        assert_eq!(info.block_size(), UVec3::splat(32));
        // 32x32x16 blocks at the finest level, 4 subdivisions from the z axis
        assert_eq!(info.depth(), 5);
        assert_eq!(info.root_node.blocks(), UVec3::new(2, 2, 1));
        assert_eq!(info.root_node.block_count(4), UVec3::new(32, 32, 16));
        assert_eq!(info.world_size, Vec3::new(1.0, 1.0, 0.5));
    }

    #[test]
    fn test_bytes() {
        let mut info = VolumeInformation::regular(
            UVec3::splat(256),
            UVec3::splat(32),
            UVec3::splat(4),
            DataType::U16,
        );
        info.component_count = 2;
        assert_eq!(info.bytes_per_voxel(), 4);
        assert_eq!(info.brick_bytes(), 40 * 40 * 40 * 4);
    }

    #[test]
    fn test_root_node() {
        let root = RootNode::new(3, UVec3::new(2, 1, 1));
        assert_eq!(root.block_count(2), UVec3::new(8, 4, 4));
        assert_eq!(root.roots(7).len(), 2);
        assert!(root.roots(7).iter().all(|r| r.is_root() && r.frame() == 7));

        assert!(root.contains(NodeId::new(2, UVec3::new(7, 3, 3), 0)));
        assert!(!root.contains(NodeId::new(2, UVec3::new(8, 0, 0), 0)));
        assert!(!root.contains(NodeId::new(3, UVec3::ZERO, 0)));
        assert!(!root.contains(NodeId::INVALID));
    }

    #[test]
    fn test_world_space_per_voxel_at() {
        let info = cube_2048(UVec3::splat(2048));
        assert_eq!(info.world_space_per_voxel_at(5), 1.0 / 2048.0);
        assert_eq!(info.world_space_per_voxel_at(0), 32.0 / 2048.0);
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::from_name("unsigned char"), Some(DataType::U8));
        assert_eq!(DataType::from_name("int16"), Some(DataType::I16));
        assert_eq!(DataType::from_name("float"), Some(DataType::F32));
        assert_eq!(DataType::from_name("quaternion"), None);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
        assert_eq!(DataType::Undefined.size_in_bytes(), 0);
    }
}
