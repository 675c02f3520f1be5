//! Spatial data model: node ids, octree layout and per-node geometry

pub mod node_id;
pub mod volume_info;
pub mod lod_node;

pub use node_id::NodeId;
pub use volume_info::{DataType, RootNode, VolumeInformation};
pub use lod_node::{LodNode, VoxelBox};
