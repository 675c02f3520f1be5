//! Procedural in-memory volume (`mem://`)
//!
//! Serves synthetic bricks without touching storage. Useful for load tests
//! of the cache and pipeline.
//!
//! URI form: `mem://#<x>,<y>,<z>,<block>?sparsity=<0..1>&datatype=<name>`.
//! With fewer than four fragment values a 4096³ volume with 32³ blocks is
//! served. Blocks carry a 4-voxel halo.

use bytemuck::{Pod, Zeroable};

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use crate::volume::node_id::MAX_FRAME;
use crate::volume::{DataType, LodNode, VolumeInformation};
use super::registry::DataSourcePluginFactory;
use super::source::DataSourcePlugin;
use super::uri::SourceUri;

const OVERLAP: u32 = 4;
const DEFAULT_VOXELS: u32 = 4096;
const DEFAULT_BLOCK: u32 = 32;

/// Synthetic volume whose bricks are filled with a per-node constant
pub struct MemorySource {
    info: VolumeInformation,
    sparsity: f32,
}

impl MemorySource {
    /// Build a synthetic volume
    ///
    /// # Arguments
    /// * `voxels` - Volume dimensions
    /// * `block_size` - Block edge without halo
    /// * `sparsity` - Fraction of voxels that carry the fill value (1.0 = dense)
    pub fn new(voxels: UVec3, block_size: u32, data_type: DataType, sparsity: f32) -> Result<Self> {
        if block_size == 0 || voxels.min_element() == 0 {
            return Err(Error::InvalidSource("volume and block size must be non-zero".to_string()));
        }
        if data_type == DataType::Undefined {
            return Err(Error::InvalidSource("undefined data type".to_string()));
        }

        let mut info = VolumeInformation::regular(
            voxels,
            UVec3::splat(block_size),
            UVec3::splat(OVERLAP),
            data_type,
        );
        info.frame_range = (0, MAX_FRAME);

        Ok(Self {
            info,
            sparsity: sparsity.clamp(0.0, 1.0),
        })
    }

    fn from_uri(uri: &SourceUri) -> Result<Self> {
        let sparsity = match uri.query_value("sparsity") {
            Some(value) => value
                .parse::<f32>()
                .map_err(|e| Error::InvalidSource(format!("sparsity '{value}': {e}")))?,
            None => 1.0,
        };

        let data_type = match uri.query_value("datatype") {
            Some(name) => DataType::from_name(name)
                .ok_or_else(|| Error::InvalidSource(format!("unknown datatype '{name}'")))?,
            None => DataType::U8,
        };

        let values = uri.fragment_values();
        let (voxels, block) = if values.len() < 4 {
            (UVec3::splat(DEFAULT_VOXELS), DEFAULT_BLOCK)
        } else {
            let parse = |s: &str| {
                s.parse::<u32>()
                    .map_err(|e| Error::InvalidSource(format!("'{s}' in '{}': {e}", uri.fragment)))
            };
            (
                UVec3::new(parse(values[0])?, parse(values[1])?, parse(values[2])?),
                parse(values[3])?,
            )
        };

        Self::new(voxels, block, data_type, sparsity)
    }

    pub fn sparsity(&self) -> f32 {
        self.sparsity
    }

    /// Value every non-empty voxel of `node` holds
    fn fill_value(node: &LodNode) -> f32 {
        let id = node.node_id().raw().to_le_bytes();
        let folded = id[0] ^ id[1] ^ id[2] ^ id[3];
        // Frames drift slowly to emulate animation
        let drift = 127.0 * ((node.node_id().frame() as f32 + 1.0) / 200.0).sin();
        folded as f32 + 16.0 + drift
    }
}

impl DataSourcePlugin for MemorySource {
    fn volume_info(&self) -> &VolumeInformation {
        &self.info
    }

    fn data(&self, node: &LodNode) -> Result<Vec<u8>> {
        let count = node.data_size(&self.info) / self.info.data_type.size_in_bytes().max(1);
        let value = Self::fill_value(node);
        let seed = node.node_id().raw();

        let bytes = match self.info.data_type {
            DataType::U8 => fill::<u8>(count, value, self.sparsity, seed),
            DataType::I8 => fill::<i8>(count, value, self.sparsity, seed),
            DataType::U16 => fill::<u16>(count, value, self.sparsity, seed),
            DataType::I16 => fill::<i16>(count, value, self.sparsity, seed),
            DataType::U32 => fill::<u32>(count, value, self.sparsity, seed),
            DataType::I32 => fill::<i32>(count, value, self.sparsity, seed),
            DataType::F32 => fill::<f32>(count, value, self.sparsity, seed),
            DataType::F64 => fill::<f64>(count, value, self.sparsity, seed),
            DataType::Undefined => {
                return Err(Error::LoadFailure("undefined data type".to_string()));
            }
        };
        Ok(bytes)
    }
}

/// Factory for the `mem` scheme
pub struct MemorySourceFactory;

impl DataSourcePluginFactory for MemorySourceFactory {
    fn scheme(&self) -> &str {
        "mem"
    }

    fn create(&self, uri: &SourceUri) -> Result<Box<dyn DataSourcePlugin>> {
        Ok(Box::new(MemorySource::from_uri(uri)?))
    }
}

trait Sample: Pod {
    fn from_f32(value: f32) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            fn from_f32(value: f32) -> Self {
                value as $t
            }
        })*
    };
}

impl_sample!(u8, i8, u16, i16, u32, i32, f32, f64);

fn fill<T: Sample>(count: usize, value: f32, sparsity: f32, seed: u64) -> Vec<u8> {
    let value = T::from_f32(value);
    let samples: Vec<T> = if sparsity >= 1.0 {
        vec![value; count]
    } else {
        let threshold = (sparsity * 1_000_000.0) as u64;
        (0..count as u64)
            .map(|i| if mix(seed ^ i) % 1_000_000 < threshold { value } else { T::zeroed() })
            .collect()
    };
    bytemuck::cast_slice(&samples).to_vec()
}

/// splitmix64 finaliser; deterministic per (node, voxel)
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::NodeId;

    fn source(uri: &str) -> MemorySource {
        MemorySource::from_uri(&SourceUri::parse(uri).unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let source = source("mem://");
        let info = source.volume_info();
        assert_eq!(info.voxels, UVec3::splat(4096));
        assert_eq!(info.block_size(), UVec3::splat(32));
        assert_eq!(info.overlap, UVec3::splat(4));
        assert_eq!(info.data_type, DataType::U8);
        assert_eq!(info.depth(), 8);
    }

    #[test]
    fn test_payload_size_and_fill() {
        let source = source("mem://#1024,1024,512,32");
        let info = source.volume_info().clone();
        let node = LodNode::new(NodeId::new(1, UVec3::ZERO, 0), &info);

        let data = source.data(&node).unwrap();
        assert_eq!(data.len(), 40 * 40 * 40);
        assert_eq!(data.len(), info.brick_bytes());
        assert!(data.iter().all(|&b| b == data[0]));
        assert_ne!(data[0], 0);
    }

    #[test]
    fn test_datatype_query() {
        let source = source("mem://#64,64,64,16?datatype=uint16");
        let info = source.volume_info().clone();
        let node = LodNode::new(NodeId::new(0, UVec3::ZERO, 0), &info);

        let data = source.data(&node).unwrap();
        assert_eq!(data.len(), 24 * 24 * 24 * 2);
        let samples: &[u16] = bytemuck::cast_slice(&data);
        assert!(samples.iter().all(|&s| s == samples[0]));
    }

    #[test]
    fn test_sparsity_is_deterministic() {
        let source = source("mem://#64,64,64,16?sparsity=0.25");
        let info = source.volume_info().clone();
        let node = LodNode::new(NodeId::new(1, UVec3::new(1, 0, 1), 0), &info);

        let first = source.data(&node).unwrap();
        let second = source.data(&node).unwrap();
        assert_eq!(first, second);

        let filled = first.iter().filter(|&&b| b != 0).count() as f32 / first.len() as f32;
        assert!(filled > 0.15 && filled < 0.35, "filled fraction {filled}");
    }

    #[test]
    fn test_bad_parameters() {
        let parse = |uri: &str| MemorySource::from_uri(&SourceUri::parse(uri).unwrap());
        assert!(matches!(parse("mem://#64,64,x,16"), Err(Error::InvalidSource(_))));
        assert!(matches!(parse("mem://#64,64,64,0"), Err(Error::InvalidSource(_))));
        assert!(matches!(parse("mem://?datatype=complex"), Err(Error::InvalidSource(_))));
        assert!(matches!(parse("mem://?sparsity=lots"), Err(Error::InvalidSource(_))));
    }
}
