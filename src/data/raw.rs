//! Headerless raw volume files (`raw://`)
//!
//! URI form: `raw://<path>#<x>,<y>,<z>,<type>`. The file holds
//! `x * y * z` voxels of the given type in x-fastest order and is served
//! as a single brick covering the whole volume.

use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use crate::volume::{DataType, LodNode, RootNode, VolumeInformation};
use super::registry::DataSourcePluginFactory;
use super::source::DataSourcePlugin;
use super::uri::SourceUri;

/// Raw file backend
pub struct RawSource {
    path: PathBuf,
    info: VolumeInformation,
}

impl RawSource {
    /// Open a raw file and check its size against the declared dimensions
    pub fn open(path: &Path, voxels: UVec3, data_type: DataType) -> Result<Self> {
        if voxels.min_element() == 0 || data_type == DataType::Undefined {
            return Err(Error::InvalidSource(format!(
                "{}: dimensions and data type must be defined",
                path.display()
            )));
        }

        let mut info = VolumeInformation {
            data_type,
            overlap: UVec3::ZERO,
            maximum_block_size: voxels,
            voxels,
            ..Default::default()
        };
        info.world_space_per_voxel = 1.0 / voxels.max_element() as f32;
        info.world_size = voxels.as_vec3() * info.world_space_per_voxel;
        info.root_node = RootNode::new(1, UVec3::ONE);

        let expected = info.brick_bytes() as u64;
        let actual = std::fs::metadata(path)
            .map_err(|e| Error::InvalidSource(format!("{}: {e}", path.display())))?
            .len();
        if actual < expected {
            return Err(Error::InvalidSource(format!(
                "{}: {actual} bytes, expected {expected}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    fn from_uri(uri: &SourceUri) -> Result<Self> {
        let values = uri.fragment_values();
        if values.len() < 4 {
            return Err(Error::InvalidSource(format!(
                "raw source needs '#x,y,z,type', got '#{}'",
                uri.fragment
            )));
        }

        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|e| Error::InvalidSource(format!("'{s}' in '{}': {e}", uri.fragment)))
        };
        let voxels = UVec3::new(parse(values[0])?, parse(values[1])?, parse(values[2])?);
        let data_type = DataType::from_name(values[3])
            .ok_or_else(|| Error::InvalidSource(format!("unknown data type '{}'", values[3])))?;

        Self::open(Path::new(&uri.path), voxels, data_type)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSourcePlugin for RawSource {
    fn volume_info(&self) -> &VolumeInformation {
        &self.info
    }

    fn data(&self, node: &LodNode) -> Result<Vec<u8>> {
        if node.ref_level() != 0 {
            return Err(Error::LoadFailure(format!("raw volumes have a single level, got {}", node.node_id())));
        }

        let mut bytes = std::fs::read(&self.path)
            .map_err(|e| Error::LoadFailure(format!("{}: {e}", self.path.display())))?;
        let expected = self.info.brick_bytes();
        if bytes.len() < expected {
            return Err(Error::LoadFailure(format!(
                "{} shrank to {} bytes",
                self.path.display(),
                bytes.len()
            )));
        }
        bytes.truncate(expected);
        Ok(bytes)
    }
}

/// Factory for the `raw` scheme
pub struct RawSourceFactory;

impl DataSourcePluginFactory for RawSourceFactory {
    fn scheme(&self) -> &str {
        "raw"
    }

    fn create(&self, uri: &SourceUri) -> Result<Box<dyn DataSourcePlugin>> {
        Ok(Box::new(RawSource::from_uri(uri)?))
    }
}
