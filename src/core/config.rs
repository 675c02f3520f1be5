//! Streaming configuration
//!
//! Runtime parameters for a streaming session: where the data comes from,
//! how much memory each cache may hold and how aggressively the LOD
//! selection refines. Stored as JSON; missing fields fall back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Parameters shared by the caches, the LOD selection and the executors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// URI handed to the data source registry (e.g. `mem://#512,512,512,32`)
    pub data_uri: String,
    /// Budget of the CPU brick cache in bytes
    pub max_cpu_cache_bytes: usize,
    /// Budget of the GPU texture cache in bytes
    pub max_gpu_cache_bytes: usize,
    /// Fraction of the budget freed by one eviction pass (0.0-1.0)
    pub cleanup_ratio: f32,
    /// Coarsest level the selection may stop at
    pub min_lod: u32,
    /// Finest level the selection may descend to
    pub max_lod: u32,
    /// Permitted on-screen size of one voxel in pixels
    pub screen_space_error: f32,
    /// Worker threads of the compute executor
    pub compute_threads: usize,
    /// Number of parallel upload filters per frame
    pub upload_threads: usize,
    /// Load every visible brick before a frame completes
    pub synchronous: bool,
    /// Concurrent loads of the background prefetcher
    pub prefetch_threads: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            data_uri: "mem://#1024,1024,1024,32".to_string(),
            max_cpu_cache_bytes: 1024 * 1024 * 1024,
            max_gpu_cache_bytes: 512 * 1024 * 1024,
            cleanup_ratio: 0.25,
            min_lod: 0,
            max_lod: crate::volume::node_id::MAX_LEVEL,
            screen_space_error: 1.0,
            compute_threads: 2,
            upload_threads: 4,
            synchronous: false,
            prefetch_threads: 4,
        }
    }
}

impl StreamingConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.min_lod > self.max_lod {
            return Err(Error::Config(format!(
                "min_lod {} exceeds max_lod {}",
                self.min_lod, self.max_lod
            )));
        }
        if !(0.0..=1.0).contains(&self.cleanup_ratio) {
            return Err(Error::Config(format!(
                "cleanup_ratio {} outside 0.0-1.0",
                self.cleanup_ratio
            )));
        }
        if self.screen_space_error <= 0.0 {
            return Err(Error::Config("screen_space_error must be positive".to_string()));
        }
        if self.compute_threads == 0 || self.upload_threads == 0 {
            return Err(Error::Config("thread counts must be non-zero".to_string()));
        }
        Ok(())
    }
}
