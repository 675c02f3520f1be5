//! Pipeline filters of the render pipeline

use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::Handle;
use crate::core::types::Result;
use crate::data::DataSource;
use crate::lod::{AvailableSet, AvailableSetGenerator, ScreenSpaceLodEvaluator, SelectVisibles};
use crate::pipeline::{Filter, FutureMap, PortInfo, PromiseMap, port};
use crate::volume::NodeId;
use super::frame::FrameInfo;
use super::texture::{TextureCache, TextureObject};

pub const FRAME: &str = "Frame";
pub const VISIBLE_NODES: &str = "VisibleNodes";
pub const CACHE_OBJECTS: &str = "CacheObjects";
pub const AVAILABLE_SET: &str = "AvailableSet";
pub const RENDERING_DONE: &str = "RenderingDone";

/// Handles keeping uploaded bricks resident while a frame uses them
pub type TextureHandles = Vec<Handle<TextureObject>>;

/// Frame → visible node ids
pub struct VisibleSetFilter {
    source: Arc<DataSource>,
    screen_space_error: f32,
    min_lod: u32,
    max_lod: u32,
}

impl VisibleSetFilter {
    pub fn new(source: Arc<DataSource>, screen_space_error: f32, min_lod: u32, max_lod: u32) -> Self {
        Self {
            source,
            screen_space_error,
            min_lod,
            max_lod,
        }
    }
}

impl Filter for VisibleSetFilter {
    fn inputs(&self) -> Vec<PortInfo> {
        vec![port::<FrameInfo>(FRAME)]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![port::<Vec<NodeId>>(VISIBLE_NODES)]
    }

    fn execute(&self, input: &FutureMap, output: &PromiseMap) -> Result<()> {
        let frame = input.get::<FrameInfo>(FRAME)?;
        let evaluator = ScreenSpaceLodEvaluator::new(
            frame.window_height,
            self.screen_space_error,
            self.source.volume_info().world_space_per_voxel,
            self.min_lod,
            self.max_lod,
        );

        let visibles = SelectVisibles::new(frame.frustum, evaluator, self.min_lod, self.max_lod, frame.range)
            .select(&self.source, frame.frame);
        log::trace!("Frame {}: {} visible nodes", frame.frame, visibles.len());
        output.set(VISIBLE_NODES, visibles)
    }
}

/// One of `count` uploaders, each handling a contiguous share of the visibles
///
/// Synchronous uploaders load their whole share in parallel and output the
/// handles. Asynchronous ones output only what is already resident and
/// then load the rest for later frames.
pub struct DataUploadFilter {
    index: usize,
    count: usize,
    textures: Arc<TextureCache>,
    synchronous: bool,
}

impl DataUploadFilter {
    pub fn new(index: usize, count: usize, textures: Arc<TextureCache>, synchronous: bool) -> Self {
        Self {
            index,
            count: count.max(1),
            textures,
            synchronous,
        }
    }

    /// This uploader's slice of `visibles`; the last one takes the remainder
    fn share<'a>(&self, visibles: &'a [NodeId]) -> &'a [NodeId] {
        let per_uploader = (visibles.len() / self.count).max(1);
        let start = self.index * per_uploader;
        if start >= visibles.len() {
            return &[];
        }
        let end = if self.index + 1 == self.count {
            visibles.len()
        } else {
            (start + per_uploader).min(visibles.len())
        };
        &visibles[start..end]
    }

    fn load(&self, ids: &[NodeId]) -> TextureHandles {
        ids.par_iter()
            .filter_map(|id| match self.textures.load(*id) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::debug!("Upload of {} failed: {}", id, e);
                    None
                }
            })
            .collect()
    }
}

impl Filter for DataUploadFilter {
    fn inputs(&self) -> Vec<PortInfo> {
        vec![port::<Vec<NodeId>>(VISIBLE_NODES)]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![port::<TextureHandles>(CACHE_OBJECTS)]
    }

    fn execute(&self, input: &FutureMap, output: &PromiseMap) -> Result<()> {
        let visibles = input.get::<Vec<NodeId>>(VISIBLE_NODES)?;
        let share = self.share(&visibles);

        if self.synchronous {
            return output.set(CACHE_OBJECTS, self.load(share));
        }

        let (resident, missing): (Vec<NodeId>, Vec<NodeId>) =
            share.iter().partition(|id| self.textures.is_loaded(**id));
        let handles: TextureHandles = resident.iter().filter_map(|id| self.textures.get(*id)).collect();
        output.set(CACHE_OBJECTS, handles)?;

        // Handles dropped right away; the bricks stay cached for the next frames
        let loaded = self.load(&missing).len();
        if loaded > 0 {
            log::trace!("Uploader {} loaded {} of {} bricks", self.index, loaded, missing.len());
        }
        Ok(())
    }
}

/// Visible node ids → resident render set
///
/// Accepts several visible lists (one per connection) and merges the
/// per-list results.
pub struct RenderingSetFilter {
    textures: Arc<TextureCache>,
}

impl RenderingSetFilter {
    pub fn new(textures: Arc<TextureCache>) -> Self {
        Self { textures }
    }
}

impl Filter for RenderingSetFilter {
    fn inputs(&self) -> Vec<PortInfo> {
        vec![port::<Vec<NodeId>>(VISIBLE_NODES)]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![
            port::<AvailableSet>(AVAILABLE_SET),
            port::<TextureHandles>(CACHE_OBJECTS),
            port::<bool>(RENDERING_DONE),
        ]
    }

    fn execute(&self, input: &FutureMap, output: &PromiseMap) -> Result<()> {
        let mut merged = AvailableSet::default();
        for visibles in input.get_all::<Vec<NodeId>>(VISIBLE_NODES)? {
            let set = AvailableSetGenerator::from_cache(&visibles, &self.textures);
            merged.render_nodes.extend(set.render_nodes);
            merged.not_available.extend(set.not_available);
        }

        let handles: TextureHandles = merged
            .render_nodes
            .iter()
            .filter_map(|id| self.textures.get(*id))
            .collect();

        output.set(RENDERING_DONE, merged.is_complete())?;
        output.set(CACHE_OBJECTS, handles)?;
        output.set(AVAILABLE_SET, merged)
    }
}
