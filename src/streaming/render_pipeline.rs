//! Per-frame streaming driver

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{DataCache, LruPolicy, PolicyOutcome};
use crate::core::config::StreamingConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::data::DataSource;
use crate::lod::{AvailableSet, AvailableSetGenerator};
use crate::pipeline::{Executor, Pipeline, PipeFilter, Promise, port};
use crate::volume::NodeId;
use super::filters::{
    AVAILABLE_SET, CACHE_OBJECTS, DataUploadFilter, FRAME, RenderingSetFilter, TextureHandles,
    VISIBLE_NODES, VisibleSetFilter,
};
use super::frame::{FrameInfo, FrameResult};
use super::texture::{TextureCache, UploadSink};

/// Drives LOD selection, uploads and eviction for each rendered frame
///
/// Every call to [`render`](Self::render) builds a compute pipeline
/// (visible set, and in asynchronous mode the rendering set) and an upload
/// pipeline (`upload_threads` uploaders), runs them on their executors and
/// finally applies both cache budgets, protecting the nodes just rendered.
pub struct RenderPipeline {
    config: StreamingConfig,
    source: Arc<DataSource>,
    textures: Arc<TextureCache>,
    data_policy: LruPolicy,
    texture_policy: LruPolicy,
    compute: Executor,
    upload: Executor,
}

impl RenderPipeline {
    pub fn new(config: StreamingConfig, source: Arc<DataSource>, sink: Arc<dyn UploadSink>) -> Result<Self> {
        config.validate()?;

        let data_cache = Arc::new(DataCache::new(source.clone(), config.max_cpu_cache_bytes));
        let textures = Arc::new(TextureCache::new(data_cache, sink, config.max_gpu_cache_bytes));

        log::info!("Streaming {} ({})", source.uri(), source.volume_info());
        Ok(Self {
            data_policy: LruPolicy::new(config.max_cpu_cache_bytes, config.cleanup_ratio),
            texture_policy: LruPolicy::new(config.max_gpu_cache_bytes, config.cleanup_ratio),
            compute: Executor::new("compute", config.compute_threads)?,
            upload: Executor::new("upload", config.upload_threads)?,
            config,
            source,
            textures,
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    pub fn texture_cache(&self) -> &Arc<TextureCache> {
        &self.textures
    }

    pub fn data_cache(&self) -> &Arc<DataCache> {
        self.textures.data_cache()
    }

    /// Resolve one frame to the set of resident bricks to draw
    ///
    /// In synchronous mode every visible brick is loaded before returning.
    /// Otherwise the frame renders what is resident (falling back to
    /// ancestors) while the uploaders keep loading in the background.
    pub fn render(&self, frame: &FrameInfo) -> Result<FrameResult> {
        let uploads = self.config.upload_threads;
        let synchronous = self.config.synchronous;

        let mut compute = Pipeline::new("compute");
        let mut upload = Pipeline::new("upload");

        let visible = compute.add_filter(
            "VisibleSetGenerator",
            VisibleSetFilter::new(
                self.source.clone(),
                self.config.screen_space_error,
                self.config.min_lod,
                self.config.max_lod,
            ),
            true,
        );

        let uploaders: Vec<Arc<PipeFilter>> = (0..uploads)
            .map(|i| {
                upload.add_filter(
                    format!("DataUploader{i}"),
                    DataUploadFilter::new(i, uploads, self.textures.clone(), synchronous),
                    synchronous,
                )
            })
            .collect();
        for uploader in &uploaders {
            visible.connect(VISIBLE_NODES, uploader, VISIBLE_NODES)?;
        }

        let rendering = if synchronous {
            None
        } else {
            let rendering = compute.add_filter(
                "RenderingSetGenerator",
                RenderingSetFilter::new(self.textures.clone()),
                true,
            );
            visible.connect(VISIBLE_NODES, &rendering, VISIBLE_NODES)?;
            Some(rendering)
        };

        let frame_input = Promise::new(port::<FrameInfo>(FRAME));
        visible.connect_future(FRAME, frame_input.future())?;
        frame_input.set(*frame)?;

        compute.schedule(&self.compute)?;
        upload.schedule(&self.upload)?;
        compute.wait_all();

        let visibles = visible.promise(VISIBLE_NODES)?.future().get::<Vec<NodeId>>()?;

        // Handles keep the frame's bricks resident until the budgets are applied
        let (available, _handles): (AvailableSet, Vec<Arc<TextureHandles>>) = match &rendering {
            Some(rendering) => (
                (*rendering.promise(AVAILABLE_SET)?.future().get::<AvailableSet>()?).clone(),
                vec![rendering.promise(CACHE_OBJECTS)?.future().get::<TextureHandles>()?],
            ),
            None => {
                upload.wait_all();
                let handles = uploaders
                    .iter()
                    .map(|uploader| uploader.promise(CACHE_OBJECTS)?.future().get::<TextureHandles>())
                    .collect::<Result<Vec<_>>>()?;
                (AvailableSetGenerator::from_cache(&visibles, &**self.textures), handles)
            }
        };

        let protect: HashSet<NodeId> = available.render_nodes.iter().copied().collect();
        self.apply_budgets(&protect);

        log::debug!(
            "Frame {}: {} visible, {} rendered, {} not available",
            frame.frame,
            visibles.len(),
            available.render_nodes.len(),
            available.not_available.len()
        );

        Ok(FrameResult {
            available: visibles.len() - available.not_available.len(),
            not_available: available.not_available.len(),
            visibles: visibles.to_vec(),
            render_nodes: available.render_nodes,
            missing: available.not_available,
        })
    }

    /// Run both eviction policies; a busy cache is skipped until next frame
    fn apply_budgets(&self, protect: &HashSet<NodeId>) {
        let results = [
            self.textures.apply_policy(&self.texture_policy, protect),
            self.data_cache().apply_policy(&self.data_policy, protect),
        ];

        for result in results {
            match result {
                Ok(PolicyOutcome::Activated { evicted }) if evicted > 0 => {
                    log::debug!("Evicted {} objects", evicted);
                }
                Ok(_) => {}
                Err(Error::CacheBusy) => log::trace!("Cache busy, eviction deferred"),
                Err(e) => log::warn!("Eviction failed: {}", e),
            }
        }

        log::debug!("{}", self.textures.statistics());
        log::debug!("{}", self.data_cache().statistics());
    }
}
