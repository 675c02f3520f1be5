//! GPU-resident bricks
//!
//! The renderer owns the GPU; this module only decides what should be
//! resident and hands bytes to an [`UploadSink`].

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{Cache, DataCache, Handle};
use crate::cache::CacheObject;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::volume::{LodNode, NodeId};

/// Destination of brick uploads
pub trait UploadSink: Send + Sync {
    /// Make `data` of `node` resident; returns the bytes it occupies
    fn upload(&self, node: &LodNode, data: &[u8]) -> Result<usize>;

    /// Free whatever `upload` allocated for `id`
    fn release(&self, id: NodeId);
}

/// Sink keeping uploads in host memory
///
/// Stands in for a GPU in tools and tests.
#[derive(Default)]
pub struct MemorySink {
    resident: Mutex<HashMap<NodeId, usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resident_count(&self) -> usize {
        self.resident.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    pub fn is_resident(&self, id: NodeId) -> bool {
        self.resident.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&id)
    }
}

impl UploadSink for MemorySink {
    fn upload(&self, node: &LodNode, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(Error::LoadFailure(format!("empty brick {}", node.node_id())));
        }
        self.resident
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.node_id(), data.len());
        Ok(data.len())
    }

    fn release(&self, id: NodeId) {
        self.resident.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    }
}

/// Brick uploaded through an [`UploadSink`]
///
/// Loading pulls the bytes through the data cache, so a texture load also
/// makes the CPU copy resident.
pub struct TextureObject {
    id: NodeId,
    data_cache: Arc<DataCache>,
    sink: Arc<dyn UploadSink>,
    gpu_bytes: usize,
}

impl TextureObject {
    pub fn new(id: NodeId, data_cache: Arc<DataCache>, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            id,
            data_cache,
            sink,
            gpu_bytes: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl CacheObject for TextureObject {
    fn size(&self) -> usize {
        self.gpu_bytes
    }

    fn is_loaded(&self) -> bool {
        self.gpu_bytes > 0
    }

    fn load(&mut self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let data = self.data_cache.load(self.id)?;
        let bytes = data
            .with(|object| object.bytes())
            .ok_or_else(|| Error::LoadFailure(format!("brick {} unloaded during upload", self.id)))?;

        let node = self.data_cache.source().node(self.id);
        self.gpu_bytes = self.sink.upload(&node, &bytes)?;
        Ok(())
    }

    fn unload(&mut self) {
        if self.gpu_bytes > 0 {
            self.sink.release(self.id);
            self.gpu_bytes = 0;
        }
    }
}

/// GPU brick cache layered on a [`DataCache`]
pub struct TextureCache {
    cache: Cache<TextureObject>,
    data_cache: Arc<DataCache>,
    sink: Arc<dyn UploadSink>,
}

impl TextureCache {
    pub fn new(data_cache: Arc<DataCache>, sink: Arc<dyn UploadSink>, max_bytes: usize) -> Self {
        Self {
            cache: Cache::new("Texture cache", max_bytes),
            data_cache,
            sink,
        }
    }

    pub fn data_cache(&self) -> &Arc<DataCache> {
        &self.data_cache
    }

    /// Upload brick `id` unless already resident
    pub fn load(&self, id: NodeId) -> Result<Handle<TextureObject>> {
        self.cache
            .load(id, || TextureObject::new(id, self.data_cache.clone(), self.sink.clone()))
    }
}

impl Deref for TextureCache {
    type Target = Cache<TextureObject>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruPolicy;
    use crate::core::types::UVec3;
    use crate::data::{DataSource, DataSourceRegistry};
    use std::collections::HashSet;

    fn texture_cache(sink: Arc<MemorySink>) -> TextureCache {
        let source = DataSource::open(&DataSourceRegistry::with_builtin(), "mem://#256,256,256,32").unwrap();
        let data_cache = Arc::new(DataCache::new(Arc::new(source), usize::MAX));
        TextureCache::new(data_cache, sink, usize::MAX)
    }

    #[test]
    fn test_load_uploads_through_data_cache() {
        let sink = Arc::new(MemorySink::new());
        let textures = texture_cache(sink.clone());
        let id = NodeId::new(1, UVec3::new(1, 0, 1), 0);

        let handle = textures.load(id).unwrap();
        assert!(handle.is_loaded());
        assert!(textures.data_cache().is_loaded(id));
        assert!(sink.is_resident(id));
        assert_eq!(textures.statistics().used_bytes(), sink.resident_bytes());
    }

    #[test]
    fn test_eviction_releases_gpu_memory() {
        let sink = Arc::new(MemorySink::new());
        let textures = texture_cache(sink.clone());
        let id = NodeId::new(2, UVec3::new(3, 2, 1), 0);

        drop(textures.load(id).unwrap());
        let policy = LruPolicy::new(0, 1.0);
        textures.apply_policy(&policy, &HashSet::new()).unwrap();

        assert!(!sink.is_resident(id));
        assert_eq!(textures.statistics().used_bytes(), 0);
        // CPU copy outlives the texture
        assert!(textures.data_cache().is_loaded(id));
    }

    #[test]
    fn test_failed_upload_stays_unloaded() {
        let sink = Arc::new(MemorySink::new());
        let textures = texture_cache(sink.clone());
        let outside = NodeId::new(3, UVec3::new(0, 0, 40), 0);

        assert!(textures.load(outside).is_err());
        assert!(!textures.is_loaded(outside));
        assert_eq!(sink.resident_count(), 0);
    }
}
