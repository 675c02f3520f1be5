//! Brick payloads read from a data source

use std::ops::Deref;
use std::sync::Arc;

use bytemuck::Pod;

use crate::core::types::Result;
use crate::data::DataSource;
use crate::volume::NodeId;
use super::cache::Cache;
use super::object::{CacheObject, Handle};

/// Raw bytes of one brick
pub struct DataObject {
    id: NodeId,
    source: Arc<DataSource>,
    data: Option<Arc<[u8]>>,
}

impl DataObject {
    /// Unloaded brick `id`; bytes are read from `source` on load
    pub fn new(id: NodeId, source: Arc<DataSource>) -> Self {
        Self { id, source, data: None }
    }

    /// Node this brick belongs to
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Shared copy of the payload, if loaded
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.data.clone()
    }

    /// Payload viewed as voxel samples
    ///
    /// `None` when unloaded or when the byte length or alignment does not fit `T`.
    pub fn samples<T: Pod>(&self) -> Option<&[T]> {
        let data = self.data.as_deref()?;
        bytemuck::try_cast_slice(data).ok()
    }
}

impl CacheObject for DataObject {
    fn size(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.len())
    }

    fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    fn load(&mut self) -> Result<()> {
        if self.data.is_some() {
            return Ok(());
        }
        let bytes = self.source.data(self.id)?;
        log::trace!("Loaded brick {} ({} bytes)", self.id, bytes.len());
        self.data = Some(bytes.into());
        Ok(())
    }

    fn unload(&mut self) {
        self.data = None;
    }
}

/// CPU-side brick cache bound to one data source
pub struct DataCache {
    cache: Cache<DataObject>,
    source: Arc<DataSource>,
}

impl DataCache {
    /// Create an empty brick cache
    ///
    /// # Arguments
    /// * `source` - Data source the bricks are read from
    /// * `max_bytes` - Budget reported by the statistics
    pub fn new(source: Arc<DataSource>, max_bytes: usize) -> Self {
        Self {
            cache: Cache::new("Data cache", max_bytes),
            source,
        }
    }

    /// Data source behind the cache
    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// Load brick `id` from the data source unless resident
    pub fn load(&self, id: NodeId) -> Result<Handle<DataObject>> {
        self.cache.load(id, || DataObject::new(id, self.source.clone()))
    }
}

impl Deref for DataCache {
    type Target = Cache<DataObject>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
