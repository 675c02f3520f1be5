//! Data source plugin trait and the memoising front end

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::volume::{LodNode, NodeId, VolumeInformation};
use super::registry::DataSourceRegistry;

/// Backend producing raw brick bytes
///
/// Implementations must be shareable across loader threads.
pub trait DataSourcePlugin: Send + Sync {
    /// Static description of the volume served by this backend
    fn volume_info(&self) -> &VolumeInformation;

    /// Raw bytes of one brick, halo included
    fn data(&self, node: &LodNode) -> Result<Vec<u8>>;

    /// Node geometry; backends with irregular layouts override this
    fn node(&self, id: NodeId) -> LodNode {
        LodNode::new(id, self.volume_info())
    }
}

/// Front end over a plugin
///
/// Node geometry is memoised with get-or-insert under a single
/// reader/writer lock, so concurrent lookups of the same id never compute
/// conflicting entries.
pub struct DataSource {
    uri: String,
    plugin: Box<dyn DataSourcePlugin>,
    nodes: RwLock<HashMap<NodeId, LodNode>>,
}

impl DataSource {
    /// Open the backend registered for the URI's scheme
    ///
    /// # Errors
    /// [`Error::InvalidSource`] for malformed URIs, unknown schemes or
    /// backends rejecting their parameters.
    pub fn open(registry: &DataSourceRegistry, uri: &str) -> Result<Self> {
        let plugin = registry.create(uri)?;
        let source = Self::from_plugin(uri, plugin);
        log::info!("Opened data source {}: {}", uri, source.volume_info());
        Ok(source)
    }

    /// Wrap an already constructed plugin
    pub fn from_plugin(uri: impl Into<String>, plugin: Box<dyn DataSourcePlugin>) -> Self {
        Self {
            uri: uri.into(),
            plugin,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn volume_info(&self) -> &VolumeInformation {
        self.plugin.volume_info()
    }

    /// Geometry of `id`
    ///
    /// Ids outside the volume yield an invalid node rather than an error so
    /// traversals can probe speculatively.
    pub fn node(&self, id: NodeId) -> LodNode {
        if let Some(node) = self.nodes.read().unwrap_or_else(PoisonError::into_inner).get(&id) {
            return *node;
        }

        let node = self.plugin.node(id);
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        *nodes.entry(id).or_insert(node)
    }

    /// Raw bytes of the brick `id`
    ///
    /// # Errors
    /// [`Error::LoadFailure`] if the id is outside the volume or the backend
    /// fails to read it.
    pub fn data(&self, id: NodeId) -> Result<Vec<u8>> {
        let node = self.node(id);
        if !node.is_valid() {
            return Err(Error::LoadFailure(format!("node {id} is outside the volume")));
        }

        self.plugin.data(&node).map_err(|e| match e {
            Error::LoadFailure(_) => e,
            other => Error::LoadFailure(format!("node {id}: {other}")),
        })
    }

    /// Number of memoised nodes
    pub fn memoised_nodes(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
