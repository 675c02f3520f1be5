//! Scheme based plugin registry

use crate::core::error::Error;
use crate::core::types::Result;
use super::memory::MemorySourceFactory;
use super::raw::RawSourceFactory;
use super::source::DataSourcePlugin;
use super::uri::SourceUri;

/// Constructs plugins for one URI scheme
pub trait DataSourcePluginFactory: Send + Sync {
    /// Scheme served by this factory, lower case
    fn scheme(&self) -> &str;

    /// Whether this factory accepts `uri`
    fn handles(&self, uri: &SourceUri) -> bool {
        uri.scheme == self.scheme()
    }

    fn create(&self, uri: &SourceUri) -> Result<Box<dyn DataSourcePlugin>>;
}

/// Registry of data source backends
///
/// Built once at start-up and passed to whoever opens data sources.
#[derive(Default)]
pub struct DataSourceRegistry {
    factories: Vec<Box<dyn DataSourcePluginFactory>>,
}

impl DataSourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `mem` and `raw` backends
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MemorySourceFactory));
        registry.register(Box::new(RawSourceFactory));
        registry
    }

    /// Add a backend; later registrations win for the same scheme
    pub fn register(&mut self, factory: Box<dyn DataSourcePluginFactory>) {
        log::debug!("Registered data source scheme '{}'", factory.scheme());
        self.factories.push(factory);
    }

    /// Registered schemes in registration order
    pub fn schemes(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.scheme()).collect()
    }

    /// Instantiate the backend for `uri`
    ///
    /// # Errors
    /// [`Error::InvalidSource`] if the URI is malformed, no factory handles
    /// it, or the factory rejects it.
    pub fn create(&self, uri: &str) -> Result<Box<dyn DataSourcePlugin>> {
        let parsed = SourceUri::parse(uri)?;
        let factory = self
            .factories
            .iter()
            .rev()
            .find(|f| f.handles(&parsed))
            .ok_or_else(|| {
                Error::InvalidSource(format!("no data source registered for scheme '{}'", parsed.scheme))
            })?;

        factory.create(&parsed).map_err(|e| match e {
            Error::InvalidSource(_) => e,
            other => Error::InvalidSource(format!("{uri}: {other}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{LodNode, VolumeInformation};

    struct FixedPlugin(VolumeInformation);

    impl DataSourcePlugin for FixedPlugin {
        fn volume_info(&self) -> &VolumeInformation {
            &self.0
        }

        fn data(&self, _node: &LodNode) -> Result<Vec<u8>> {
            Ok(vec![42])
        }
    }

    struct TestFactory;

    impl DataSourcePluginFactory for TestFactory {
        fn scheme(&self) -> &str {
            "test"
        }

        fn create(&self, _uri: &SourceUri) -> Result<Box<dyn DataSourcePlugin>> {
            Ok(Box::new(FixedPlugin(VolumeInformation::default())))
        }
    }

    #[test]
    fn test_builtin_schemes() {
        let registry = DataSourceRegistry::with_builtin();
        assert_eq!(registry.schemes(), vec!["mem", "raw"]);
        assert!(registry.create("mem://#64,64,64,16").is_ok());
    }

    #[test]
    fn test_unknown_scheme() {
        let registry = DataSourceRegistry::with_builtin();
        assert!(matches!(registry.create("hdf5:///x.h5"), Err(Error::InvalidSource(_))));
        assert!(matches!(registry.create("not a uri"), Err(Error::InvalidSource(_))));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = DataSourceRegistry::new();
        assert!(registry.create("test://").is_err());

        registry.register(Box::new(TestFactory));
        let plugin = registry.create("test://anything").unwrap();
        assert_eq!(plugin.volume_info().component_count, 1);
    }
}
