//! Data sources: translate node ids into raw brick bytes
//!
//! Backends are plugins selected by URI scheme through an explicit
//! [`DataSourceRegistry`]; [`DataSource`] wraps the chosen plugin and
//! memoises node geometry.

pub mod uri;
pub mod source;
pub mod registry;
pub mod memory;
pub mod raw;

pub use uri::SourceUri;
pub use source::{DataSource, DataSourcePlugin};
pub use registry::{DataSourcePluginFactory, DataSourceRegistry};
pub use memory::MemorySource;
pub use raw::RawSource;
