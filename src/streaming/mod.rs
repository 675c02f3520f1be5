//! Frame-level streaming: LOD selection, uploads and budgets wired together

pub mod frame;
pub mod texture;
pub mod filters;
pub mod render_pipeline;
pub mod prefetch;

pub use frame::{FrameInfo, FrameResult};
pub use texture::{MemorySink, TextureCache, TextureObject, UploadSink};
pub use filters::{DataUploadFilter, RenderingSetFilter, TextureHandles, VisibleSetFilter};
pub use render_pipeline::RenderPipeline;
pub use prefetch::{BrickPrefetcher, PrefetchResult};
