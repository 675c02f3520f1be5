//! Lodstream - out-of-core LOD streaming for multi-resolution volumes

pub mod core;
pub mod math;
pub mod volume;
pub mod data;
pub mod cache;
pub mod lod;
pub mod pipeline;
pub mod streaming;
