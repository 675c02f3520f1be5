//! Per-frame inputs and outputs of the render pipeline

use crate::math::Frustum;
use crate::volume::NodeId;

/// View parameters of one frame
#[derive(Clone, Copy, Debug)]
pub struct FrameInfo {
    pub frustum: Frustum,
    /// Viewport height in pixels
    pub window_height: u32,
    /// Time step of the volume to show
    pub frame: u32,
    /// Sort-last share of the visible list, `[0.0, 1.0]` for all of it
    pub range: [f64; 2],
}

impl FrameInfo {
    pub fn new(frustum: Frustum, window_height: u32, frame: u32) -> Self {
        Self {
            frustum,
            window_height,
            frame,
            range: [0.0, 1.0],
        }
    }

    pub fn with_range(mut self, range: [f64; 2]) -> Self {
        self.range = range;
        self
    }
}

/// What a frame resolved to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameResult {
    /// Nodes the LOD selection asked for
    pub visibles: Vec<NodeId>,
    /// Resident nodes handed to the renderer
    pub render_nodes: Vec<NodeId>,
    /// Visible nodes rendered at their own level
    pub available: usize,
    /// Visible nodes rendered through an ancestor or not at all
    pub not_available: usize,
    /// The visible nodes counted in `not_available`
    pub missing: Vec<NodeId>,
}

impl FrameResult {
    /// Whether the frame rendered everything at full detail
    pub fn is_complete(&self) -> bool {
        self.not_available == 0
    }
}
