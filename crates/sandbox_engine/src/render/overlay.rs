//! Overlay integration points
//!
//! The renderer drives an optional overlay (debug UI, stats panels) through
//! this trait: `begin_frame` runs before the next image is acquired and
//! `record` runs inside the main render pass after scene draws, so overlay
//! geometry composites over the 3D output.

use ash::vk;

pub trait OverlayHook {
    /// Called once per frame before swapchain image acquisition
    fn begin_frame(&mut self);

    /// Record overlay draw commands into the main pass
    fn record(&mut self, command_buffer: vk::CommandBuffer, image_index: usize);
}

/// Overlay that draws nothing
#[derive(Debug, Default)]
pub struct NullOverlay;

impl OverlayHook for NullOverlay {
    fn begin_frame(&mut self) {}

    fn record(&mut self, _command_buffer: vk::CommandBuffer, _image_index: usize) {}
}
