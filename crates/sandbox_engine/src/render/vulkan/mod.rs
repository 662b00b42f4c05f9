//! Vulkan backend
//!
//! Low-level wrappers over ash: context and device setup, swapchain,
//! buffers and images, descriptors, pipelines and frame synchronization.
//! Everything here is RAII; handles are destroyed when wrappers drop, in
//! reverse creation order.

pub mod buffer;
pub mod context;
pub mod image;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod uniform;
pub mod vertex;

pub use context::{VulkanError, VulkanResult};
pub use sync::MAX_FRAMES_IN_FLIGHT;
pub use vertex::Vertex;
