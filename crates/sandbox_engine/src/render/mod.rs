//! Rendering system
//!
//! High-level rendering layer over the Vulkan backend: the renderer facade,
//! camera, scene objects, materials and the shadow map sub-pipelines. The
//! `vulkan` submodule holds the backend-specific wrappers; applications
//! mostly talk to `Renderer` and the scene types.

pub mod camera;
pub mod material;
pub mod mesh;
pub mod overlay;
pub mod renderer;
pub mod scene;
pub mod shadow;
pub mod vulkan;
pub mod window;

pub use camera::Camera;
pub use material::{Material, MaterialRegistry, BLANK_TEXTURE_ID, MAX_MATERIALS};
pub use mesh::Mesh;
pub use overlay::{NullOverlay, OverlayHook};
pub use renderer::Renderer;
pub use scene::SceneObject;
pub use shadow::{PendingShadowMap, ShadowBindings, ShadowMap};
pub use vulkan::{Vertex, VulkanError, VulkanResult};
pub use window::{Window, WindowError};
