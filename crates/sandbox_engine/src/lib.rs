//! # Sandbox Engine
//!
//! A real-time Vulkan rendering sandbox: swapchain and frame pipeline,
//! triple-buffered synchronization, MSAA main pass and depth-only shadow
//! map passes for a directional and a spot light.
//!
//! ## Modules
//!
//! - [`render`]: renderer facade, camera, scene objects and the Vulkan backend
//! - [`assets`]: image, OBJ model and height map loading
//! - [`config`]: TOML-backed renderer settings
//! - [`foundation`]: math types shared across the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sandbox_engine::config::RendererConfig;
//! use sandbox_engine::render::{NullOverlay, Renderer, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let mut window = Window::new(&config.window_title, config.window_width, config.window_height)?;
//!     let mut renderer = Renderer::new(&mut window, config)?;
//!     let mut overlay = NullOverlay;
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw(&window, &mut overlay)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;
