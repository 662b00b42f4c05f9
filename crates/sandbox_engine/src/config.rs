//! Renderer configuration
//!
//! Loaded from an optional TOML file so window size, shadow resolution and
//! the blocking-wait timeouts can be changed without a rebuild. Missing keys
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Effectively-infinite timeout used when the config does not override it.
/// Frame pacing depends on these waits blocking, so the default only exists
/// to make a wedged driver diagnosable instead of a permanent hang. Capped
/// at `i64::MAX` because TOML integers are signed 64-bit; the value must
/// stay writable in a config file.
pub const DEFAULT_WAIT_TIMEOUT_NS: u64 = i64::MAX as u64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Window title
    pub window_title: String,
    /// Side length of the square shadow map render targets
    pub shadow_map_resolution: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane distance
    pub near_plane: f32,
    /// Far clip plane distance
    pub far_plane: f32,
    /// Timeout in nanoseconds for the per-frame fence wait
    pub fence_timeout_ns: u64,
    /// Timeout in nanoseconds for swapchain image acquisition
    pub acquire_timeout_ns: u64,
    /// Directory containing compiled SPIR-V shaders
    pub shader_dir: String,
    /// Directory containing texture images
    pub texture_dir: String,
    /// Directory containing model files
    pub object_dir: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_width: 1366,
            window_height: 768,
            window_title: "Vulkan Sandbox".to_string(),
            shadow_map_resolution: 2048,
            fov_degrees: 45.0,
            near_plane: 0.1,
            far_plane: 200.0,
            fence_timeout_ns: DEFAULT_WAIT_TIMEOUT_NS,
            acquire_timeout_ns: DEFAULT_WAIT_TIMEOUT_NS,
            shader_dir: "shaders".to_string(),
            texture_dir: "textures".to_string(),
            object_dir: "objects".to_string(),
        }
    }
}

impl RendererConfig {
    /// Load settings from a TOML file, falling back to defaults for any
    /// missing keys. A missing file is not an error; callers that want that
    /// distinction should check existence first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_for_missing_keys() {
        let config: RendererConfig = toml::from_str("window_width = 640").unwrap();
        assert_eq!(config.window_width, 640);
        assert_eq!(config.window_height, 768);
        assert_eq!(config.shadow_map_resolution, 2048);
        assert_eq!(config.fence_timeout_ns, DEFAULT_WAIT_TIMEOUT_NS);
    }

    #[test]
    fn test_default_timeouts_survive_toml() {
        // Both timeout defaults must fit TOML's signed 64-bit integers
        let text = toml::to_string(&RendererConfig::default()).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.fence_timeout_ns, DEFAULT_WAIT_TIMEOUT_NS);
        assert_eq!(parsed.acquire_timeout_ns, DEFAULT_WAIT_TIMEOUT_NS);

        let written: RendererConfig =
            toml::from_str(&format!("fence_timeout_ns = {}", DEFAULT_WAIT_TIMEOUT_NS)).unwrap();
        assert_eq!(written.fence_timeout_ns, DEFAULT_WAIT_TIMEOUT_NS);
    }

    #[test]
    fn test_round_trip_non_defaults() {
        let mut config = RendererConfig::default();
        config.shadow_map_resolution = 1024;
        config.acquire_timeout_ns = 5_000_000_000;
        let text = toml::to_string(&config).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.shadow_map_resolution, 1024);
        assert_eq!(parsed.acquire_timeout_ns, 5_000_000_000);
    }
}
