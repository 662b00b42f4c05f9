//! SPIR-V shader module handling
//!
//! Consumes compiled shader bytecode; compilation happens offline. Bytes are
//! validated for u32 alignment before module creation.

use super::context::{VulkanError, VulkanResult};
use ash::vk;
use ash::Device;
use std::ffi::CStr;
use std::path::Path;

const SHADER_ENTRY_POINT: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from raw SPIR-V bytes
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes)).map_err(|e| {
            VulkanError::InvalidOperation {
                reason: format!("Invalid SPIR-V bytecode: {}", e),
            }
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(VulkanError::Api)?;

        log::debug!("Created shader module ({} words)", code.len());

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load and create a shader module from a SPIR-V file
    pub fn from_file(device: &Device, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!(
                "Failed to read shader {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loading shader {}", path.display());
        Self::from_bytes(device, &bytes)
    }

    /// Build the pipeline stage description for this module
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
