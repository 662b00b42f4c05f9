//! Per-frame uniform data
//!
//! `UniformBufferSet` keeps one host-visible buffer and one descriptor set
//! per swapchain image so the CPU never writes a buffer the GPU is still
//! reading; the fence discipline in the renderer guarantees the index being
//! updated is idle. The uniform structs mirror the std140 layouts of the
//! shaders, hence the explicit 16-byte alignment.

use super::buffer::Buffer;
use super::context::{VulkanError, VulkanResult};
use crate::foundation::math::{Mat4, Vec4};
use ash::vk;
use ash::{Device, Instance};

/// Camera view and projection matrices
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboViewProjection {
    pub projection: Mat4,
    pub view: Mat4,
}

impl Default for UboViewProjection {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
        }
    }
}

/// Directional and spot light parameters consumed by the shaders. The
/// view-projection matrices are the same ones the shadow passes render
/// with; the main pass uses them to project fragments into light space.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboDirLight {
    pub dl_view_projection: Mat4,
    pub sl_view_projection: Mat4,
    pub dl_direction: Vec4,
    pub sl_position: Vec4,
    pub sl_direction: Vec4,
    pub sl_strength: f32,
    pub sl_cutoff: f32,
}

impl Default for UboDirLight {
    fn default() -> Self {
        Self {
            dl_view_projection: Mat4::identity(),
            sl_view_projection: Mat4::identity(),
            dl_direction: Vec4::new(0.0, -1.0, -1.0, 0.0),
            sl_position: Vec4::new(0.0, 1.5, 150.0, 0.0),
            sl_direction: Vec4::new(0.0, 0.0, -1.0, 0.0),
            sl_strength: 10.0,
            sl_cutoff: 60.0,
        }
    }
}

/// Fragment shader debug switches
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct UboFragSettings {
    /// Non-zero renders shadow map depth instead of shaded color
    pub draw_shadow_depth: u32,
}

/// Per-draw push constant: model matrix plus an unlit flag for gizmos
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PushModel {
    pub model: Mat4,
    pub shaded: u32,
}

impl PushModel {
    pub fn new(model: Mat4, shaded: bool) -> Self {
        Self {
            model,
            shaded: u32::from(shaded),
        }
    }

    /// Byte view for `cmd_push_constants`
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                std::mem::size_of::<Self>(),
            )
        }
    }
}

/// Ring of uniform buffers and descriptor sets, one per swapchain image
pub struct UniformBufferSet<T: Copy> {
    device: Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    buffers: Vec<Buffer>,
    sets: Vec<vk::DescriptorSet>,
    /// Host-side value uploaded by `update`
    pub data: T,
}

impl<T: Copy> UniformBufferSet<T> {
    /// Create `count` host-visible buffers sized to `T`, a one-binding
    /// layout and a pool, and point one descriptor set at each buffer
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        data: T,
        stage_flags: vk::ShaderStageFlags,
        binding: u32,
        count: usize,
    ) -> VulkanResult<Self> {
        let buffer_size = std::mem::size_of::<T>() as vk::DeviceSize;

        let layout_bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stage_flags)
            .build()];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&layout_bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(count as u32)
            .build()];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(count as u32)
            .pool_sizes(&pool_sizes);
        let pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            let buffer = match Buffer::new(
                device,
                instance,
                physical_device,
                buffer_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ) {
                Ok(buffer) => buffer,
                Err(e) => {
                    unsafe {
                        device.destroy_descriptor_pool(pool, None);
                        device.destroy_descriptor_set_layout(layout, None);
                    }
                    return Err(e);
                }
            };
            buffers.push(buffer);
        }

        let layouts = vec![layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe {
                    device.destroy_descriptor_pool(pool, None);
                    device.destroy_descriptor_set_layout(layout, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        for (set, buffer) in sets.iter().zip(buffers.iter()) {
            let buffer_info = [vk::DescriptorBufferInfo::builder()
                .buffer(buffer.handle())
                .offset(0)
                .range(buffer_size)
                .build()];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(binding)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info)
                .build();
            unsafe { device.update_descriptor_sets(&[write], &[]) };
        }

        Ok(Self {
            device: device.clone(),
            layout,
            pool,
            buffers,
            sets,
            data,
        })
    }

    /// Upload the current `data` value into the buffer for `image_index`.
    /// Must only be called once the fence covering that index has signaled.
    pub fn update(&self, image_index: usize) -> VulkanResult<()> {
        self.buffers[image_index].write_data(std::slice::from_ref(&self.data))
    }

    /// Descriptor set layout shared by all slots
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Descriptor set for a given swapchain image index
    pub fn set(&self, image_index: usize) -> vk::DescriptorSet {
        self.sets[image_index]
    }

    /// Number of slots in the ring
    pub fn count(&self) -> usize {
        self.buffers.len()
    }
}

impl<T: Copy> Drop for UniformBufferSet<T> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_uniform_structs_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<UboViewProjection>() % 16, 0);
        assert_eq!(std::mem::size_of::<UboDirLight>() % 16, 0);
        assert_eq!(std::mem::size_of::<UboFragSettings>() % 16, 0);
    }

    #[test]
    fn test_push_model_fits_minimum_push_constant_budget() {
        // 128 bytes is the guaranteed minimum push constant range
        assert!(std::mem::size_of::<PushModel>() <= 128);
        assert_eq!(
            PushModel::new(Mat4::identity(), true).as_bytes().len(),
            std::mem::size_of::<PushModel>()
        );
    }

    #[test]
    fn test_dir_light_defaults() {
        let light = UboDirLight::default();
        assert_relative_eq!(light.dl_direction.y, -1.0, epsilon = EPSILON);
        assert_relative_eq!(light.sl_position.z, 150.0, epsilon = EPSILON);
        assert_relative_eq!(light.sl_strength, 10.0, epsilon = EPSILON);
        assert_relative_eq!(light.sl_cutoff, 60.0, epsilon = EPSILON);
    }

    #[test]
    fn test_push_model_shaded_flag() {
        assert_eq!(PushModel::new(Mat4::identity(), false).shaded, 0);
        assert_eq!(PushModel::new(Mat4::identity(), true).shaded, 1);
    }
}
