//! Vulkan buffer management
//!
//! RAII buffer wrapper plus the blocking one-shot transfer helpers used for
//! load-time staging. The copy operations submit a short-lived command
//! buffer and wait for the queue to idle before returning; they are never
//! called from the per-frame path.

use super::context::{VulkanError, VulkanResult};
use ash::vk;
use ash::{Device, Instance};

/// Find a memory type index satisfying both the resource's type bitmask and
/// the requested property flags
pub fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let memory_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..memory_properties.memory_type_count {
        let type_matches = (type_filter & (1 << i)) != 0;
        let properties_match = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);

        if type_matches && properties_match {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// GPU buffer with dedicated memory allocation. Handle and memory are
/// created and destroyed together.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory of a compatible type
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer =
            unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match find_memory_type(
            instance,
            physical_device,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        log::debug!("Created buffer ({} bytes, {:?})", size, usage);

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Copy a slice into a host-visible buffer via map/copy/unmap
    pub fn write_data<T: Copy>(&self, data: &[T]) -> VulkanResult<()> {
        let byte_len = std::mem::size_of_val(data) as vk::DeviceSize;
        if byte_len > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "write of {} bytes exceeds buffer size {}",
                    byte_len, self.size
                ),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, byte_len, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr() as *const u8, mapped.cast(), byte_len as usize);
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the backing memory handle
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Get the buffer size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Begin a one-time-submit command buffer from the transfer pool
pub fn begin_single_use_commands(
    device: &Device,
    command_pool: vk::CommandPool,
) -> VulkanResult<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
        .map_err(VulkanError::Api)?[0];

    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
        .map_err(VulkanError::Api)?;

    Ok(command_buffer)
}

/// End, submit and block until the queue idles, then free the command buffer.
/// Blocking is intentional; these helpers only run during load-time staging.
pub fn end_single_use_commands(
    device: &Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
) -> VulkanResult<()> {
    unsafe {
        device
            .end_command_buffer(command_buffer)
            .map_err(VulkanError::Api)?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        device
            .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
            .map_err(VulkanError::Api)?;
        device.queue_wait_idle(queue).map_err(VulkanError::Api)?;

        device.free_command_buffers(command_pool, &command_buffers);
    }
    Ok(())
}

/// GPU-side buffer-to-buffer copy through a one-shot command buffer
pub fn copy_buffer(
    device: &Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    src: &Buffer,
    dst: &Buffer,
    size: vk::DeviceSize,
) -> VulkanResult<()> {
    let command_buffer = begin_single_use_commands(device, command_pool)?;

    let region = vk::BufferCopy::builder().size(size).build();
    unsafe {
        device.cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]);
    }

    end_single_use_commands(device, queue, command_pool, command_buffer)
}

/// Copy tightly packed pixel data from a buffer into the base mip level of a
/// 2D image, which must already be in TRANSFER_DST_OPTIMAL layout
pub fn copy_buffer_to_image(
    device: &Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    src: &Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
) -> VulkanResult<()> {
    let command_buffer = begin_single_use_commands(device, command_pool)?;

    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .build();

    unsafe {
        device.cmd_copy_buffer_to_image(
            command_buffer,
            src.handle(),
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
    }

    end_single_use_commands(device, queue, command_pool, command_buffer)
}
