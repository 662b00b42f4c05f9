//! GPU mesh resources
//!
//! A mesh owns its device-local vertex buffer and optional index buffer.
//! Host data is staged through a temporary host-visible buffer and copied
//! with a blocking transfer; this happens once at scene load.

use super::vulkan::buffer::{copy_buffer, Buffer};
use super::vulkan::context::VulkanResult;
use super::vulkan::vertex::Vertex;
use crate::foundation::math::Mat4;
use ash::vk;
use ash::{Device, Instance};

/// One drawable mesh: device-local geometry plus a node-local transform and
/// the material it resolves to
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
    transform: Mat4,
    material_id: u32,
}

impl Mesh {
    /// Stage host-side vertex and index data into device-local buffers.
    /// An empty index slice produces a non-indexed mesh.
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        transfer_queue: vk::Queue,
        transfer_pool: vk::CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Mat4,
        material_id: u32,
    ) -> VulkanResult<Self> {
        let vertex_buffer = stage_to_device(
            device,
            instance,
            physical_device,
            transfer_queue,
            transfer_pool,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(stage_to_device(
                device,
                instance,
                physical_device,
                transfer_queue,
                transfer_pool,
                indices,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        };

        log::debug!(
            "Created mesh ({} vertices, {} indices, material {})",
            vertices.len(),
            indices.len(),
            material_id
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            transform,
            material_id,
        })
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle; only meaningful when `indexed()` is true
    pub fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer.as_ref().map(Buffer::handle)
    }

    pub fn indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn material_id(&self) -> u32 {
        self.material_id
    }
}

fn stage_to_device<T: Copy>(
    device: &Device,
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    transfer_queue: vk::Queue,
    transfer_pool: vk::CommandPool,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let size = std::mem::size_of_val(data) as vk::DeviceSize;

    let staging = Buffer::new(
        device,
        instance,
        physical_device,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    staging.write_data(data)?;

    let device_local = Buffer::new(
        device,
        instance,
        physical_device,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    copy_buffer(
        device,
        transfer_queue,
        transfer_pool,
        &staging,
        &device_local,
        size,
    )?;

    Ok(device_local)
}
