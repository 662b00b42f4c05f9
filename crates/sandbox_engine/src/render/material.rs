//! Material and texture registry
//!
//! Renderer-owned service holding every loaded texture and composite
//! material. Each material's descriptor set binds exactly three combined
//! image samplers (diffuse, specular, normal); channels with no source fall
//! back to a 1x1 white placeholder so the set layout never varies. Ids are
//! dense, append-only and never recycled within a run.

use super::vulkan::buffer::{copy_buffer_to_image, Buffer};
use super::vulkan::context::{VulkanError, VulkanResult};
use super::vulkan::image::{ImageResource, Sampler};
use crate::assets::ImageData;
use ash::vk;
use ash::{Device, Instance};

/// Upper bound on materials a run may register; sizes the descriptor pool
pub const MAX_MATERIALS: u32 = 256;

/// Texture index of the fallback placeholder, always present
pub const BLANK_TEXTURE_ID: u32 = 0;

/// Texture ids for the three channels of one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub diffuse: u32,
    pub specular: u32,
    pub normal: u32,
}

pub struct MaterialRegistry {
    device: Device,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    sampler: Sampler,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    textures: Vec<ImageResource>,
    materials: Vec<Material>,
    sets: Vec<vk::DescriptorSet>,
}

impl MaterialRegistry {
    /// Create the shared sampler, set layout and pool, and register the
    /// blank placeholder as texture 0
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        transfer_queue: vk::Queue,
        transfer_pool: vk::CommandPool,
        max_anisotropy: f32,
    ) -> VulkanResult<Self> {
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy);
        let sampler = Sampler::new(device, &sampler_info)?;

        // One combined image sampler per channel, fixed binding order
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = (0..3)
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                    .build()
            })
            .collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(MAX_MATERIALS * 3)
            .build()];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(MAX_MATERIALS)
            .pool_sizes(&pool_sizes);
        let pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut registry = Self {
            device: device.clone(),
            instance: instance.clone(),
            physical_device,
            sampler,
            layout,
            pool,
            textures: Vec::new(),
            materials: Vec::new(),
            sets: Vec::new(),
        };

        let blank_id =
            registry.create_texture(&ImageData::blank(), transfer_queue, transfer_pool)?;
        debug_assert_eq!(blank_id, BLANK_TEXTURE_ID);

        log::info!("Material registry initialized (capacity {})", MAX_MATERIALS);
        Ok(registry)
    }

    /// Upload decoded pixels into a sampled device-local image and register
    /// it, returning its dense id
    pub fn create_texture(
        &mut self,
        pixels: &ImageData,
        transfer_queue: vk::Queue,
        transfer_pool: vk::CommandPool,
    ) -> VulkanResult<u32> {
        let staging = Buffer::new(
            &self.device,
            &self.instance,
            self.physical_device,
            pixels.byte_size(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_data(&pixels.pixels)?;

        let image = ImageResource::new(
            &self.device,
            &self.instance,
            self.physical_device,
            vk::Extent2D {
                width: pixels.width,
                height: pixels.height,
            },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::ImageAspectFlags::COLOR,
        )?;

        image.transition_layout(
            transfer_queue,
            transfer_pool,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        )?;
        copy_buffer_to_image(
            &self.device,
            transfer_queue,
            transfer_pool,
            &staging,
            image.handle(),
            pixels.width,
            pixels.height,
        )?;
        image.transition_layout(
            transfer_queue,
            transfer_pool,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        )?;

        let id = self.textures.len() as u32;
        self.textures.push(image);
        Ok(id)
    }

    /// Register a material from its three optional channel sources. Missing
    /// channels bind the blank placeholder, so the resulting descriptor set
    /// always carries three textures.
    pub fn create_material(
        &mut self,
        channels: [Option<&ImageData>; 3],
        transfer_queue: vk::Queue,
        transfer_pool: vk::CommandPool,
    ) -> VulkanResult<u32> {
        if self.materials.len() as u32 >= MAX_MATERIALS {
            return Err(VulkanError::InvalidOperation {
                reason: format!("material capacity {} exhausted", MAX_MATERIALS),
            });
        }

        let mut texture_ids = [BLANK_TEXTURE_ID; 3];
        for (slot, channel) in channels.iter().enumerate() {
            if let Some(pixels) = channel {
                texture_ids[slot] = self.create_texture(pixels, transfer_queue, transfer_pool)?;
            }
        }

        let layouts = [self.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let set = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)?[0];

        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = texture_ids
            .iter()
            .map(|&texture_id| {
                [vk::DescriptorImageInfo::builder()
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .image_view(self.textures[texture_id as usize].view())
                    .sampler(self.sampler.handle())
                    .build()]
            })
            .collect();
        let writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding as u32)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(info)
                    .build()
            })
            .collect();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };

        let id = self.materials.len() as u32;
        self.materials.push(Material {
            diffuse: texture_ids[0],
            specular: texture_ids[1],
            normal: texture_ids[2],
        });
        self.sets.push(set);

        log::debug!("Created material {} (textures {:?})", id, texture_ids);
        Ok(id)
    }

    /// Descriptor set for a registered material
    pub fn descriptor_set(&self, material_id: u32) -> VulkanResult<vk::DescriptorSet> {
        self.sets
            .get(material_id as usize)
            .copied()
            .ok_or(VulkanError::ResourceNotFound {
                id: u64::from(material_id),
            })
    }

    /// Channel texture ids for a registered material
    pub fn material(&self, material_id: u32) -> VulkanResult<&Material> {
        self.materials
            .get(material_id as usize)
            .ok_or(VulkanError::ResourceNotFound {
                id: u64::from(material_id),
            })
    }

    /// Layout shared by every material descriptor set
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl Drop for MaterialRegistry {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
