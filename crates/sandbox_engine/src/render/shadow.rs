//! Shadow map sub-pipeline
//!
//! Depth-only offscreen passes whose results feed the main pass as sampled
//! depth. All shadow maps share one descriptor set layout and one set per
//! swapchain image, with each map writing its depth image at its own
//! binding; `ShadowBindings` owns that shared table and is constructed and
//! held by the renderer.
//!
//! Construction is two-phase: every map registers its binding while being
//! created, the shared table is built once, and each map then finishes with
//! its render pass, framebuffers and pipeline. `PendingShadowMap` keeps the
//! phases apart at the type level.

use super::scene::SceneObject;
use super::vulkan::context::{VulkanError, VulkanResult};
use super::vulkan::image::{ImageResource, Sampler};
use super::vulkan::pipeline::{full_scissor, viewport_default, GraphicsPipeline, PipelineParams};
use super::vulkan::shader::ShaderModule;
use super::vulkan::uniform::{PushModel, UboViewProjection, UniformBufferSet};
use ash::vk;
use ash::{Device, Instance};

const SHADOW_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT_S8_UINT;

/// Shared descriptor table binding every shadow map's depth image into the
/// main pass. Bindings are registered before `build`, written after.
pub struct ShadowBindings {
    device: Device,
    image_count: usize,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl ShadowBindings {
    pub fn new(device: &Device, image_count: usize) -> Self {
        Self {
            device: device.clone(),
            image_count,
            bindings: Vec::new(),
            layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            sets: Vec::new(),
        }
    }

    fn register(&mut self, binding: u32) -> VulkanResult<()> {
        if self.layout != vk::DescriptorSetLayout::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "shadow binding registered after layout build".to_string(),
            });
        }
        if self.bindings.iter().any(|b| b.binding == binding) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("shadow binding {} registered twice", binding),
            });
        }
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        );
        Ok(())
    }

    /// Create the layout, pool and per-image sets once all maps have
    /// registered their bindings
    pub fn build(&mut self) -> VulkanResult<()> {
        if self.bindings.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "no shadow bindings registered".to_string(),
            });
        }
        if self.layout != vk::DescriptorSetLayout::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "shadow binding layout already built".to_string(),
            });
        }

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        self.layout = unsafe { self.device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count((self.bindings.len() * self.image_count) as u32)
            .build()];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(self.image_count as u32)
            .pool_sizes(&pool_sizes);
        self.pool = unsafe { self.device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        let layouts = vec![self.layout; self.image_count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        self.sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)?;

        log::debug!(
            "Shadow binding table built ({} bindings, {} sets)",
            self.bindings.len(),
            self.image_count
        );
        Ok(())
    }

    fn write_images(
        &self,
        binding: u32,
        views: &[vk::ImageView],
        sampler: vk::Sampler,
    ) -> VulkanResult<()> {
        if self.sets.len() != views.len() {
            return Err(VulkanError::InvalidOperation {
                reason: "shadow binding table not built before image writes".to_string(),
            });
        }
        for (set, &view) in self.sets.iter().zip(views.iter()) {
            let image_info = [vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL)
                .image_view(view)
                .sampler(sampler)
                .build()];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(binding)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info)
                .build();
            unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        }
        Ok(())
    }

    /// Layout of the shared set; only valid after `build`
    pub fn layout(&self) -> VulkanResult<vk::DescriptorSetLayout> {
        if self.layout == vk::DescriptorSetLayout::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "shadow binding layout not built".to_string(),
            });
        }
        Ok(self.layout)
    }

    /// Shared set for a swapchain image; only valid after `build`
    pub fn set(&self, image_index: usize) -> vk::DescriptorSet {
        self.sets[image_index]
    }
}

impl Drop for ShadowBindings {
    fn drop(&mut self) {
        unsafe {
            if self.pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.pool, None);
            }
            if self.layout != vk::DescriptorSetLayout::null() {
                self.device.destroy_descriptor_set_layout(self.layout, None);
            }
        }
    }
}

struct DepthPassTarget {
    device: Device,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Drop for DepthPassTarget {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Shadow map with per-instance resources created but render pass and
/// pipeline still pending the shared binding table
pub struct PendingShadowMap {
    device: Device,
    extent: vk::Extent2D,
    binding: u32,
    ubo: UniformBufferSet<UboViewProjection>,
    images: Vec<ImageResource>,
    sampler: Sampler,
}

impl PendingShadowMap {
    /// Create depth images, sampler and the light-matrix uniform ring, and
    /// register this map's binding in the shared table
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        image_count: usize,
        resolution: u32,
        binding: u32,
        bindings: &mut ShadowBindings,
    ) -> VulkanResult<Self> {
        let extent = vk::Extent2D {
            width: resolution,
            height: resolution,
        };

        let ubo = UniformBufferSet::new(
            device,
            instance,
            physical_device,
            UboViewProjection::default(),
            vk::ShaderStageFlags::VERTEX,
            0,
            image_count,
        )?;

        let mut images = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            images.push(ImageResource::new(
                device,
                instance,
                physical_device,
                extent,
                SHADOW_DEPTH_FORMAT,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::SampleCountFlags::TYPE_1,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::ImageAspectFlags::DEPTH,
            )?);
        }

        // Reads outside the light frustum must resolve to "fully lit"
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(false);
        let sampler = Sampler::new(device, &sampler_info)?;

        bindings.register(binding)?;

        Ok(Self {
            device: device.clone(),
            extent,
            binding,
            ubo,
            images,
            sampler,
        })
    }

    /// Write this map's images into the built shared table and create the
    /// depth-only render pass, framebuffers and pipeline
    pub fn finish(
        self,
        bindings: &ShadowBindings,
        vertex_shader: &ShaderModule,
    ) -> VulkanResult<ShadowMap> {
        let views: Vec<vk::ImageView> = self.images.iter().map(ImageResource::view).collect();
        bindings.write_images(self.binding, &views, self.sampler.handle())?;

        let target = create_depth_pass_target(&self.device, self.extent, &views)?;

        let stages = [vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX)];
        let set_layouts = [self.ubo.layout()];
        let push_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: std::mem::size_of::<PushModel>() as u32,
        }];
        let pipeline = GraphicsPipeline::new(
            &self.device,
            &PipelineParams {
                stages: &stages,
                set_layouts: &set_layouts,
                push_constant_ranges: &push_ranges,
                render_pass: target.render_pass,
                samples: vk::SampleCountFlags::TYPE_1,
                color_attachment_count: 0,
            },
        )?;

        log::info!(
            "Shadow map at binding {} ready ({}x{}, {} images)",
            self.binding,
            self.extent.width,
            self.extent.height,
            self.images.len()
        );

        Ok(ShadowMap {
            device: self.device,
            extent: self.extent,
            binding: self.binding,
            pipeline,
            target,
            images: self.images,
            sampler: self.sampler,
            ubo: self.ubo,
        })
    }
}

/// Fully initialized shadow map
pub struct ShadowMap {
    device: Device,
    extent: vk::Extent2D,
    binding: u32,
    pipeline: GraphicsPipeline,
    target: DepthPassTarget,
    images: Vec<ImageResource>,
    sampler: Sampler,
    ubo: UniformBufferSet<UboViewProjection>,
}

impl ShadowMap {
    /// Mutable access to the light view/projection uploaded by `update_ubo`
    pub fn light_matrices_mut(&mut self) -> &mut UboViewProjection {
        &mut self.ubo.data
    }

    /// Upload the current light matrices for one swapchain image
    pub fn update_ubo(&self, image_index: usize) -> VulkanResult<()> {
        self.ubo.update(image_index)
    }

    /// Record this map's depth-only pass for one swapchain image. Objects
    /// tagged as non-casting are skipped; no texture sampling happens here.
    pub fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
        objects: &[SceneObject],
    ) {
        let clear_values = [vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        }];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.target.render_pass)
            .framebuffer(self.target.framebuffers[image_index])
            .render_area(full_scissor(self.extent))
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );
            self.device
                .cmd_set_viewport(command_buffer, 0, &[viewport_default(self.extent)]);
            self.device
                .cmd_set_scissor(command_buffer, 0, &[full_scissor(self.extent)]);

            for object in objects {
                if !object.casts_shadow() {
                    continue;
                }

                for mesh in object.meshes() {
                    self.device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        self.pipeline.layout(),
                        0,
                        &[self.ubo.set(image_index)],
                        &[],
                    );

                    self.device.cmd_bind_vertex_buffers(
                        command_buffer,
                        0,
                        &[mesh.vertex_buffer()],
                        &[0],
                    );

                    let push = PushModel::new(object.transform() * mesh.transform(), true);
                    self.device.cmd_push_constants(
                        command_buffer,
                        self.pipeline.layout(),
                        vk::ShaderStageFlags::VERTEX,
                        0,
                        push.as_bytes(),
                    );

                    if let Some(index_buffer) = mesh.index_buffer() {
                        self.device.cmd_bind_index_buffer(
                            command_buffer,
                            index_buffer,
                            0,
                            vk::IndexType::UINT32,
                        );
                        self.device
                            .cmd_draw_indexed(command_buffer, mesh.index_count(), 1, 0, 0, 0);
                    } else {
                        self.device
                            .cmd_draw(command_buffer, mesh.vertex_count(), 1, 0, 0);
                    }
                }
            }

            self.device.cmd_end_render_pass(command_buffer);
        }
    }

    /// Binding slot in the shared shadow descriptor set
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Depth view for a given swapchain image, exposed for debug previews
    pub fn image_view(&self, image_index: usize) -> vk::ImageView {
        self.images[image_index].view()
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }
}

fn create_depth_pass_target(
    device: &Device,
    extent: vk::Extent2D,
    views: &[vk::ImageView],
) -> VulkanResult<DepthPassTarget> {
    let depth_attachment = vk::AttachmentDescription::builder()
        .format(SHADOW_DEPTH_FORMAT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL)
        .build();

    let depth_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .depth_stencil_attachment(&depth_ref)
        .build();

    // Serialize against the previous frame's shadow sampling and make this
    // frame's depth visible to the main pass fragment shader
    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access_mask: vk::AccessFlags::SHADER_READ,
            dst_subpass: 0,
            dst_stage_mask: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            dst_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        vk::SubpassDependency {
            src_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            dst_access_mask: vk::AccessFlags::SHADER_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ];

    let attachments = [depth_attachment];
    let subpasses = [subpass];
    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.create_render_pass(&render_pass_info, None) }
        .map_err(VulkanError::Api)?;

    let mut framebuffers = Vec::with_capacity(views.len());
    for &view in views {
        let attachments = [view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        match unsafe { device.create_framebuffer(&framebuffer_info, None) } {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                unsafe {
                    for &framebuffer in &framebuffers {
                        device.destroy_framebuffer(framebuffer, None);
                    }
                    device.destroy_render_pass(render_pass, None);
                }
                return Err(VulkanError::Api(e));
            }
        }
    }

    Ok(DepthPassTarget {
        device: device.clone(),
        render_pass,
        framebuffers,
    })
}
