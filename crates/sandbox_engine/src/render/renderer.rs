//! Vulkan renderer
//!
//! Owns the whole GPU-facing object graph: instance, device, swapchain,
//! render targets, uniform rings, the material registry and both shadow
//! maps. `draw` runs one frame through the fixed sequence of fence wait,
//! image acquire, uniform upload, command recording, submit and present,
//! pacing the CPU against a three-slot in-flight ring.
//!
//! Swapchain loss is handled as an explicit state transition: an
//! out-of-date report skips the frame and rebuilds the swapchain and its
//! dependent targets before the next draw records anything.

use super::camera::Camera;
use super::material::MaterialRegistry;
use super::mesh::Mesh;
use super::overlay::OverlayHook;
use super::scene::SceneObject;
use super::shadow::{PendingShadowMap, ShadowBindings, ShadowMap};
use super::vulkan::context::{
    LogicalDevice, PhysicalDeviceInfo, VulkanError, VulkanInstance, VulkanResult,
};
use super::vulkan::image::ImageResource;
use super::vulkan::pipeline::{
    full_scissor, viewport_flipped, GraphicsPipeline, PipelineParams,
};
use super::vulkan::shader::ShaderModule;
use super::vulkan::swapchain::Swapchain;
use super::vulkan::sync::{next_frame_index, FrameSync, MAX_FRAMES_IN_FLIGHT};
use super::vulkan::uniform::{
    PushModel, UboDirLight, UboFragSettings, UboViewProjection, UniformBufferSet,
};
use super::vulkan::vertex::Vertex;
use super::window::Window;
use crate::assets::ImageData;
use crate::config::RendererConfig;
use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext, Vec3};
use ash::extensions::khr::Surface;
use ash::vk;

/// Shadow table binding for the directional light
pub const DIR_SHADOW_BINDING: u32 = 0;
/// Shadow table binding for the spot light
pub const SPOT_SHADOW_BINDING: u32 = 1;

const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];
const DIR_LIGHT_DISTANCE: f32 = 100.0;

struct SurfaceHandle {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

struct MainPassTarget {
    device: ash::Device,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Drop for MainPassTarget {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

pub struct Renderer {
    config: RendererConfig,
    camera: Camera,
    objects: Vec<SceneObject>,
    current_frame: usize,
    frame_count: u64,

    // Declaration order is teardown order: everything device-derived sits
    // above the logical device, the surface above the instance
    dir_shadow: ShadowMap,
    spot_shadow: ShadowMap,
    shadow_bindings: ShadowBindings,
    materials: MaterialRegistry,
    vp_ubo: UniformBufferSet<UboViewProjection>,
    light_ubo: UniformBufferSet<UboDirLight>,
    settings_ubo: UniformBufferSet<UboFragSettings>,
    frame_sync: Vec<FrameSync>,
    main_pipeline: GraphicsPipeline,
    main_target: MainPassTarget,
    color_image: ImageResource,
    depth_image: ImageResource,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    swapchain: Swapchain,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: SurfaceHandle,
    instance: VulkanInstance,
}

impl Renderer {
    pub fn new(window: &mut Window, config: RendererConfig) -> VulkanResult<Self> {
        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Window extensions unavailable: {}", e))
        })?;
        let instance = VulkanInstance::new(&config.window_title, &required_extensions)?;

        let surface_raw = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| {
                VulkanError::InitializationFailed(format!("Surface creation failed: {}", e))
            })?;
        let surface = SurfaceHandle {
            loader: Surface::new(&instance.entry, &instance.instance),
            surface: surface_raw,
        };

        let physical_device = PhysicalDeviceInfo::select_suitable_device(
            &instance.instance,
            surface.surface,
            &surface.loader,
        )?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        let (fb_width, fb_height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            &device.device,
            &device.swapchain_loader,
            surface.surface,
            &surface.loader,
            &physical_device,
            vk::Extent2D {
                width: fb_width,
                height: fb_height,
            },
        )?;
        let image_count = swapchain.image_count();

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(image_count as u32);
        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::Api)?;

        let depth_format = physical_device.choose_supported_format(
            &instance.instance,
            &[
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D32_SFLOAT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let (color_image, depth_image) = create_attachment_images(
            &device.device,
            &instance.instance,
            &physical_device,
            swapchain.extent(),
            swapchain.format().format,
            depth_format,
        )?;

        let main_target = create_main_target(
            &device.device,
            &swapchain,
            &color_image,
            &depth_image,
            physical_device.msaa_samples,
        )?;

        let vp_ubo = UniformBufferSet::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            UboViewProjection::default(),
            vk::ShaderStageFlags::VERTEX,
            0,
            image_count,
        )?;
        let light_ubo = UniformBufferSet::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            UboDirLight::default(),
            vk::ShaderStageFlags::FRAGMENT,
            0,
            image_count,
        )?;
        let settings_ubo = UniformBufferSet::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            UboFragSettings::default(),
            vk::ShaderStageFlags::FRAGMENT,
            0,
            image_count,
        )?;

        let max_anisotropy = if physical_device.features.sampler_anisotropy == vk::TRUE {
            physical_device.properties.limits.max_sampler_anisotropy
        } else {
            1.0
        };
        let materials = MaterialRegistry::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            device.graphics_queue,
            command_pool,
            max_anisotropy,
        )?;

        let mut shadow_bindings = ShadowBindings::new(&device.device, image_count);
        let pending_dir = PendingShadowMap::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            image_count,
            config.shadow_map_resolution,
            DIR_SHADOW_BINDING,
            &mut shadow_bindings,
        )?;
        let pending_spot = PendingShadowMap::new(
            &device.device,
            &instance.instance,
            physical_device.device,
            image_count,
            config.shadow_map_resolution,
            SPOT_SHADOW_BINDING,
            &mut shadow_bindings,
        )?;
        shadow_bindings.build()?;

        let shadow_vert = ShaderModule::from_file(
            &device.device,
            format!("{}/shadow.vert.spv", config.shader_dir),
        )?;
        let dir_shadow = pending_dir.finish(&shadow_bindings, &shadow_vert)?;
        let spot_shadow = pending_spot.finish(&shadow_bindings, &shadow_vert)?;

        let scene_vert = ShaderModule::from_file(
            &device.device,
            format!("{}/scene.vert.spv", config.shader_dir),
        )?;
        let scene_frag = ShaderModule::from_file(
            &device.device,
            format!("{}/scene.frag.spv", config.shader_dir),
        )?;
        let stages = [
            scene_vert.stage_info(vk::ShaderStageFlags::VERTEX),
            scene_frag.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];
        let set_layouts = [
            vp_ubo.layout(),
            materials.set_layout(),
            light_ubo.layout(),
            shadow_bindings.layout()?,
            settings_ubo.layout(),
        ];
        let push_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<PushModel>() as u32,
        }];
        let main_pipeline = GraphicsPipeline::new(
            &device.device,
            &PipelineParams {
                stages: &stages,
                set_layouts: &set_layouts,
                push_constant_ranges: &push_ranges,
                render_pass: main_target.render_pass,
                samples: physical_device.msaa_samples,
                color_attachment_count: 1,
            },
        )?;

        let mut frame_sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            frame_sync.push(FrameSync::new(&device.device)?);
        }

        let extent = swapchain.extent();
        let camera = Camera::perspective(
            Vec3::new(0.0, 3.0, 6.0),
            config.fov_degrees,
            extent.width as f32 / extent.height as f32,
            config.near_plane,
            config.far_plane,
        );

        log::info!(
            "Renderer initialized ({} swapchain images, {:?} MSAA)",
            image_count,
            physical_device.msaa_samples
        );

        Ok(Self {
            config,
            camera,
            objects: Vec::new(),
            current_frame: 0,
            frame_count: 0,
            dir_shadow,
            spot_shadow,
            shadow_bindings,
            materials,
            vp_ubo,
            light_ubo,
            settings_ubo,
            frame_sync,
            main_pipeline,
            main_target,
            color_image,
            depth_image,
            command_buffers,
            command_pool,
            swapchain,
            device,
            physical_device,
            surface,
            instance,
        })
    }

    /// Stage geometry into device-local buffers using the renderer's
    /// transfer queue
    pub fn create_mesh(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Mat4,
        material_id: u32,
    ) -> VulkanResult<Mesh> {
        Mesh::new(
            &self.device.device,
            &self.instance.instance,
            self.physical_device.device,
            self.device.graphics_queue,
            self.command_pool,
            vertices,
            indices,
            transform,
            material_id,
        )
    }

    /// Register a material from decoded diffuse, specular and normal maps.
    /// Missing channels fall back to the blank placeholder.
    pub fn create_material(
        &mut self,
        channels: [Option<&ImageData>; 3],
    ) -> VulkanResult<u32> {
        let queue = self.device.graphics_queue;
        let pool = self.command_pool;
        self.materials.create_material(channels, queue, pool)
    }

    pub fn add_object(&mut self, object: SceneObject) -> usize {
        log::debug!(
            "Added object '{}' ({} meshes)",
            object.name(),
            object.meshes().len()
        );
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.objects.get_mut(index)
    }

    /// Settings the renderer was built with; asset loaders read their
    /// search directories from here
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Light parameters uploaded on the next frame
    pub fn light_mut(&mut self) -> &mut UboDirLight {
        &mut self.light_ubo.data
    }

    /// Fragment debug switches uploaded on the next frame
    pub fn frag_settings_mut(&mut self) -> &mut UboFragSettings {
        &mut self.settings_ubo.data
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Render one frame. On an out-of-date swapchain the frame is skipped
    /// and the swapchain rebuilt; the caller just keeps calling `draw`.
    pub fn draw(
        &mut self,
        window: &Window,
        overlay: &mut dyn OverlayHook,
    ) -> VulkanResult<()> {
        let frame = self.current_frame;
        self.frame_sync[frame]
            .in_flight
            .wait(self.config.fence_timeout_ns)?;

        overlay.begin_frame();

        let image_available = self.frame_sync[frame].image_available.handle();
        let acquire_result = unsafe {
            self.device.swapchain_loader.acquire_next_image(
                self.swapchain.handle(),
                self.config.acquire_timeout_ns,
                image_available,
                vk::Fence::null(),
            )
        };
        let image_index = match acquire_result {
            Ok((index, _suboptimal)) => index as usize,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date on acquire, recreating");
                return self.recreate_swapchain(window);
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        // Reset only after acquisition succeeds so a skipped frame leaves
        // the fence signaled
        self.frame_sync[frame].in_flight.reset()?;

        self.update_uniforms(image_index)?;
        self.record_commands(image_index, overlay)?;

        let command_buffer = self.command_buffers[image_index];
        let render_finished = self.frame_sync[frame].render_finished.handle();
        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device
                .queue_submit(
                    self.device.graphics_queue,
                    &[submit_info.build()],
                    self.frame_sync[frame].in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.present_queue, &present_info)
        };
        match present_result {
            Ok(false) => {}
            Ok(true) => {
                log::warn!("Swapchain suboptimal on present, recreating");
                self.recreate_swapchain(window)?;
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date on present, recreating");
                self.recreate_swapchain(window)?;
            }
            Err(e) => return Err(VulkanError::Api(e)),
        }

        self.current_frame = next_frame_index(self.current_frame);
        self.frame_count += 1;
        Ok(())
    }

    fn update_uniforms(&mut self, image_index: usize) -> VulkanResult<()> {
        self.vp_ubo.data = UboViewProjection {
            projection: self.camera.projection_matrix(),
            view: self.camera.view_matrix(),
        };
        self.vp_ubo.update(image_index)?;
        self.settings_ubo.update(image_index)?;

        let light = self.light_ubo.data;
        let near = self.config.near_plane;
        let far = self.config.far_plane;
        let up = Vec3::new(0.0, 1.0, 0.0);

        let dir = light.dl_direction.xyz().normalize();
        let dir_view = Mat4::look_at(-dir * DIR_LIGHT_DISTANCE, Vec3::zeros(), up);
        let dir_projection = Mat4::perspective_vk(deg_to_rad(90.0), 1.0, near, far);

        let spot_eye = light.sl_position.xyz();
        let spot_view = Mat4::look_at(spot_eye, spot_eye + light.sl_direction.xyz(), up);
        let spot_projection =
            Mat4::perspective_vk(deg_to_rad(light.sl_cutoff * 2.0), 1.0, near, far);

        // The main pass projects fragments with the same matrices the
        // shadow passes render with
        self.light_ubo.data.dl_view_projection = dir_projection * dir_view;
        self.light_ubo.data.sl_view_projection = spot_projection * spot_view;
        self.light_ubo.update(image_index)?;

        let dir_matrices = self.dir_shadow.light_matrices_mut();
        dir_matrices.view = dir_view;
        dir_matrices.projection = dir_projection;
        self.dir_shadow.update_ubo(image_index)?;

        let spot_matrices = self.spot_shadow.light_matrices_mut();
        spot_matrices.view = spot_view;
        spot_matrices.projection = spot_projection;
        self.spot_shadow.update_ubo(image_index)?;

        Ok(())
    }

    fn record_commands(
        &self,
        image_index: usize,
        overlay: &mut dyn OverlayHook,
    ) -> VulkanResult<()> {
        let device = &self.device.device;
        let command_buffer = self.command_buffers[image_index];

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        // Shadow depth first so the main pass samples this frame's maps
        self.dir_shadow
            .record_commands(command_buffer, image_index, &self.objects);
        self.spot_shadow
            .record_commands(command_buffer, image_index, &self.objects);

        let extent = self.swapchain.extent();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
            vk::ClearValue::default(),
        ];
        let pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.main_target.render_pass)
            .framebuffer(self.main_target.framebuffers[image_index])
            .render_area(full_scissor(extent))
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &pass_begin, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.main_pipeline.handle(),
            );
            device.cmd_set_viewport(command_buffer, 0, &[viewport_flipped(extent)]);
            device.cmd_set_scissor(command_buffer, 0, &[full_scissor(extent)]);

            for object in &self.objects {
                for mesh in object.meshes() {
                    let sets = [
                        self.vp_ubo.set(image_index),
                        self.materials.descriptor_set(mesh.material_id())?,
                        self.light_ubo.set(image_index),
                        self.shadow_bindings.set(image_index),
                        self.settings_ubo.set(image_index),
                    ];
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        self.main_pipeline.layout(),
                        0,
                        &sets,
                        &[],
                    );

                    device.cmd_bind_vertex_buffers(
                        command_buffer,
                        0,
                        &[mesh.vertex_buffer()],
                        &[0],
                    );

                    let push =
                        PushModel::new(object.transform() * mesh.transform(), object.shaded());
                    device.cmd_push_constants(
                        command_buffer,
                        self.main_pipeline.layout(),
                        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                        0,
                        push.as_bytes(),
                    );

                    if let Some(index_buffer) = mesh.index_buffer() {
                        device.cmd_bind_index_buffer(
                            command_buffer,
                            index_buffer,
                            0,
                            vk::IndexType::UINT32,
                        );
                        device.cmd_draw_indexed(command_buffer, mesh.index_count(), 1, 0, 0, 0);
                    } else {
                        device.cmd_draw(command_buffer, mesh.vertex_count(), 1, 0, 0);
                    }
                }
            }
        }

        overlay.record(command_buffer, image_index);

        unsafe {
            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Rebuild the swapchain and every target sized to it. Pipelines use
    /// dynamic viewport state and survive unchanged.
    fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        let (width, height) = window.get_framebuffer_size();
        if width == 0 || height == 0 {
            // Minimized; retry once the framebuffer has area again
            return Ok(());
        }

        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)?;
        }

        self.swapchain.recreate(
            self.surface.surface,
            &self.surface.loader,
            &self.physical_device,
            vk::Extent2D { width, height },
        )?;

        // Command buffers, uniform rings and shadow framebuffers are sized
        // to the startup image count and would be indexed past otherwise
        check_image_count_stable(self.command_buffers.len(), self.swapchain.image_count())?;

        let (color_image, depth_image) = create_attachment_images(
            &self.device.device,
            &self.instance.instance,
            &self.physical_device,
            self.swapchain.extent(),
            self.swapchain.format().format,
            self.depth_image.format(),
        )?;
        self.color_image = color_image;
        self.depth_image = depth_image;

        self.main_target = create_main_target(
            &self.device.device,
            &self.swapchain,
            &self.color_image,
            &self.depth_image,
            self.physical_device.msaa_samples,
        )?;

        let extent = self.swapchain.extent();
        self.camera
            .set_aspect_ratio(extent.width as f32 / extent.height as f32);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device.device_wait_idle() {
                log::error!("Device wait on renderer teardown failed: {:?}", e);
            }
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

/// A recreated swapchain must report the same image count the per-image
/// resources were sized for; a changed count is reported as an error
/// instead of going out of bounds in the frame path
fn check_image_count_stable(previous: usize, current: usize) -> VulkanResult<()> {
    if previous == current {
        return Ok(());
    }
    Err(VulkanError::InvalidOperation {
        reason: format!(
            "swapchain image count changed from {} to {} on recreation",
            previous, current
        ),
    })
}

fn create_attachment_images(
    device: &ash::Device,
    instance: &ash::Instance,
    physical_device: &PhysicalDeviceInfo,
    extent: vk::Extent2D,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> VulkanResult<(ImageResource, ImageResource)> {
    let color_image = ImageResource::new(
        device,
        instance,
        physical_device.device,
        extent,
        color_format,
        vk::ImageTiling::OPTIMAL,
        vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
        physical_device.msaa_samples,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::ImageAspectFlags::COLOR,
    )?;

    let depth_image = ImageResource::new(
        device,
        instance,
        physical_device.device,
        extent,
        depth_format,
        vk::ImageTiling::OPTIMAL,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        physical_device.msaa_samples,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::ImageAspectFlags::DEPTH,
    )?;

    Ok((color_image, depth_image))
}

fn create_main_target(
    device: &ash::Device,
    swapchain: &Swapchain,
    color_image: &ImageResource,
    depth_image: &ImageResource,
    samples: vk::SampleCountFlags,
) -> VulkanResult<MainPassTarget> {
    let color_format = swapchain.format().format;

    let attachments = [
        // Multisampled color, resolved before present
        vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build(),
        vk::AttachmentDescription::builder()
            .format(depth_image.format())
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build(),
        // Single-sample resolve target presented to the surface
        vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build(),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_refs = [vk::AttachmentReference {
        attachment: 2,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .resolve_attachments(&resolve_refs)
        .depth_stencil_attachment(&depth_ref)
        .build()];

    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::empty(),
            dst_subpass: 0,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        vk::SubpassDependency {
            src_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            dst_access_mask: vk::AccessFlags::empty(),
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    let render_pass = unsafe { device.create_render_pass(&render_pass_info, None) }
        .map_err(VulkanError::Api)?;

    let extent = swapchain.extent();
    let mut framebuffers = Vec::with_capacity(swapchain.image_count());
    for &swapchain_view in swapchain.image_views() {
        let views = [color_image.view(), depth_image.view(), swapchain_view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&views)
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

    Ok(MainPassTarget {
        device: device.clone(),
        render_pass,
        framebuffers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_image_count_passes() {
        assert!(check_image_count_stable(3, 3).is_ok());
    }

    #[test]
    fn test_changed_image_count_is_an_error() {
        let result = check_image_count_stable(3, 4);
        assert!(matches!(
            result,
            Err(VulkanError::InvalidOperation { .. })
        ));
    }
}
