//! Graphics pipeline construction
//!
//! One wrapper serves both the main pass and the depth-only shadow pass;
//! callers pass their shader stages, render pass and attachment layout.
//! Viewport and scissor are dynamic state, so swapchain recreation never
//! rebuilds pipelines. The main pass records a Y-flipped viewport while the
//! shadow pass records an unflipped one; the mismatch is long-standing and
//! the shaders are written against it, so both helpers stay.

use super::context::{VulkanError, VulkanResult};
use super::vertex::Vertex;
use ash::vk;
use ash::Device;

/// Everything that differs between the pipelines this renderer builds
pub struct PipelineParams<'a> {
    pub stages: &'a [vk::PipelineShaderStageCreateInfo],
    pub set_layouts: &'a [vk::DescriptorSetLayout],
    pub push_constant_ranges: &'a [vk::PushConstantRange],
    pub render_pass: vk::RenderPass,
    pub samples: vk::SampleCountFlags,
    /// Zero for depth-only passes
    pub color_attachment_count: u32,
}

/// Graphics pipeline plus its layout, destroyed together
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    pub fn new(device: &Device, params: &PipelineParams) -> VulkanResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(params.set_layouts)
            .push_constant_ranges(params.push_constant_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Actual viewport and scissor are recorded per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = default_rasterizer();

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(params.samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..params
            .color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(true)
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                    .alpha_blend_op(vk::BlendOp::ADD)
                    .build()
            })
            .collect();
        let color_blending =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(params.stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(params.render_pass)
            .subpass(0);

        let pipeline = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            )
        }
        .map_err(|(_, err)| {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            VulkanError::Api(err)
        })?[0];

        log::debug!(
            "Created graphics pipeline ({} stages, {:?})",
            params.stages.len(),
            params.samples
        );

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn default_rasterizer<'a>() -> vk::PipelineRasterizationStateCreateInfoBuilder<'a> {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false)
}

/// Y-flipped viewport used by the main pass (requires maintenance1)
pub fn viewport_flipped(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Unflipped viewport used by the shadow pass
pub fn viewport_default(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Full-extent scissor rectangle
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flipped_viewport_inverts_height() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let flipped = viewport_flipped(extent);
        assert_eq!(flipped.y, 600.0);
        assert_eq!(flipped.height, -600.0);

        let normal = viewport_default(extent);
        assert_eq!(normal.y, 0.0);
        assert_eq!(normal.height, 600.0);
    }

    #[test]
    fn test_scissor_covers_full_extent() {
        let extent = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        let scissor = full_scissor(extent);
        assert_eq!(scissor.offset.x, 0);
        assert_eq!(scissor.extent, extent);
    }
}
