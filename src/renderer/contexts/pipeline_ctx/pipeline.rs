use std::ffi::CStr;
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::contexts::pipeline_ctx::shader::GraphicsShader;
use crate::renderer::contexts::resource_ctx::UniformResource;
use crate::renderer::resources::vertex::VertexInputDescription;
use crate::renderer::vk::descriptor_set_layout_builder::DescriptorSetLayoutBuilder;

const SHADER_ENTRY: &CStr = c"main";

/// Graphics pipeline plus the descriptor objects feeding its single uniform binding.
///
/// Any handle may still be null while the builder is filling it in; destroying a null
/// handle is a no-op, so a half-built value cleans up correctly on drop.
pub struct Pipeline {
    pub handle: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptor_set: vk::DescriptorSet,

    descriptor_pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
    device: Arc<ash::Device>,
}

impl Pipeline {
    fn empty(device: Arc<ash::Device>) -> Self {
        Self {
            handle: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            descriptor_set: vk::DescriptorSet::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            device,
        }
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.handle,
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                &[self.descriptor_set],
                &[],
            );
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            // Frees the descriptor set with it
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

pub struct PipelineBuilder {
    device: Arc<ash::Device>,

    vertex_input_description: VertexInputDescription,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    color_attachment_format: vk::Format,
    depth_attachment_format: vk::Format,
    shader: Option<GraphicsShader>,
}

impl PipelineBuilder {
    pub fn new(device: Arc<ash::Device>) -> Self {
        Self {
            device,

            vertex_input_description: VertexInputDescription::default(),
            input_assembly: Self::default_input_assembly_info(),
            rasterization: Self::default_rasterization_info(),
            color_blend_attachment: Self::default_color_blend_state(),
            multisample: Self::default_multisample_info(),
            depth_stencil: Self::default_depth_stencil_info(),
            color_attachment_format: vk::Format::UNDEFINED,
            depth_attachment_format: vk::Format::UNDEFINED,
            shader: None,
        }
    }

    pub fn with_shader(mut self, shader: GraphicsShader) -> Self {
        let _ = self.shader.replace(shader);
        self
    }

    pub fn with_input_topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::FALSE;
        self
    }

    pub fn with_polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.rasterization.polygon_mode = mode;
        self.rasterization.line_width = 1.0;
        self
    }

    pub fn with_cull_mode(
        mut self,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Self {
        self.rasterization.cull_mode = cull_mode;
        self.rasterization.front_face = front_face;
        self
    }

    pub fn with_multisampling_disabled(mut self) -> Self {
        self.multisample = Self::default_multisample_info();
        self
    }

    pub fn with_blending_disabled(mut self) -> Self {
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        self.color_blend_attachment.blend_enable = vk::FALSE;
        self
    }

    pub fn with_color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_format = format;
        self
    }

    pub fn with_depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = format;
        self
    }

    pub fn with_depth_test(
        mut self,
        enable: bool,
        compare: Option<vk::CompareOp>,
    ) -> Self {
        self.depth_stencil.depth_test_enable = enable.into();
        self.depth_stencil.depth_write_enable = enable.into();
        self.depth_stencil.depth_compare_op = if enable {
            compare.unwrap_or(vk::CompareOp::LESS_OR_EQUAL)
        } else {
            vk::CompareOp::ALWAYS
        };
        self
    }

    pub fn with_vertex_input(mut self, description: VertexInputDescription) -> Self {
        self.vertex_input_description = description;
        self
    }

    /// Creates the descriptor objects, points binding 0 at `uniform`, then the pipeline.
    /// The shader modules are destroyed before this returns.
    pub fn build(mut self, uniform: &UniformResource) -> Result<Pipeline> {
        let shader = self
            .shader
            .take()
            .ok_or_eyre("No shader provided for PipelineBuilder")?;
        if self.color_attachment_format == vk::Format::UNDEFINED {
            return Err(eyre!("No color attachment format provided for PipelineBuilder"));
        }

        let device = self.device.clone();
        let mut pipeline = Pipeline::empty(device.clone());

        let set_layout_builder = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                1,
                vk::ShaderStageFlags::VERTEX,
            );
        pipeline.set_layout = set_layout_builder.build(&device)?;

        pipeline.descriptor_pool = {
            let pool_sizes = set_layout_builder.pool_sizes();
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes);
            unsafe { device.create_descriptor_pool(&pool_info, None)? }
        };

        pipeline.descriptor_set = {
            let set_layouts = [pipeline.set_layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pipeline.descriptor_pool)
                .set_layouts(&set_layouts);
            unsafe { device.allocate_descriptor_sets(&alloc_info)? }
                .first()
                .copied()
                .ok_or_eyre("Descriptor pool returned no sets")?
        };

        let buffer_infos = [uniform.descriptor_info()];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(pipeline.descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos);
        unsafe { device.update_descriptor_sets(&[write], &[]) };

        pipeline.layout = {
            let set_layouts = [pipeline.set_layout];
            let layout_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts);
            unsafe { device.create_pipeline_layout(&layout_info, None)? }
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shader.vert_mod)
                .name(SHADER_ENTRY),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shader.frag_mod)
                .name(SHADER_ENTRY),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_attribute_descriptions(&self.vertex_input_description.attributes)
            .vertex_binding_descriptions(&self.vertex_input_description.bindings)
            .flags(self.vertex_input_description.flags);

        // Counts only; the actual viewport and scissor are set while recording
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let color_blend_attachments = [self.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let color_formats = [self.color_attachment_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_attachment_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut rendering_info)
            .stages(&shader_stages)
            .layout(pipeline.layout)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterization)
            .multisample_state(&self.multisample)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&self.depth_stencil)
            .dynamic_state(&dynamic_info);

        let result = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };
        pipeline.handle = accept_pipeline_result(result)?;
        drop(shader);

        log::info!(
            "Created graphics pipeline ({:?}, color {:?}, depth {:?})",
            self.input_assembly.topology,
            self.color_attachment_format,
            self.depth_attachment_format,
        );

        Ok(pipeline)
    }

    fn default_input_assembly_info() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::LINE_STRIP)
            .primitive_restart_enable(false)
    }

    fn default_rasterization_info() -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
    }

    fn default_color_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
    }

    fn default_multisample_info() -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
    }

    fn default_depth_stencil_info() -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
    }
}

/// `PIPELINE_COMPILE_REQUIRED` counts as success; any other error status does not.
/// A null handle is always an error since there would be nothing to bind.
pub fn accept_pipeline_result(
    result: Result<Vec<vk::Pipeline>, (Vec<vk::Pipeline>, vk::Result)>,
) -> Result<vk::Pipeline> {
    let pipelines = match result {
        Ok(pipelines) => pipelines,
        Err((pipelines, vk::Result::PIPELINE_COMPILE_REQUIRED)) => {
            log::debug!("Pipeline creation reported PIPELINE_COMPILE_REQUIRED, continuing");
            pipelines
        }
        Err((_, err)) => return Err(eyre!("Failed to create graphics pipeline: {}", err)),
    };

    pipelines
        .first()
        .copied()
        .filter(|pipeline| *pipeline != vk::Pipeline::null())
        .ok_or_eyre("Pipeline creation produced no pipeline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn handle(raw: u64) -> vk::Pipeline {
        vk::Pipeline::from_raw(raw)
    }

    #[test]
    fn success_returns_the_pipeline() {
        assert_eq!(accept_pipeline_result(Ok(vec![handle(7)])).unwrap(), handle(7));
    }

    #[test]
    fn compile_required_is_accepted() {
        let result = Err((vec![handle(9)], vk::Result::PIPELINE_COMPILE_REQUIRED));
        assert_eq!(accept_pipeline_result(result).unwrap(), handle(9));
    }

    #[test]
    fn other_errors_are_fatal() {
        let result = Err((vec![vk::Pipeline::null()], vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert!(accept_pipeline_result(result).is_err());
    }

    #[test]
    fn null_handle_is_rejected() {
        assert!(accept_pipeline_result(Ok(vec![vk::Pipeline::null()])).is_err());
        assert!(accept_pipeline_result(Ok(vec![])).is_err());
    }
}
