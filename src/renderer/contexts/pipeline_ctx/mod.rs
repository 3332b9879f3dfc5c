pub mod pipeline;
pub mod shader;

use ash::vk;
use color_eyre::Result;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::contexts::resource_ctx::depth::DEPTH_FORMAT;
use crate::renderer::contexts::resource_ctx::UniformResource;
use crate::renderer::contexts::pipeline_ctx::pipeline::{Pipeline, PipelineBuilder};
use crate::renderer::contexts::pipeline_ctx::shader::GraphicsShader;
use crate::renderer::resources::vertex::VertexInputDescription;

/// Line drawing pipeline: filled, back-face culled, depth-tested, opaque
pub fn build_pipeline(
    ctx: &DeviceContext,
    swapchain_format: vk::Format,
    uniform: &UniformResource,
    config: &RenderConfig,
) -> Result<Pipeline> {
    let device = ctx.device.logical.clone();
    let shader = GraphicsShader::new(
        &config.vertex_shader_path,
        &config.fragment_shader_path,
        device.clone(),
    )?;

    PipelineBuilder::new(device)
        .with_shader(shader)
        .with_vertex_input(VertexInputDescription::default())
        .with_input_topology(config.topology)
        .with_polygon_mode(vk::PolygonMode::FILL)
        .with_cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE)
        .with_multisampling_disabled()
        .with_blending_disabled()
        .with_depth_test(true, Some(vk::CompareOp::LESS_OR_EQUAL))
        .with_color_attachment_format(swapchain_format)
        .with_depth_attachment_format(DEPTH_FORMAT)
        .build(uniform)
}
