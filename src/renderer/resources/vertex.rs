use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec4;

/// Data unique to each vertex passed as elements into the vertex arena
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec4,
    pub color: Vec4,
}

impl Vertex {
    pub const STRIDE: u32 = size_of::<Vertex>() as u32;

    pub fn new(position: Vec4, color: Vec4) -> Self {
        Self { position, color }
    }
}

/// Vertex layout handed to the pipeline: one interleaved binding, position then color
#[derive(Debug, Clone)]
pub struct VertexInputDescription {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    pub flags: vk::PipelineVertexInputStateCreateFlags,
}

impl Default for VertexInputDescription {
    fn default() -> Self {
        let bindings = vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(Vertex::STRIDE)
                .input_rate(vk::VertexInputRate::VERTEX),
        ];
        let attributes = vec![
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(std::mem::offset_of!(Vertex, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(std::mem::offset_of!(Vertex, color) as u32),
        ];

        Self {
            bindings,
            attributes,
            flags: vk::PipelineVertexInputStateCreateFlags::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_has_32_byte_stride() {
        assert_eq!(Vertex::STRIDE, 32);
        assert_eq!(bytemuck::bytes_of(&Vertex::default()).len(), 32);
    }

    #[test]
    fn input_description_matches_vertex_layout() {
        let desc = VertexInputDescription::default();
        assert_eq!(desc.bindings.len(), 1);
        assert_eq!(desc.bindings[0].stride, 32);

        assert_eq!(desc.attributes.len(), 2);
        assert_eq!(desc.attributes[0].location, 0);
        assert_eq!(desc.attributes[0].offset, 0);
        assert_eq!(desc.attributes[1].location, 1);
        assert_eq!(desc.attributes[1].offset, 16);
        assert!(desc
            .attributes
            .iter()
            .all(|attr| attr.format == vk::Format::R32G32B32A32_SFLOAT));
    }
}
