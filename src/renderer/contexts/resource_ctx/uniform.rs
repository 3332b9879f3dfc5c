use ash::vk;
use bytemuck::{Pod, Zeroable};
use color_eyre::Result;
use glam::Mat4;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::vk::buffer::AllocatedBuffer;

/// Matrices read by the vertex shader from set 0, binding 0
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformData {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

pub const UNIFORM_SIZE: u64 = size_of::<TransformData>() as u64;

/// Host-visible, host-coherent uniform buffer; writes need no explicit flush
pub struct UniformResource {
    buffer: AllocatedBuffer,
}

impl UniformResource {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let buffer = AllocatedBuffer::new(
            UNIFORM_SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            "uniform buffer",
            &ctx.device.memory_properties,
            ctx.device.logical.clone(),
        )?;

        let uniform = Self { buffer };
        // Identity transforms until someone uploads real ones
        uniform.write(&TransformData::default())?;

        Ok(uniform)
    }

    pub fn write(&self, data: &TransformData) -> Result<()> {
        self.buffer.write(0, bytemuck::bytes_of(data))
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.buffer,
            offset: 0,
            range: UNIFORM_SIZE,
        }
    }
}
