use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, Result};
use crate::renderer::vk::memory;

/// A buffer bound at offset 0 to its own dedicated memory allocation
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: u64,

    device: Arc<ash::Device>,
}

impl AllocatedBuffer {
    pub fn new(
        buffer_size: u64,
        buffer_usage: vk::BufferUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
        name: &str,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(buffer_size)
                .usage(buffer_usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let reqs = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = memory::allocate_memory(&device, memory_properties, reqs, memory_flags, name)
            .and_then(|memory| {
                unsafe { device.bind_buffer_memory(buffer, memory, 0) }
                    .map(|_| memory)
                    .map_err(|err| {
                        unsafe { device.free_memory(memory, None) };
                        eyre!("Failed to bind memory for {}: {}", name, err)
                    })
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        Ok(Self {
            buffer,
            memory,
            size: buffer_size,
            device,
        })
    }

    /// Copies `data` into the buffer at byte `offset` through a short-lived mapping
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(eyre!(
                "Write of {} bytes at offset {} overruns buffer of {} bytes",
                data.len(),
                offset,
                self.size,
            ));
        }

        memory::write_mapped(&self.device, self.memory, offset, data)
    }
}

impl Drop for AllocatedBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
