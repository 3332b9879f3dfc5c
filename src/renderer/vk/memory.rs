use std::ptr::NonNull;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;

/// First memory type allowed by `type_bits` whose properties include all of `flags`
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && props.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

/// Allocates exactly `requirements.size` bytes from a matching memory type
pub fn allocate_memory(
    device: &ash::Device,
    props: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
    name: &str,
) -> Result<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(props, requirements.memory_type_bits, flags)
        .ok_or_eyre(format!(
            "No memory type with {:?} for {} (type bits {:#b})",
            flags,
            name,
            requirements.memory_type_bits,
        ))?;

    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    let memory = unsafe { device.allocate_memory(&allocate_info, None)? };

    log::debug!(
        "Allocated {} bytes for {} from memory type {}",
        requirements.size,
        name,
        memory_type_index,
    );

    Ok(memory)
}

/// Maps `memory` at `offset` for exactly `data.len()` bytes, copies, then unmaps.
///
/// The memory must be host-visible and host-coherent, and the GPU must not be reading the
/// range while this runs.
pub fn write_mapped(
    device: &ash::Device,
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    let size = data.len() as vk::DeviceSize;
    let ptr = unsafe {
        device.map_memory(memory, offset, size, vk::MemoryMapFlags::empty())?
    };

    let copied = NonNull::new(ptr as *mut u8)
        .ok_or_else(|| eyre!("Mapped memory pointer was null"))
        .and_then(|ptr| {
            let mut range = MappedRange { ptr, len: data.len() };
            presser::copy_from_slice_to_offset(data, &mut range, 0)
                .map_err(|e| eyre!("Failed to copy into mapped memory: {:?}", e))
        });

    unsafe {
        device.unmap_memory(memory);
    }

    copied.map(|_| ())
}

/// Host pointer returned by `vkMapMemory`, valid until the matching unmap
struct MappedRange {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl presser::Slab for MappedRange {
    fn base_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    fn base_ptr_mut(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.len
    }
}
