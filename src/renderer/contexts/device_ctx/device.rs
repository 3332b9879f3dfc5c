use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::queue::{Queue, QueueFamily};

/// What the instance reports about one physical device, detached from the driver so the
/// selection policy can be exercised without a GPU
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub extensions: Vec<CString>,
}

#[derive(Debug, Clone)]
pub struct DeviceSelection {
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub graphics_family: QueueFamily,
}

/// Picks the first enumerated device and its first graphics-capable queue family.
///
/// No scoring is done, so on multi-GPU machines this may not be the fastest device.
pub fn select_physical_device(candidates: &[DeviceCandidate]) -> Result<DeviceSelection> {
    let candidate = candidates
        .first()
        .ok_or_eyre("No Vulkan-capable physical device found")?;

    let graphics_family = candidate
        .queue_families
        .iter()
        .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| QueueFamily::new(index as u32, candidate.queue_families[index]))
        .ok_or_eyre(format!(
            "Physical device \"{}\" has no graphics-capable queue family",
            candidate.name
        ))?;

    for req_ext in RenderDevice::get_required_device_extensions() {
        let supported = candidate
            .extensions
            .iter()
            .any(|ext| ext.as_c_str() == req_ext);
        if !supported {
            return Err(eyre!(
                "Physical device \"{}\" does not support required extension {:?}",
                candidate.name,
                req_ext,
            ));
        }
    }

    Ok(DeviceSelection {
        physical: candidate.handle,
        name: candidate.name.clone(),
        graphics_family,
    })
}

/// The graphics family must also present; there is no fallback search for a separate
/// present queue.
pub fn ensure_present_support(supported: bool, family: &QueueFamily) -> Result<()> {
    if supported {
        Ok(())
    } else {
        Err(eyre!(
            "Queue family {} cannot present to the window surface",
            family.index
        ))
    }
}

/// Logical device plus the single graphics/present queue
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub graphics_queue: Queue,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl RenderDevice {
    pub fn new(instance: &ash::Instance) -> Result<Self> {
        let candidates = Self::enumerate_candidates(instance)?;
        let selection = select_physical_device(&candidates)?;

        log::info!(
            "Selected physical device \"{}\" (graphics queue family {})",
            selection.name,
            selection.graphics_family.index,
        );

        let (logical, graphics_queue) = Self::create_logical_device(
            instance,
            selection.physical,
            selection.graphics_family,
        )?;

        let memory_properties = unsafe {
            instance.get_physical_device_memory_properties(selection.physical)
        };

        Ok(Self {
            logical: Arc::new(logical),
            physical: selection.physical,
            name: selection.name,
            graphics_queue,
            memory_properties,
        })
    }

    fn enumerate_candidates(instance: &ash::Instance) -> Result<Vec<DeviceCandidate>> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        devices
            .into_iter()
            .map(|device| -> Result<DeviceCandidate> {
                let props = unsafe { instance.get_physical_device_properties(device) };
                let name = props
                    .device_name_as_c_str()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "<unnamed device>".into());
                let queue_families = unsafe {
                    instance.get_physical_device_queue_family_properties(device)
                };
                let extensions = unsafe {
                    instance.enumerate_device_extension_properties(device)?
                }
                    .iter()
                    .filter_map(|ext| ext.extension_name_as_c_str().ok())
                    .map(CStr::to_owned)
                    .collect();

                Ok(DeviceCandidate {
                    handle: device,
                    name,
                    queue_families,
                    extensions,
                })
            })
            .collect()
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: QueueFamily,
    ) -> Result<(ash::Device, Queue)> {
        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family.index)
                .queue_priorities(&queue_priorities),
        ];

        let enabled_extension_names = Self::get_required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();

        // Render straight into attachment images instead of render pass/framebuffer objects
        let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names)
            .push_next(&mut vulkan13_features);

        let device = unsafe {
            instance.create_device(physical_device, &device_create_info, None)?
        };

        let graphics_queue = unsafe {
            let queue = device.get_device_queue(graphics_queue_family.index, 0);
            Queue::new(graphics_queue_family, queue)
        };

        Ok((device, graphics_queue))
    }

    pub fn get_required_device_extensions() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,

            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            self.logical.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn candidate(raw: u64, families: Vec<vk::QueueFamilyProperties>) -> DeviceCandidate {
        DeviceCandidate {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: format!("fake-gpu-{raw}"),
            queue_families: families,
            extensions: RenderDevice::get_required_device_extensions()
                .into_iter()
                .map(CStr::to_owned)
                .collect(),
        }
    }

    #[test]
    fn picks_first_device_without_scoring() {
        let candidates = [
            candidate(1, vec![family(vk::QueueFlags::GRAPHICS)]),
            candidate(2, vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)]),
        ];
        let selection = select_physical_device(&candidates).unwrap();
        assert_eq!(selection.physical.as_raw(), 1);
        assert_eq!(selection.name, "fake-gpu-1");
    }

    #[test]
    fn picks_first_graphics_family() {
        let candidates = [candidate(
            7,
            vec![
                family(vk::QueueFlags::TRANSFER),
                family(vk::QueueFlags::COMPUTE),
                family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
                family(vk::QueueFlags::GRAPHICS),
            ],
        )];
        let selection = select_physical_device(&candidates).unwrap();
        assert_eq!(selection.graphics_family.index, 2);
        assert!(selection.graphics_family.supports_graphics());
    }

    #[test]
    fn no_devices_is_an_error() {
        assert!(select_physical_device(&[]).is_err());
    }

    #[test]
    fn no_graphics_family_is_an_error() {
        // The second device would qualify, but only the first one is ever considered
        let candidates = [
            candidate(1, vec![family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)]),
            candidate(2, vec![family(vk::QueueFlags::GRAPHICS)]),
        ];
        assert!(select_physical_device(&candidates).is_err());
    }

    #[test]
    fn missing_swapchain_extension_is_an_error() {
        let mut gpu = candidate(1, vec![family(vk::QueueFlags::GRAPHICS)]);
        gpu.extensions.clear();
        gpu.extensions.push(c"VK_KHR_maintenance1".to_owned());
        assert!(select_physical_device(&[gpu]).is_err());
    }

    #[test]
    fn present_support_is_required() {
        let graphics = QueueFamily::new(0, family(vk::QueueFlags::GRAPHICS));
        assert!(ensure_present_support(true, &graphics).is_ok());
        assert!(ensure_present_support(false, &graphics).is_err());
    }
}
