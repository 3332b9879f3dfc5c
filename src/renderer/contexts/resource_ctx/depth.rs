use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::vk::memory;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D16_UNORM;

/// Depth test target sized to the swapchain, in device-local memory
pub struct DepthResource {
    pub image: vk::Image,
    pub view: vk::ImageView,

    memory: vk::DeviceMemory,
    device: Arc<ash::Device>,
}

impl DepthResource {
    pub fn new(
        ctx: &DeviceContext,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let device = ctx.device.logical.clone();

        let format_props = unsafe {
            ctx.instance.instance
                .get_physical_device_format_properties(ctx.device.physical, DEPTH_FORMAT)
        };
        let tiling = choose_depth_tiling(format_props)?;
        log::debug!("Depth image {:?} uses {:?} tiling", DEPTH_FORMAT, tiling);

        let image = {
            let info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(DEPTH_FORMAT)
                .extent(vk::Extent3D { width, height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(tiling)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            unsafe { device.create_image(&info, None)? }
        };

        let reqs = unsafe { device.get_image_memory_requirements(image) };
        let memory = match memory::allocate_memory(
            &device,
            &ctx.device.memory_properties,
            reqs,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            "depth image",
        ) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                return Err(err);
            }
        };

        let view = unsafe {
            device.bind_image_memory(image, memory, 0)
                .and_then(|_| {
                    let info = vk::ImageViewCreateInfo::default()
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .image(image)
                        .format(DEPTH_FORMAT)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::DEPTH,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        });
                    device.create_image_view(&info, None)
                })
        };
        let view = match view {
            Ok(view) => view,
            Err(err) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(err.into());
            }
        };

        Ok(Self {
            image,
            view,
            memory,
            device,
        })
    }
}

impl Drop for DepthResource {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Linear tiling when it can back a depth attachment, otherwise optimal
pub fn choose_depth_tiling(props: vk::FormatProperties) -> Result<vk::ImageTiling> {
    let usage = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    if props.linear_tiling_features.contains(usage) {
        Ok(vk::ImageTiling::LINEAR)
    } else if props.optimal_tiling_features.contains(usage) {
        Ok(vk::ImageTiling::OPTIMAL)
    } else {
        Err(eyre!(
            "Depth format {:?} is not supported as a depth attachment with any tiling",
            DEPTH_FORMAT
        ))
    }
}
