use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::DeviceContext;

/// Triple buffering unless the surface forces otherwise
pub const TARGET_IMAGE_COUNT: u32 = 3;

/// Used when the surface doesn't care which format it gets
pub const DEFAULT_SURFACE_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

const COMPOSITE_ALPHA_PREFERENCE: [vk::CompositeAlphaFlagsKHR; 4] = [
    vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::INHERIT,
    vk::CompositeAlphaFlagsKHR::OPAQUE,
];

/// Presentable images, their views, and the format/extent they were created with.
///
/// Created exactly once per renderer; there is no recreation path.
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,

    device: Arc<ash::Device>,
}

impl Swapchain {
    pub fn new(
        ctx: &DeviceContext,
        desired_width: u32,
        desired_height: u32,
    ) -> Result<Self> {
        let physical_device = ctx.device.physical;
        let surface = &ctx.surface;

        let surface_capabilities = unsafe {
            surface.loader
                .get_physical_device_surface_capabilities(physical_device, surface.handle)?
        };
        let surface_formats = unsafe {
            surface.loader
                .get_physical_device_surface_formats(physical_device, surface.handle)?
        };

        let surface_format = choose_surface_format(&surface_formats)?;
        let image_extent = choose_extent(&surface_capabilities, desired_width, desired_height);
        let pre_transform = choose_pre_transform(&surface_capabilities);
        let composite_alpha = choose_composite_alpha(surface_capabilities.supported_composite_alpha);
        let min_image_count = choose_image_count(
            surface_capabilities.min_image_count,
            surface_capabilities.max_image_count,
        );

        let loader = ash::khr::swapchain::Device::new(
            &ctx.instance.instance,
            &ctx.device.logical,
        );
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(image_extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(composite_alpha)
            // Vsync-locked, always available
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .image_array_layers(1);

        let handle = unsafe {
            loader.create_swapchain(&swapchain_info, None)?
        };

        let device = ctx.device.logical.clone();
        let (images, image_views) = match Self::create_swapchain_images(
            handle,
            &loader,
            surface_format.format,
            &device,
        ) {
            Ok(images) => images,
            Err(err) => {
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(err);
            }
        };

        log::info!(
            "Created swapchain: {:?} {}x{}, {} images, {:?}",
            surface_format.format,
            image_extent.width,
            image_extent.height,
            images.len(),
            composite_alpha,
        );

        Ok(Self {
            handle,
            loader,
            images,
            image_views,
            format: surface_format.format,
            extent: image_extent,
            device,
        })
    }

    fn create_swapchain_images(
        swapchain: vk::SwapchainKHR,
        loader: &ash::khr::swapchain::Device,
        format: vk::Format,
        device: &ash::Device,
    ) -> Result<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        // Owned by the swapchain, never destroyed individually
        let images = unsafe {
            loader.get_swapchain_images(swapchain)?
        };

        let mut image_views = Vec::with_capacity(images.len());
        for image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::R,
                    g: vk::ComponentSwizzle::G,
                    b: vk::ComponentSwizzle::B,
                    a: vk::ComponentSwizzle::A,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(*image);
            let view: VkResult<vk::ImageView> = unsafe {
                device.create_image_view(&view_info, None)
            };
            match view {
                Ok(view) => image_views.push(view),
                Err(err) => {
                    for view in image_views {
                        unsafe { device.destroy_image_view(view, None) };
                    }
                    return Err(err.into());
                }
            }
        }

        Ok((images, image_views))
    }

    pub fn image(&self, index: u32) -> Result<(vk::Image, vk::ImageView)> {
        let image = self.images
            .get(index as usize)
            .ok_or_eyre(format!("Swapchain image index {} out of range", index))?;
        let view = self.image_views
            .get(index as usize)
            .ok_or_eyre(format!("Swapchain image view index {} out of range", index))?;
        Ok((*image, *view))
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

/// First reported format, substituting the default when the surface reports `UNDEFINED`
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    let first = formats
        .first()
        .ok_or_eyre("Surface reports no supported formats")?;

    if first.format == vk::Format::UNDEFINED {
        Ok(vk::SurfaceFormatKHR {
            format: DEFAULT_SURFACE_FORMAT,
            color_space: first.color_space,
        })
    } else {
        Ok(*first)
    }
}

/// Uses the surface's current extent unless it reports the "size decided by swapchain"
/// sentinel, in which case the request is clamped into the supported range
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: desired_width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired_height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

pub fn choose_pre_transform(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

/// Pre-multiplied, post-multiplied, inherit, opaque: first supported wins
pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    COMPOSITE_ALPHA_PREFERENCE
        .into_iter()
        .find(|mode| supported.contains(*mode))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// `max == 0` means the surface has no upper bound
pub fn choose_image_count(min: u32, max: u32) -> u32 {
    if max == 0 {
        TARGET_IMAGE_COUNT.max(min)
    } else {
        TARGET_IMAGE_COUNT.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    #[test]
    fn undefined_extent_clamps_request() {
        let caps = capabilities((u32::MAX, u32::MAX), (100, 100), (1000, 700));
        assert_eq!(
            choose_extent(&caps, 2000, 50),
            vk::Extent2D { width: 1000, height: 100 },
        );
        assert_eq!(
            choose_extent(&caps, 640, 480),
            vk::Extent2D { width: 640, height: 480 },
        );
    }

    #[test]
    fn defined_extent_is_used_verbatim() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096));
        assert_eq!(
            choose_extent(&caps, 640, 800),
            vk::Extent2D { width: 800, height: 600 },
        );
    }

    #[test]
    fn undefined_format_falls_back_to_bgra() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn first_defined_format_wins() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn composite_alpha_follows_preference_order() {
        let supported = vk::CompositeAlphaFlagsKHR::INHERIT | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED;
        assert_eq!(choose_composite_alpha(supported), vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED);

        let supported = vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(choose_composite_alpha(supported), vk::CompositeAlphaFlagsKHR::INHERIT);

        assert_eq!(
            choose_composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE),
            vk::CompositeAlphaFlagsKHR::OPAQUE,
        );
    }

    #[test]
    fn image_count_respects_surface_limits() {
        assert_eq!(choose_image_count(2, 0), 3);
        assert_eq!(choose_image_count(4, 0), 4);
        assert_eq!(choose_image_count(4, 5), 4);
        assert_eq!(choose_image_count(1, 2), 2);
        assert_eq!(choose_image_count(2, 8), 3);
    }

    #[test]
    fn identity_transform_preferred() {
        let mut caps = capabilities((1, 1), (1, 1), (1, 1));
        caps.supported_transforms = vk::SurfaceTransformFlagsKHR::IDENTITY | vk::SurfaceTransformFlagsKHR::ROTATE_90;
        caps.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&caps), vk::SurfaceTransformFlagsKHR::IDENTITY);

        caps.supported_transforms = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&caps), vk::SurfaceTransformFlagsKHR::ROTATE_90);
    }
}
