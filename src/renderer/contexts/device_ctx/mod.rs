pub mod instance;
pub mod device;
pub mod queue;
pub mod target;

use color_eyre::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use crate::renderer::contexts::device_ctx::device::{ensure_present_support, RenderDevice};
use crate::renderer::contexts::device_ctx::instance::{RenderInstance, Surface};

/// Responsibilities:
/// - Own the Vulkan instance, logical device, graphics/present queue, and window surface
/// - Tear them down in reverse creation order: device, surface, then instance
pub struct DeviceContext {
    // Field order is drop order
    pub device: RenderDevice,
    pub surface: Surface,
    pub instance: RenderInstance,
}

impl DeviceContext {
    pub fn new(
        window: &(impl HasDisplayHandle + HasWindowHandle),
        app_name: &str,
        enable_validation: bool,
    ) -> Result<Self> {
        let instance = RenderInstance::new(window, app_name, enable_validation)?;
        let surface = instance.create_surface(window)?;
        let device = RenderDevice::new(&instance.instance)?;

        let family = &device.graphics_queue.family;
        ensure_present_support(
            surface.supports_present(device.physical, family.index)?,
            family,
        )?;

        Ok(Self {
            device,
            surface,
            instance,
        })
    }
}
