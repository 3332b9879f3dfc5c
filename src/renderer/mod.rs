pub mod config;
pub mod contexts;
pub mod resources;
pub mod vk;

use color_eyre::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::contexts::device_ctx::target::Swapchain;
use crate::renderer::contexts::frame_ctx::{wait_with_retries, Frame, FramePresenter, FrameState, FrameTargets};
use crate::renderer::contexts::pipeline_ctx::{self, pipeline::Pipeline};
use crate::renderer::contexts::resource_ctx::{DepthResource, DrawEntry, UniformResource, VertexArena};
use crate::renderer::resources::object::GeometryObject;

pub struct Renderer {
    // Field order is drop order: the reverse of creation
    frame: Frame,
    arena: VertexArena,
    pipeline: Pipeline,
    uniform: UniformResource,
    depth: DepthResource,
    swapchain: Swapchain,
    dev: DeviceContext,

    config: RenderConfig,
    state: FrameState,
}

impl Renderer {
    pub fn new(
        window: &(impl HasDisplayHandle + HasWindowHandle),
        config: &RenderConfig,
    ) -> Result<Self> {
        let dev = DeviceContext::new(window, &config.app_name, config.enable_validation)?;
        let swapchain = Swapchain::new(&dev, config.width, config.height)?;
        let depth = DepthResource::new(&dev, swapchain.extent.width, swapchain.extent.height)?;
        let uniform = UniformResource::new(&dev)?;
        let pipeline = pipeline_ctx::build_pipeline(&dev, swapchain.format, &uniform, config)?;
        let arena = VertexArena::new(&dev)?;
        let frame = Frame::new(&dev)?;

        log::info!("Renderer ready on {}", dev.device.name);

        Ok(Self {
            frame,
            arena,
            pipeline,
            uniform,
            depth,
            swapchain,
            dev,

            config: config.clone(),
            state: FrameState::Idle,
        })
    }

    /// Uploads the object's vertices and adds it to every following frame.
    ///
    /// Only called between frames, so the GPU is never reading the arena while it is written.
    pub fn register(&mut self, object: GeometryObject) -> Result<&DrawEntry> {
        self.arena.register(object)
    }

    pub fn draw_frame(&mut self) -> Result<()> {
        let timeout_ns = self.config.wait_timeout_ns();

        self.enter(FrameState::Acquiring);
        let image_index = self.frame.acquire(&self.swapchain, timeout_ns)?;
        let (color_image, color_view) = self.swapchain.image(image_index)?;

        self.enter(FrameState::Recording);
        self.frame.record(&FrameTargets {
            color_image,
            color_view,
            depth: &self.depth,
            extent: self.swapchain.extent,
            pipeline: &self.pipeline,
            vertex_buffer: self.arena.buffer(),
            entries: self.arena.entries(),
            clear_color: self.config.clear_color,
        })?;

        self.frame.submit()?;
        self.enter(FrameState::Submitted);
        wait_with_retries(|| self.frame.wait(timeout_ns), self.config.fence_wait_retries)?;

        self.enter(FrameState::Presenting);
        self.frame.present(&self.swapchain, image_index);

        self.enter(FrameState::Idle);
        Ok(())
    }

    fn enter(&mut self, next: FrameState) {
        debug_assert_eq!(self.state.next(), next, "frame state skipped a step");
        log::trace!("Frame state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl FramePresenter for Renderer {
    fn draw_frame(&mut self) -> Result<()> {
        Renderer::draw_frame(self)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(err) = unsafe { self.dev.device.logical.device_wait_idle() } {
            log::error!("Failed to wait for device idle before teardown: {}", err);
        }
        log::debug!("Destroying renderer resources");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use crate::renderer::contexts::frame_ctx::{run_frame_loop, EventPump};
    use super::*;

    #[derive(Default)]
    struct Lifecycle {
        created: Vec<&'static str>,
        destroyed: Vec<&'static str>,
    }

    /// Stands in for one owned Vulkan object; records when it is created and destroyed
    struct Owned {
        name: &'static str,
        log: Rc<RefCell<Lifecycle>>,
    }

    impl Owned {
        fn new(name: &'static str, log: &Rc<RefCell<Lifecycle>>) -> Self {
            log.borrow_mut().created.push(name);
            Self { name, log: log.clone() }
        }
    }

    impl Drop for Owned {
        fn drop(&mut self) {
            self.log.borrow_mut().destroyed.push(self.name);
        }
    }

    // Same field order as `DeviceContext`
    #[allow(dead_code)]
    struct HostDeviceContext {
        device: Owned,
        surface: Owned,
        instance: Owned,
    }

    // Same field order as `Renderer`
    #[allow(dead_code)]
    struct HostRenderer {
        frame: Owned,
        arena: Owned,
        pipeline: Owned,
        uniform: Owned,
        depth: Owned,
        swapchain: Owned,
        dev: HostDeviceContext,
        draws: u32,
    }

    impl HostRenderer {
        // Same construction order as `DeviceContext::new` and `Renderer::new`
        fn new(log: &Rc<RefCell<Lifecycle>>) -> Self {
            let instance = Owned::new("instance", log);
            let surface = Owned::new("surface", log);
            let device = Owned::new("device", log);
            let dev = HostDeviceContext { device, surface, instance };

            let swapchain = Owned::new("swapchain", log);
            let depth = Owned::new("depth", log);
            let uniform = Owned::new("uniform", log);
            let pipeline = Owned::new("pipeline", log);
            let arena = Owned::new("arena", log);
            let frame = Owned::new("frame", log);

            Self { frame, arena, pipeline, uniform, depth, swapchain, dev, draws: 0 }
        }
    }

    impl FramePresenter for HostRenderer {
        fn draw_frame(&mut self) -> Result<()> {
            self.draws += 1;
            Ok(())
        }
    }

    struct ClosedWindow {
        _window: Owned,
    }

    impl EventPump for ClosedWindow {
        fn should_close(&self) -> bool {
            true
        }

        fn poll_events(&mut self) {}
    }

    // Same field order as `App`
    struct HostApp {
        renderer: HostRenderer,
        window: ClosedWindow,
    }

    #[test]
    fn early_close_releases_everything_in_reverse_creation_order() {
        let log = Rc::new(RefCell::new(Lifecycle::default()));

        let window = ClosedWindow { _window: Owned::new("window", &log) };
        let renderer = HostRenderer::new(&log);
        let mut app = HostApp { renderer, window };

        let frames = run_frame_loop(&mut app.window, &mut app.renderer).unwrap();
        assert_eq!(frames, 0);
        assert_eq!(app.renderer.draws, 0);
        assert!(log.borrow().destroyed.is_empty());

        drop(app);

        let log = log.borrow();
        let mut expected = log.created.clone();
        expected.reverse();
        assert_eq!(log.destroyed, expected);
        assert_eq!(
            log.destroyed,
            vec![
                "frame", "arena", "pipeline", "uniform", "depth", "swapchain",
                "device", "surface", "instance", "window",
            ],
        );
    }
}
