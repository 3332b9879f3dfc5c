mod window;

use color_eyre::Result;
use crate::app::window::AppWindow;
use crate::renderer::Renderer;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::frame_ctx::run_frame_loop;
use crate::renderer::resources::object::GeometryObject;

pub struct App {
    // The renderer's surface must go before the window it was created from
    renderer: Renderer,
    window: AppWindow,
}

impl App {
    pub fn new(config: RenderConfig) -> Result<Self> {
        let window = AppWindow::new(config.width, config.height, &config.app_name)?;
        let renderer = Renderer::new(window.window()?, &config)?;

        Ok(Self { renderer, window })
    }

    pub fn run(mut self) -> Result<()> {
        self.renderer.register(GeometryObject::triangle())?;
        run_frame_loop(&mut self.window, &mut self.renderer)?;
        Ok(())
    }
}
