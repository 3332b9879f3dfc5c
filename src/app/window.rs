use std::time::Duration;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::OsError;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};
use crate::renderer::contexts::frame_ctx::EventPump;

/// Fixed-size window driven by pumping the winit event loop once per frame
pub struct AppWindow {
    handler: WindowHandler,
    event_loop: EventLoop<()>,
}

impl AppWindow {
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            // No swapchain recreation, so the size must never change
            .with_resizable(false);

        let mut app_window = Self {
            handler: WindowHandler {
                attributes,
                window: None,
                create_error: None,
                close_requested: false,
            },
            event_loop,
        };

        // The window can only be created once the loop delivers `resumed`
        while app_window.handler.window.is_none() {
            let status = app_window.pump(Some(Duration::from_millis(16)));
            if let Some(err) = app_window.handler.create_error.take() {
                return Err(eyre!("Failed to create window: {}", err));
            }
            if let PumpStatus::Exit(code) = status {
                return Err(eyre!("Event loop exited with code {} before a window was created", code));
            }
        }
        log::info!("Created {}x{} window \"{}\"", width, height, title);

        Ok(app_window)
    }

    pub fn window(&self) -> Result<&Window> {
        self.handler.window.as_ref().ok_or_eyre("Window has not been created")
    }

    fn pump(&mut self, timeout: Option<Duration>) -> PumpStatus {
        self.event_loop.pump_app_events(timeout, &mut self.handler)
    }
}

impl EventPump for AppWindow {
    fn should_close(&self) -> bool {
        self.handler.close_requested
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self.pump(Some(Duration::ZERO)) {
            log::debug!("Event loop exited with code {}", code);
            self.handler.close_requested = true;
        }
    }
}

struct WindowHandler {
    attributes: WindowAttributes,
    window: Option<Window>,
    create_error: Option<OsError>,
    close_requested: bool,
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(err) => self.create_error = Some(err),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                self.close_requested = true;
            }
            _ => {}
        }
    }
}
