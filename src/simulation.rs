//! Simulation builder and runner

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::SimConfig;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::gpu::{GpuState, WgpuBackend};
use crate::time::Time;

/// An interactive simulation window.
///
/// Use method chaining to configure, then call `.run()` to start.
///
/// ```ignore
/// Simulation::new()
///     .with_config(SimConfig::default().with_edge_policy(EdgePolicy::Contain))
///     .with_title("Sandbox")
///     .run()?;
/// ```
pub struct Simulation {
    config: SimConfig,
    title: String,
    window_size: (u32, u32),
}

impl Simulation {
    /// Create a new simulation with default settings.
    pub fn new() -> Self {
        Self {
            config: SimConfig::default(),
            title: "Grainflow".to_string(),
            window_size: (800, 800),
        }
    }

    /// Set the simulation parameters.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the window title prefix.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial window size in logical pixels.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run the simulation. This blocks until the window is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        self.config.validate()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    settings: Simulation,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    context: Option<SimulationContext<WgpuBackend>>,
    time: Time,
    error: Option<SimulationError>,
}

impl App {
    fn new(settings: Simulation) -> Self {
        Self {
            settings,
            window: None,
            gpu_state: None,
            context: None,
            time: Time::new(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let (width, height) = self.settings.window_size;
        let window_attrs = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu_state = pollster::block_on(GpuState::new(window.clone()))?;

        let backend = WgpuBackend::new(gpu_state.device().clone(), gpu_state.queue().clone());
        let mut context = SimulationContext::new(backend, self.settings.config)?;

        let size = window.inner_size();
        context.pointer_mut().set_window_size(size.width, size.height);

        log::info!(
            "Window {}x{}, capacity {} particles",
            size.width,
            size.height,
            self.settings.config.max_particles
        );

        window.request_redraw();
        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        self.context = Some(context);
        self.time = Time::new();
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(gpu_state), Some(context)) = (&mut self.gpu_state, &mut self.context) else {
            return;
        };

        let fps_refreshed = self.time.update();
        context.step(self.time.elapsed());

        match gpu_state.render(&context.front().buffer, context.active_count()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                gpu_state.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                event_loop.exit();
                return;
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        if let Some(window) = &self.window {
            if fps_refreshed {
                log::debug!(
                    "frame {}: {:.2} ms, {} particles",
                    self.time.frame(),
                    self.time.delta() * 1000.0,
                    context.active_count()
                );
                window.set_title(&format!(
                    "{} - {:.0} FPS - {} particles",
                    self.settings.title,
                    self.time.fps(),
                    context.active_count()
                ));
            }
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(context) = &mut self.context {
            context.pointer_mut().handle_event(&event);
            if context.pointer_mut().take_escape() {
                event_loop.exit();
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size.width, physical_size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
