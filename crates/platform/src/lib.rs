//! Platform layer: windowing & event loop.
//!
//! Owns the window, the frame state and the runtime toggles, and drives one
//! update + render per redraw. Redraws are requested continuously.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use corelib::{Controls, FrameState};
use renderer::{GpuState, SceneAssets};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

pub mod clock;
pub mod input;

use clock::{FrameClock, window_title};
use input::{Command, DragScale, command_for_key};

/// Window and GPU selection.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub backends: wgpu::Backends,
    pub show_fps: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Orrery".to_string(),
            width: 800,
            height: 600,
            backends: wgpu::Backends::all(),
            show_fps: false,
        }
    }
}

/// Open a window and render the scene until it is closed.
pub fn run_with_renderer(
    config: PlatformConfig,
    assets: SceneAssets,
    frame: FrameState,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        assets: Some(assets),
        frame,
        controls: Controls::default(),
        drag: DragScale::default(),
        clock: FrameClock::new(Instant::now()),
        window: None,
        gpu: None,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    config: PlatformConfig,
    /// Handed to the renderer once the window exists.
    assets: Option<SceneAssets>,
    frame: FrameState,
    controls: Controls,
    drag: DragScale,
    clock: FrameClock,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    error: Option<anyhow::Error>,
}

impl App {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let assets = self.assets.take().context("renderer already initialised")?;
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.width.max(1),
                self.config.height.max(1),
            ));
        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends, assets))?;
        self.clock = FrameClock::new(Instant::now());
        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn apply(&mut self, event_loop: &ActiveEventLoop, command: Command) {
        match command {
            Command::ToggleRotation => {
                self.controls.rotate = !self.controls.rotate;
                log::info!("Rotation {}", on_off(self.controls.rotate));
            }
            Command::ToggleLight => {
                self.controls.animate_light = !self.controls.animate_light;
                log::info!("Light animation {}", on_off(self.controls.animate_light));
            }
            Command::Exit => {
                log::info!("Escape pressed. Exiting event loop.");
                event_loop.exit();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let now = Instant::now();
        self.frame.update(self.clock.elapsed(now), &self.controls);

        match gpu.render(&mut self.frame, &self.controls) {
            Ok(stats) => log::trace!("{} draws, {} indices", stats.draw_calls, stats.indices),
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface {e:?}; reconfiguring");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("GPU out of memory"));
                return;
            }
            Err(e) => log::warn!("Frame skipped: {e:?}"),
        }

        if let Some(fps) = self.clock.tick(now)
            && self.config.show_fps
            && let Some(window) = &self.window
        {
            window.set_title(&window_title(&self.config.title, Some(fps)));
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("failed to initialise renderer"));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let (Some(window), Some(gpu)) = (&self.window, self.gpu.as_mut()) {
                    let size = window.inner_size();
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key
                    && let Some(command) = command_for_key(code)
                {
                    self.apply(event_loop, command);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.drag.press(),
                ElementState::Released => self.drag.release(),
            },
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(scale) = self.drag.moved(position.x as f32, position.y as f32) {
                    log::debug!("Scale factor {scale:.3}");
                    self.controls.scale_factor = scale;
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
