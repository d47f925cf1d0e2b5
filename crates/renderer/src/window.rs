use std::ffi::CStr;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, DisplayApiPreference};
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::context::RenderContext;
use crate::driver::log_driver_info;
use crate::runtime::{time_source_for, BoxedTimeSource, RunDeadline, TimeSample};
use crate::types::RendererConfig;
use crate::Scene;

/// GL objects tied to one window.
///
/// Field order is drop order: the scene releases its programs, meshes, and
/// textures while the context is still alive and current.
struct WindowState<S> {
    scene: Option<S>,
    ctx: RenderContext<glow::Context>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
    clear_color: [f32; 4],
    clock: BoxedTimeSource,
    deadline: RunDeadline,
}

impl<S: Scene<glow::Context>> WindowState<S> {
    fn resize(&mut self, size: PhysicalSize<u32>) {
        let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            debug!("ignoring zero-sized resize");
            return;
        };
        self.surface.resize(&self.context, width, height);
        self.ctx.set_viewport(size.width, size.height);
    }

    fn render_frame(&mut self) -> Result<()> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(());
        };
        let sample: TimeSample = self.clock.sample();
        self.ctx.clear(self.clear_color);
        scene
            .render(&self.ctx, sample)
            .with_context(|| format!("failed to render frame {}", sample.frame_index))?;
        self.surface
            .swap_buffers(&self.context)
            .context("failed to swap buffers")?;
        Ok(())
    }
}

/// Opens the window, builds the scene, and runs until the window closes.
pub(crate) fn run_window<S, F>(config: RendererConfig, build_scene: F) -> Result<()>
where
    S: Scene<glow::Context>,
    F: FnOnce(&RenderContext<glow::Context>) -> Result<S>,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_config = &config.window;
    let window = WindowBuilder::new()
        .with_title(window_config.title.clone())
        .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;

    let (surface, context, gl) = create_gl_context(&window, &config)?;
    log_driver_info(&gl);

    let ctx = RenderContext::new(Rc::new(gl));
    let size = window.inner_size();
    ctx.set_viewport(size.width, size.height);
    ctx.set_wireframe(config.wireframe);

    let scene = build_scene(&ctx).context("failed to build scene")?;
    ctx.check_error().context("driver error while building scene")?;

    let mut state = WindowState {
        scene: Some(scene),
        ctx,
        surface,
        context,
        window,
        clear_color: config.clear_color,
        clock: time_source_for(config.fixed_time),
        deadline: RunDeadline::new(config.run_for, Instant::now()),
    };
    info!(
        width = size.width,
        height = size.height,
        run_for = ?config.run_for,
        "entering render loop"
    );

    let mut outcome: Result<()> = Ok(());
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed
                            && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                        {
                            debug!("escape pressed; closing window");
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::RedrawRequested => {
                        if state.deadline.expired(Instant::now()) {
                            info!("run duration elapsed; closing window");
                            elwt.exit();
                            return;
                        }
                        if let Err(err) = state.render_frame() {
                            debug!("render failed; closing window");
                            outcome = Err(err);
                            elwt.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => state.window.request_redraw(),
            Event::LoopExiting => {
                // Release scene resources while the context is still current.
                state.scene.take();
                if let Err(err) = state.ctx.check_error() {
                    warn!("driver error during teardown: {err}");
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    outcome
}

fn create_gl_context(
    window: &Window,
    config: &RendererConfig,
) -> Result<(Surface<WindowSurface>, PossiblyCurrentContext, glow::Context)> {
    let raw_display = window
        .display_handle()
        .context("window has no display handle")?
        .as_raw();
    let raw_window = window
        .window_handle()
        .context("window has no window handle")?
        .as_raw();

    let display = unsafe { Display::new(raw_display, display_preference(raw_window)) }
        .context("failed to open GL display")?;
    let gl_config = pick_config(&display)?;

    let size = window.inner_size();
    let width = NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN);
    let height = NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN);
    let surface_attributes =
        SurfaceAttributesBuilder::<WindowSurface>::new().build(raw_window, width, height);
    let surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
        .context("failed to create window surface")?;

    let version = Version::new(config.gl_version.major, config.gl_version.minor);
    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(version)))
        .with_profile(GlProfile::Core)
        .build(Some(raw_window));
    let context = unsafe { display.create_context(&gl_config, &context_attributes) }
        .with_context(|| {
            format!(
                "failed to create OpenGL {}.{} core context",
                config.gl_version.major, config.gl_version.minor
            )
        })?
        .make_current(&surface)
        .context("failed to make GL context current")?;

    let interval = if config.window.vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    if let Err(err) = surface.set_swap_interval(&context, interval) {
        warn!(vsync = config.window.vsync, "failed to set swap interval: {err}");
    }

    let gl =
        unsafe { glow::Context::from_loader_function_cstr(|name: &CStr| display.get_proc_address(name)) };
    Ok((surface, context, gl))
}

fn pick_config(display: &Display) -> Result<Config> {
    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_transparency(false)
        .build();
    let configs = unsafe { display.find_configs(template) }.context("failed to query GL configs")?;
    configs
        .reduce(|best, candidate| {
            if candidate.num_samples() == 0 && best.num_samples() > 0 {
                candidate
            } else {
                best
            }
        })
        .ok_or_else(|| anyhow!("no suitable GL framebuffer config"))
}

#[cfg(target_os = "windows")]
fn display_preference(raw_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Wgl(Some(raw_window))
}

#[cfg(target_os = "macos")]
fn display_preference(_raw_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(all(unix, not(target_os = "macos")))]
fn display_preference(_raw_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Egl
}
