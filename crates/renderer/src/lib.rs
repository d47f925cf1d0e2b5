//! OpenGL renderer for the glprimer lessons.
//!
//! The crate wraps the handful of driver objects the lessons need behind
//! owned Rust types and runs them in a winit window:
//!
//! ```text
//!   glprimer CLI
//!        │ RendererConfig + scene factory
//!        ▼
//!   Renderer::run ──▶ glutin context ──▶ RenderContext<glow::Context>
//!        │                                   │
//!        └─▶ winit event loop ──▶ Scene::render(ctx, time) ──▶ swap buffers
//! ```
//!
//! `ShaderProgram`, `Mesh`, and `Texture` each own one family of driver
//! handles and release them exactly once. All driver access goes through the
//! `GlDriver` trait so the resource types can be exercised without a GPU.

mod context;
mod driver;
mod error;
mod mesh;
mod runtime;
mod shader;
mod texture;
mod types;
mod window;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use anyhow::Result;

pub use context::{DrawCall, RenderContext};
pub use driver::{error_name, BufferTarget, GlDriver, SamplerState, TextureFilter, TextureWrap};
pub use error::{RenderError, ShaderStage, INFO_LOG_LIMIT};
pub use mesh::{Mesh, VertexAttribute, VertexLayout};
pub use runtime::{
    time_source_for, BoxedTimeSource, FixedTimeSource, RunDeadline, SystemTimeSource, TimeSample,
    TimeSource,
};
pub use shader::{ShaderProgram, UniformKind, UniformValue};
pub use texture::{load_image, ImageData, Texture, TextureOptions};
pub use types::{GlVersion, RendererConfig, WindowConfig};

/// Per-frame drawing logic driven by the render loop.
///
/// The loop clears the framebuffer before calling [`Scene::render`] and
/// swaps buffers afterwards. Returning an error stops the loop.
pub trait Scene<G: GlDriver> {
    fn render(&mut self, ctx: &RenderContext<G>, time: TimeSample) -> Result<()>;
}

/// Entry point that owns the configuration for one windowed run.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window, builds the scene with the live context, and renders
    /// until the window is closed, Escape is pressed, or `run_for` elapses.
    pub fn run<S, F>(self, build_scene: F) -> Result<()>
    where
        S: Scene<glow::Context>,
        F: FnOnce(&RenderContext<glow::Context>) -> Result<S>,
    {
        window::run_window(self.config, build_scene)
    }
}
