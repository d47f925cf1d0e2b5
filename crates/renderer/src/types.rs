use std::time::Duration;

/// Requested OpenGL core-profile version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for GlVersion {
    fn default() -> Self {
        Self { major: 3, minor: 3 }
    }
}

/// Window creation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Synchronise buffer swaps with the display refresh.
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "LearnOpenGL".to_string(),
            vsync: true,
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub gl_version: GlVersion,
    /// RGBA colour the framebuffer is cleared to every frame.
    pub clear_color: [f32; 4],
    /// Rasterise polygons as outlines.
    pub wireframe: bool,
    /// Exit the loop after this much wall-clock time.
    pub run_for: Option<Duration>,
    /// Freeze scene time at this many seconds.
    pub fixed_time: Option<f32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            gl_version: GlVersion::default(),
            clear_color: [0.2, 0.3, 0.3, 1.0],
            wireframe: false,
            run_for: None,
            fixed_time: None,
        }
    }
}
