use anyhow::{Context, Result};
use renderer::Renderer;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::lessons::LessonScene;
use crate::settings::resolve_settings;

pub fn run(args: RunArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;
    let window = &settings.renderer.window;
    let gl_version = settings.renderer.gl_version;
    tracing::info!(
        lesson = %settings.lesson.kind,
        width = window.width,
        height = window.height,
        vsync = window.vsync,
        gl = %format!("{}.{}", gl_version.major, gl_version.minor),
        "starting glprimer"
    );
    if let Some(path) = &settings.source {
        tracing::debug!(config = %path.display(), "loaded scene config");
    }

    let plan = settings.lesson;
    Renderer::new(settings.renderer)
        .run(|ctx| LessonScene::build(ctx, &plan))
        .with_context(|| format!("the {} lesson failed", plan.kind))
}

pub fn initialise_tracing() {
    let default_filter = "warn,glprimer=info,renderer=info,winit=error,glutin=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
