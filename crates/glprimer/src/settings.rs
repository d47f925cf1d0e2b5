//! Merges the optional scene file with command-line overrides into the
//! renderer configuration and the lesson plan.
//!
//! Precedence is CLI flag, then config file, then built-in default. Relative
//! asset paths resolve against `--assets` when given, otherwise against the
//! config file's directory (file values) or the working directory (flags).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::{GlVersion, RendererConfig, TextureFilter, TextureOptions, TextureWrap, WindowConfig};
use sceneconfig::{FilterMode, LessonKind, SceneConfig, TextureEntry, WrapMode};

use crate::cli::RunArgs;

/// Where a lesson's shader sources come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderSource {
    /// Sources compiled into the binary for the lesson.
    Builtin,
    Files { vertex: PathBuf, fragment: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonPlan {
    pub kind: LessonKind,
    pub shaders: ShaderSource,
    pub textures: Vec<TextureEntry>,
    pub mix: f32,
}

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub renderer: RendererConfig,
    pub lesson: LessonPlan,
    /// Config file the settings were read from, if any.
    pub source: Option<PathBuf>,
}

pub fn resolve_settings(args: &RunArgs) -> Result<LaunchSettings> {
    let mut config = match &args.config {
        Some(path) => {
            let loaded = match &args.assets {
                Some(assets) => SceneConfig::load_from(path, assets),
                None => SceneConfig::load(path),
            };
            loaded.with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => SceneConfig::default(),
    };

    apply_overrides(&mut config, args);
    config.validate().context("invalid settings after applying command-line flags")?;

    if config.lesson.kind == LessonKind::Triangle && !config.lesson.textures.is_empty() {
        tracing::warn!(
            count = config.lesson.textures.len(),
            "triangle lesson ignores configured textures"
        );
    }

    Ok(LaunchSettings {
        renderer: renderer_config(&config),
        lesson: lesson_plan(&config),
        source: args.config.clone(),
    })
}

fn apply_overrides(config: &mut SceneConfig, args: &RunArgs) {
    let resolve = |path: &Path| -> PathBuf {
        match &args.assets {
            Some(assets) if path.is_relative() => assets.join(path),
            _ => path.to_path_buf(),
        }
    };

    if let Some(kind) = args.lesson {
        config.lesson.kind = kind;
    }
    if let Some(vertex) = &args.vertex {
        config.lesson.vertex_shader = Some(resolve(vertex));
    }
    if let Some(fragment) = &args.fragment {
        config.lesson.fragment_shader = Some(resolve(fragment));
    }
    if !args.textures.is_empty() {
        config.lesson.textures = args
            .textures
            .iter()
            .map(|path| TextureEntry::new(resolve(path)))
            .collect();
    }
    if let Some((width, height)) = args.size {
        config.window.width = width;
        config.window.height = height;
    }
    if let Some(title) = &args.title {
        config.window.title = title.clone();
    }
    if args.no_vsync {
        config.window.vsync = false;
    }
    if args.wireframe {
        config.render.wireframe = true;
    }
    if args.run_for.is_some() {
        config.render.run_for = args.run_for;
    }
    if args.fixed_time.is_some() {
        config.render.fixed_time = args.fixed_time;
    }
}

fn renderer_config(config: &SceneConfig) -> RendererConfig {
    RendererConfig {
        window: WindowConfig {
            width: config.window.width,
            height: config.window.height,
            title: config.window.title.clone(),
            vsync: config.window.vsync,
        },
        gl_version: GlVersion {
            major: config.window.gl_version.major,
            minor: config.window.gl_version.minor,
        },
        clear_color: config.render.clear_color.0,
        wireframe: config.render.wireframe,
        run_for: config.render.run_for,
        fixed_time: config.render.fixed_time,
    }
}

fn lesson_plan(config: &SceneConfig) -> LessonPlan {
    let lesson = &config.lesson;
    let shaders = match (&lesson.vertex_shader, &lesson.fragment_shader) {
        (Some(vertex), Some(fragment)) => ShaderSource::Files {
            vertex: vertex.clone(),
            fragment: fragment.clone(),
        },
        _ => ShaderSource::Builtin,
    };
    LessonPlan {
        kind: lesson.kind,
        shaders,
        textures: lesson.textures.clone(),
        mix: lesson.mix,
    }
}

pub fn texture_options(entry: &TextureEntry) -> TextureOptions {
    TextureOptions {
        wrap: match entry.wrap {
            WrapMode::Repeat => TextureWrap::Repeat,
            WrapMode::MirroredRepeat => TextureWrap::MirroredRepeat,
            WrapMode::ClampToEdge => TextureWrap::ClampToEdge,
        },
        filter: match entry.filter {
            FilterMode::Linear => TextureFilter::Linear,
            FilterMode::Nearest => TextureFilter::Nearest,
        },
        mipmaps: true,
        flip_vertically: entry.flip_vertically,
    }
}
